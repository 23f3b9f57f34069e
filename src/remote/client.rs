//! Connection handle and path references.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ServiceConfig;

use super::error::RemoteWriteError;
use super::listener::Subscription;

/// Response body of a push: the server-assigned key of the new child.
#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// Handle to the remote database.
///
/// Established once from the service configuration and cloned into each
/// component that needs it; there is no module-level connection state.
/// Connecting performs no network traffic, since every operation opens
/// its own request against the remote path.
#[derive(Debug, Clone)]
pub struct Database {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl Database {
    /// Establishes a handle from the service configuration.
    pub fn connect(config: &ServiceConfig) -> Result<Self, RemoteWriteError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: config.database_url.trim_end_matches('/').to_string(),
            auth_token: config.api_key.clone(),
        })
    }

    /// Returns a reference to a location inside the database.
    pub fn reference(&self, path: &str) -> Reference {
        Reference {
            db: self.clone(),
            path: path.trim_matches('/').to_string(),
        }
    }
}

/// A reference to one location within the remote database.
///
/// References are cheap to create and hold no open connection. Reads,
/// writes, and subscriptions each build an independent request, so
/// operations in flight at the same time do not affect each other.
#[derive(Debug, Clone)]
pub struct Reference {
    db: Database,
    path: String,
}

impl Reference {
    /// Returns a reference to a child of this location.
    pub fn child(&self, key: &str) -> Reference {
        Reference {
            db: self.db.clone(),
            path: format!("{}/{}", self.path, key.trim_matches('/')),
        }
    }

    /// The last path segment, the key the service knows this location
    /// by. The database root has no key.
    pub fn key(&self) -> Option<&str> {
        self.path.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// Slash-separated path of this location within the database.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn url(&self) -> String {
        format!(
            "{}/{}.json?auth={}",
            self.db.base_url, self.path, self.db.auth_token
        )
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.db.http
    }

    /// Appends `value` under a fresh server-assigned key.
    ///
    /// Returns the reference to the new child; its key is the identity
    /// the service chose.
    pub async fn push<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Reference, RemoteWriteError> {
        tracing::debug!("push to {}", self.path);
        let response = self.db.http.post(self.url()).json(value).send().await?;
        let response = accepted(response)?;
        let pushed: PushResponse = response
            .json()
            .await
            .map_err(|e| RemoteWriteError::new(format!("bad push response: {}", e)))?;
        Ok(self.child(&pushed.name))
    }

    /// Writes `value` at this location, replacing whatever was stored.
    pub async fn set<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), RemoteWriteError> {
        tracing::debug!("set at {}", self.path);
        let response = self.db.http.put(self.url()).json(value).send().await?;
        accepted(response)?;
        Ok(())
    }

    /// Removes the value at this location. Removing a location that
    /// holds nothing succeeds.
    pub async fn remove(&self) -> Result<(), RemoteWriteError> {
        tracing::debug!("remove at {}", self.path);
        let response = self.db.http.delete(self.url()).send().await?;
        accepted(response)?;
        Ok(())
    }

    /// Reads the value at this location; `None` if nothing is stored
    /// there (the service reports absent locations as JSON `null`).
    pub async fn get<T: DeserializeOwned>(&self) -> Result<Option<T>, RemoteWriteError> {
        tracing::debug!("get at {}", self.path);
        let response = self.db.http.get(self.url()).send().await?;
        let response = accepted(response)?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| RemoteWriteError::new(format!("bad response body: {}", e)))?;
        if value.is_null() {
            return Ok(None);
        }
        let decoded = serde_json::from_value(value)
            .map_err(|e| RemoteWriteError::new(format!("bad record at {}: {}", self.path, e)))?;
        Ok(Some(decoded))
    }

    /// Opens the live event channel for this location.
    ///
    /// The subscription starts with the current entries and then pushes
    /// changes for as long as it is held; dropping it detaches the
    /// listener. See [`Subscription`].
    pub async fn subscribe(&self) -> Result<Subscription, RemoteWriteError> {
        Subscription::open(self.clone()).await
    }
}

fn accepted(response: reqwest::Response) -> Result<reqwest::Response, RemoteWriteError> {
    if !response.status().is_success() {
        return Err(RemoteWriteError::new(format!(
            "service returned status {}",
            response.status()
        )));
    }
    Ok(response)
}
