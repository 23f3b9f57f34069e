//! Customer directory operations over the remote collection.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde_json::Value;

use crate::models::Customer;
use crate::remote::{ChildEvent, Database, Reference, RemoteWriteError, Subscription};

/// Path of the customer collection within the database.
pub const CUSTOMERS_PATH: &str = "customers";

/// The customer directory: create, update, delete, and read records in
/// one remote collection, plus a live view of it.
///
/// No record is cached locally: each operation opens an independent
/// request and completes exactly once, and the in-memory record stays
/// owned by the caller. Operations in flight concurrently carry no
/// ordering guarantee between them.
#[derive(Debug, Clone)]
pub struct CustomerStore {
    db: Database,
}

impl CustomerStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> Reference {
        self.db.reference(CUSTOMERS_PATH)
    }

    fn identified(customer: &Customer) -> Result<&str, RemoteWriteError> {
        match customer.id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(RemoteWriteError::new("record has no id")),
        }
    }

    /// Appends a new record; the service assigns its identity.
    ///
    /// Any identity already on the record is ignored. The returned
    /// reference points at the new entry; its key is the assigned
    /// identity.
    pub async fn add_customer(&self, customer: &Customer) -> Result<Reference, RemoteWriteError> {
        self.collection().push(customer).await
    }

    /// Replaces the stored record at the customer's identity.
    ///
    /// Set semantics, not merge: fields omitted from `customer` are
    /// removed remotely. The record must carry a non-empty `id`.
    pub async fn update_customer(&self, customer: &Customer) -> Result<(), RemoteWriteError> {
        let id = Self::identified(customer)?;
        self.collection().child(id).set(customer).await
    }

    /// Removes the record at the customer's identity.
    ///
    /// Removing an identity that holds nothing succeeds. The record
    /// must carry a non-empty `id`.
    pub async fn delete_customer(&self, customer: &Customer) -> Result<(), RemoteWriteError> {
        let id = Self::identified(customer)?;
        self.collection().child(id).remove().await
    }

    /// Reads the record stored at `id`; `None` if absent.
    pub async fn get_customer(&self, id: &str) -> Result<Option<Customer>, RemoteWriteError> {
        let customer: Option<Customer> = self.collection().child(id).get().await?;
        Ok(customer.map(|c| c.with_id(id)))
    }

    /// The live reference to the customer collection.
    ///
    /// Subscribe on it to receive the current entries followed by an
    /// open-ended sequence of changes; listener lifetime belongs to the
    /// caller, and dropping the subscription detaches it.
    pub fn customer_listener(&self) -> Reference {
        self.collection()
    }

    /// Typed subscription to the collection.
    pub async fn events(&self) -> Result<CustomerEvents, RemoteWriteError> {
        let inner = self.collection().subscribe().await?;
        Ok(CustomerEvents { inner })
    }
}

/// A change to one customer, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerEvent {
    Added(Customer),
    Changed(Customer),
    Removed { id: String },
}

/// Stream of customer changes: the current entries first, then live
/// edits for as long as the stream is held.
pub struct CustomerEvents {
    inner: Subscription,
}

impl CustomerEvents {
    /// Waits for the next change. `None` means the stream ended.
    pub async fn next_event(&mut self) -> Option<Result<CustomerEvent, RemoteWriteError>> {
        self.inner
            .next_event()
            .await
            .map(|item| item.and_then(convert))
    }
}

impl Stream for CustomerEvents {
    type Item = Result<CustomerEvent, RemoteWriteError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(Some(item.and_then(convert))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

fn convert(event: ChildEvent) -> Result<CustomerEvent, RemoteWriteError> {
    match event {
        ChildEvent::Added { key, value } => Ok(CustomerEvent::Added(decode(key, value)?)),
        ChildEvent::Changed { key, value } => Ok(CustomerEvent::Changed(decode(key, value)?)),
        ChildEvent::Removed { key } => Ok(CustomerEvent::Removed { id: key }),
    }
}

fn decode(key: String, value: Value) -> Result<Customer, RemoteWriteError> {
    let customer: Customer = serde_json::from_value(value)
        .map_err(|e| RemoteWriteError::new(format!("bad record at {}: {}", key, e)))?;
    Ok(customer.with_id(key))
}
