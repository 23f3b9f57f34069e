use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One customer record.
///
/// The service assigns `id` on first save; before that it is `None`.
/// All other fields are caller-defined and opaque to this crate. The
/// identity never serializes into the stored value: the service knows
/// the record by its key, so a read back at `customers/{id}` returns
/// only the caller-defined fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(skip)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Customer {
    /// Creates an empty record with no identity.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Looks up one caller-defined field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
