//! Tracked application events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::visit::Extras;

/// An application-defined event attached to the current visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    name: String,
    properties: Extras,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Extras::new(),
        }
    }

    /// Attach a single property, overriding any earlier value for the key.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Merge a property map in, later keys overriding earlier ones.
    #[must_use]
    pub fn with_properties(mut self, properties: Extras) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &Extras {
        &self.properties
    }
}
