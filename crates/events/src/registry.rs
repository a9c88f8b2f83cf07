//! Event Type Registry (C2): named, versioned JSON-Schema validation for
//! event payloads.

use std::collections::HashMap;
use std::sync::RwLock;

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("schema for {type_name}@{version} is not valid JSON Schema: {reason}")]
    InvalidSchema {
        type_name: String,
        version: u32,
        reason: String,
    },
    #[error("payload does not match schema for {type_name}@{version}: {violations}")]
    ValidationFailed {
        type_name: String,
        version: u32,
        violations: String,
    },
}

/// A registered schema entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub type_name: String,
    pub schema_version: u32,
    pub json_schema: JsonValue,
    pub description: Option<String>,
}

/// Named, versioned JSON-Schema validation for event payloads.
///
/// Validation is permissive for unregistered `(type, version)` pairs
/// (returns `Ok(true)`): the registry is optional, additive, and exists to
/// let teams opt specific event types into payload-shape enforcement
/// without blocking everything else.
pub trait EventTypeRegistry: Send + Sync {
    fn register(&self, entry: SchemaEntry) -> Result<(), RegistryError>;
    fn get_schema(&self, type_name: &str, version: u32) -> Option<SchemaEntry>;
    fn list_versions(&self, type_name: &str) -> Vec<u32>;
    fn list_types(&self) -> Vec<String>;
    fn validate(&self, type_name: &str, version: u32, data: &JsonValue) -> Result<bool, RegistryError>;
}

#[derive(Default)]
pub struct InMemoryEventTypeRegistry {
    entries: RwLock<HashMap<(String, u32), SchemaEntry>>,
}

impl InMemoryEventTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventTypeRegistry for InMemoryEventTypeRegistry {
    fn register(&self, entry: SchemaEntry) -> Result<(), RegistryError> {
        // Validate the schema document itself compiles before accepting it.
        JSONSchema::compile(&entry.json_schema).map_err(|e| RegistryError::InvalidSchema {
            type_name: entry.type_name.clone(),
            version: entry.schema_version,
            reason: e.to_string(),
        })?;

        let key = (entry.type_name.clone(), entry.schema_version);
        self.entries.write().expect("registry lock poisoned").insert(key, entry);
        Ok(())
    }

    fn get_schema(&self, type_name: &str, version: u32) -> Option<SchemaEntry> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(&(type_name.to_string(), version))
            .cloned()
    }

    fn list_versions(&self, type_name: &str) -> Vec<u32> {
        let mut versions: Vec<u32> = self
            .entries
            .read()
            .expect("registry lock poisoned")
            .keys()
            .filter(|(t, _)| t == type_name)
            .map(|(_, v)| *v)
            .collect();
        versions.sort_unstable();
        versions
    }

    fn list_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .entries
            .read()
            .expect("registry lock poisoned")
            .keys()
            .map(|(t, _)| t.clone())
            .collect();
        types.sort();
        types.dedup();
        types
    }

    fn validate(&self, type_name: &str, version: u32, data: &JsonValue) -> Result<bool, RegistryError> {
        let Some(entry) = self.get_schema(type_name, version) else {
            // Unregistered types are permissive.
            return Ok(true);
        };

        let compiled = JSONSchema::compile(&entry.json_schema).map_err(|e| RegistryError::InvalidSchema {
            type_name: type_name.to_string(),
            version,
            reason: e.to_string(),
        })?;

        match compiled.validate(data) {
            Ok(()) => Ok(true),
            Err(errors) => {
                let violations = errors.map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
                Err(RegistryError::ValidationFailed {
                    type_name: type_name.to_string(),
                    version,
                    violations,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry() -> SchemaEntry {
        SchemaEntry {
            type_name: "ap.invoice.submitted".to_string(),
            schema_version: 1,
            json_schema: json!({
                "type": "object",
                "required": ["vendor_id", "amount"],
                "properties": {
                    "vendor_id": { "type": "string" },
                    "amount": { "type": "number" }
                }
            }),
            description: Some("AP invoice submission payload".to_string()),
        }
    }

    #[test]
    fn unregistered_type_is_permissive() {
        let registry = InMemoryEventTypeRegistry::new();
        let ok = registry
            .validate("unknown.type", 1, &json!({"anything": true}))
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn registered_type_enforces_schema() {
        let registry = InMemoryEventTypeRegistry::new();
        registry.register(entry()).unwrap();

        assert!(registry
            .validate("ap.invoice.submitted", 1, &json!({"vendor_id": "v1", "amount": 100}))
            .unwrap());

        assert!(registry
            .validate("ap.invoice.submitted", 1, &json!({"vendor_id": "v1"}))
            .is_err());
    }

    #[test]
    fn list_types_and_versions() {
        let registry = InMemoryEventTypeRegistry::new();
        registry.register(entry()).unwrap();
        assert_eq!(registry.list_types(), vec!["ap.invoice.submitted".to_string()]);
        assert_eq!(registry.list_versions("ap.invoice.submitted"), vec![1]);
    }
}
