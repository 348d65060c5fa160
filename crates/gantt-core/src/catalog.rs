//! The capability catalog: every command the model may select, described by
//! a JSON parameter schema. Loaded once at startup and shared read-only.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::schema::{self, SchemaViolation};

/// Reserved capability answered by the orchestrator from client-supplied state.
pub const STATE_QUERY_TOOL: &str = "get_gantt_state";
/// Reserved capability the model selects when no other command fits.
pub const SKIP_TOOL: &str = "skip_command";

const BUILTIN_CATALOG: &str = include_str!("../catalog/tools.json");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate capability name: {0}")]
    DuplicateName(String),
    #[error("invalid schema for {name}: {reason}")]
    InvalidSchema { name: String, reason: String },
    #[error("catalog is missing reserved capability {0}")]
    MissingReserved(&'static str),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// How the orchestrator treats a tool name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapabilityKind {
    StateQuery,
    Skip,
    Action,
    Unknown,
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    version: String,
    tools: Vec<ToolEntry>,
}

#[derive(Debug, Deserialize)]
struct ToolEntry {
    #[serde(rename = "type")]
    kind: String,
    function: FunctionEntry,
}

#[derive(Debug, Deserialize)]
struct FunctionEntry {
    name: String,
    #[serde(default)]
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug)]
pub struct Catalog {
    version: String,
    descriptors: Vec<CapabilityDescriptor>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse a catalog document in OpenAI function format.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(raw)?;
        let mut descriptors = Vec::with_capacity(doc.tools.len());
        let mut index = HashMap::with_capacity(doc.tools.len());

        for entry in doc.tools {
            let FunctionEntry {
                name,
                description,
                parameters,
            } = entry.function;

            if entry.kind != "function" {
                return Err(CatalogError::InvalidSchema {
                    name,
                    reason: format!("unsupported tool type {:?}", entry.kind),
                });
            }
            if parameters.get("type").and_then(Value::as_str) != Some("object") {
                return Err(CatalogError::InvalidSchema {
                    name,
                    reason: "parameters must be an object schema".into(),
                });
            }
            if index.insert(name.clone(), descriptors.len()).is_some() {
                return Err(CatalogError::DuplicateName(name));
            }
            descriptors.push(CapabilityDescriptor {
                name,
                description,
                parameters,
            });
        }

        for reserved in [STATE_QUERY_TOOL, SKIP_TOOL] {
            if !index.contains_key(reserved) {
                return Err(CatalogError::MissingReserved(reserved));
            }
        }

        Ok(Self {
            version: doc.version,
            descriptors,
            index,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.index.get(name).map(|&i| &self.descriptors[i])
    }

    pub fn descriptors(&self) -> &[CapabilityDescriptor] {
        &self.descriptors
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.name.as_str())
    }

    pub fn kind(&self, name: &str) -> CapabilityKind {
        match name {
            STATE_QUERY_TOOL => CapabilityKind::StateQuery,
            SKIP_TOOL => CapabilityKind::Skip,
            _ if self.index.contains_key(name) => CapabilityKind::Action,
            _ => CapabilityKind::Unknown,
        }
    }

    /// Check tool arguments against the capability's parameter schema.
    /// Returns `None` when the tool is not in the catalog.
    pub fn check_arguments(&self, name: &str, arguments: &Value) -> Option<Vec<SchemaViolation>> {
        self.get(name)
            .map(|descriptor| schema::check(&descriptor.parameters, arguments))
    }

    /// Render the tool list in the provider's function-calling format.
    pub fn to_openai_tools(&self) -> Vec<Value> {
        self.descriptors
            .iter()
            .map(|d| {
                json!({
                    "type": "function",
                    "function": {
                        "name": d.name,
                        "description": d.description,
                        "parameters": d.parameters,
                    }
                })
            })
            .collect()
    }
}
