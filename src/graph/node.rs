//! Node representation as held by the board

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a node
///
/// Assigned by the gateway and opaque to the client. Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a NodeId from a string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new random NodeId (UUID v4), as the bundled gateways assign them
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The kind of artifact a node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// A document written on the board
    #[default]
    Document,
    /// An ingested web source
    Source,
    /// An abstract concept
    Concept,
    /// An image
    Image,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Source => "source",
            Self::Concept => "concept",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(Self::Document),
            "source" => Ok(Self::Source),
            "concept" => Ok(Self::Concept),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown node type: {}", other)),
        }
    }
}

/// Typed metadata values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<PropertyValue>),
    Object(HashMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Numeric view of the value, if it is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Open, string-keyed node metadata
pub type Metadata = HashMap<String, PropertyValue>;

/// Metadata keys holding the persisted layout hint
pub const META_X: &str = "x";
pub const META_Y: &str = "y";

/// A node in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier, immutable after creation
    pub id: NodeId,
    /// Artifact kind
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    /// Display title
    pub title: String,
    /// Where the artifact body is persisted; empty until first save
    #[serde(default)]
    pub content_path: String,
    /// Open metadata, may carry an `x`/`y` layout hint
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Create a node with the given id, type and title
    pub fn new(id: impl Into<NodeId>, node_type: NodeType, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            node_type,
            title: title.into(),
            content_path: String::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Set the persisted layout hint
    pub fn with_position_hint(self, x: f64, y: f64) -> Self {
        self.with_metadata(META_X, PropertyValue::Float(x))
            .with_metadata(META_Y, PropertyValue::Float(y))
    }

    /// The persisted layout hint, when both coordinates are present and numeric
    pub fn position_hint(&self) -> Option<(f64, f64)> {
        let x = self.metadata.get(META_X)?.as_f64()?;
        let y = self.metadata.get(META_Y)?.as_f64()?;
        Some((x, y))
    }
}
