//! Addressing primitives
//!
//! Every configured node instance is named by a [`NodeInstancePath`] and every
//! resource a provider exposes is named by a [`ResourceId`]. Both flatten into
//! a single string token so they can cross transport boundaries untouched:
//!
//! ```text
//! plugin_name>node_type>node_name>instance_name
//! kind@<serialized node instance path>@unique_id
//! ```
//!
//! `&` is the escape character at both levels. Inside a path field `&` and `>`
//! are written as `&&` and `&>`; inside a resource id field `&` and `@` are
//! written as `&&` and `&@`. The serialized path is escaped a second time when
//! it is embedded in a resource id, so decoding peels one level at a time.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const ESCAPE: char = '&';
const PATH_DELIMITER: char = '>';
const RESOURCE_DELIMITER: char = '@';

// ============================================================================
// Escaping
// ============================================================================

fn escape_into(out: &mut String, field: &str, delimiter: char) {
    for c in field.chars() {
        if c == ESCAPE || c == delimiter {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

/// Split `input` on unescaped `delimiter`, unescaping each field
///
/// Walks the string one character at a time with an `escape_next` flag: a bare
/// delimiter closes the current field, an escaped one is copied literally.
fn split_escaped(input: &str, delimiter: char) -> Result<Vec<String>> {
    let mut fields = vec![String::new()];
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            if c != ESCAPE && c != delimiter {
                return Err(Error::MalformedAddress(format!(
                    "invalid escape sequence '{}{}' in '{}'",
                    ESCAPE, c, input
                )));
            }
            if let Some(field) = fields.last_mut() {
                field.push(c);
            }
            escape_next = false;
            continue;
        }

        if c == ESCAPE {
            escape_next = true;
        } else if c == delimiter {
            fields.push(String::new());
        } else if let Some(field) = fields.last_mut() {
            field.push(c);
        }
    }

    if escape_next {
        return Err(Error::MalformedAddress(format!(
            "dangling escape character at end of '{}'",
            input
        )));
    }

    Ok(fields)
}

fn expect_fields(input: &str, delimiter: char, expected: usize) -> Result<Vec<String>> {
    let fields = split_escaped(input, delimiter)?;
    if fields.len() != expected {
        return Err(Error::MalformedAddress(format!(
            "expected {} '{}'-separated fields in '{}', found {}",
            expected,
            delimiter,
            input,
            fields.len()
        )));
    }
    Ok(fields)
}

// ============================================================================
// NodeInstancePath
// ============================================================================

/// Capability a node type implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCapability {
    Controller,
    Provider,
    Listener,
}

impl NodeCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeCapability::Controller => "controller",
            NodeCapability::Provider => "provider",
            NodeCapability::Listener => "listener",
        }
    }
}

impl fmt::Display for NodeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeCapability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "controller" => Ok(NodeCapability::Controller),
            "provider" => Ok(NodeCapability::Provider),
            "listener" => Ok(NodeCapability::Listener),
            other => Err(Error::InvalidNodeCapability(other.to_string())),
        }
    }
}

/// Unique address of one configured instance of one node type of one plugin
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeInstancePath {
    pub plugin_name: String,
    pub node_type: NodeCapability,
    pub node_name: String,
    pub instance_name: String,
}

impl NodeInstancePath {
    pub fn new(
        plugin_name: impl Into<String>,
        node_type: NodeCapability,
        node_name: impl Into<String>,
        instance_name: impl Into<String>,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            node_type,
            node_name: node_name.into(),
            instance_name: instance_name.into(),
        }
    }

    /// Flatten into `plugin>type>node>instance`
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        escape_into(&mut out, &self.plugin_name, PATH_DELIMITER);
        out.push(PATH_DELIMITER);
        escape_into(&mut out, self.node_type.as_str(), PATH_DELIMITER);
        out.push(PATH_DELIMITER);
        escape_into(&mut out, &self.node_name, PATH_DELIMITER);
        out.push(PATH_DELIMITER);
        escape_into(&mut out, &self.instance_name, PATH_DELIMITER);
        out
    }

    /// Exact inverse of [`NodeInstancePath::serialize`]
    pub fn deserialize(serialized: &str) -> Result<Self> {
        let mut fields = expect_fields(serialized, PATH_DELIMITER, 4)?.into_iter();
        // expect_fields guarantees four entries
        let plugin_name = fields.next().unwrap_or_default();
        let node_type = fields.next().unwrap_or_default().parse()?;
        let node_name = fields.next().unwrap_or_default();
        let instance_name = fields.next().unwrap_or_default();

        Ok(Self {
            plugin_name,
            node_type,
            node_name,
            instance_name,
        })
    }
}

impl fmt::Display for NodeInstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&NodeInstancePath::serialize(self))
    }
}

impl FromStr for NodeInstancePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NodeInstancePath::deserialize(s)
    }
}

// ============================================================================
// ResourceId
// ============================================================================

/// Kind of resource a [`ResourceId`] points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Song,
    Album,
    Artist,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Song => "song",
            ResourceKind::Album => "album",
            ResourceKind::Artist => "artist",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "song" => Ok(ResourceKind::Song),
            "album" => Ok(ResourceKind::Album),
            "artist" => Ok(ResourceKind::Artist),
            other => Err(Error::InvalidResourceKind(other.to_string())),
        }
    }
}

/// Address of one resource exposed by exactly one provider instance
///
/// `unique_id` is opaque outside the owning provider. The id only resolves
/// while that provider instance is still registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub node_instance_path: NodeInstancePath,
    pub unique_id: String,
}

impl ResourceId {
    pub fn new(
        kind: ResourceKind,
        node_instance_path: NodeInstancePath,
        unique_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            node_instance_path,
            unique_id: unique_id.into(),
        }
    }

    pub fn song(node_instance_path: NodeInstancePath, unique_id: impl Into<String>) -> Self {
        Self::new(ResourceKind::Song, node_instance_path, unique_id)
    }

    pub fn album(node_instance_path: NodeInstancePath, unique_id: impl Into<String>) -> Self {
        Self::new(ResourceKind::Album, node_instance_path, unique_id)
    }

    pub fn artist(node_instance_path: NodeInstancePath, unique_id: impl Into<String>) -> Self {
        Self::new(ResourceKind::Artist, node_instance_path, unique_id)
    }

    /// Flatten into `kind@path@unique_id`
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        escape_into(&mut out, self.kind.as_str(), RESOURCE_DELIMITER);
        out.push(RESOURCE_DELIMITER);
        escape_into(&mut out, &self.node_instance_path.serialize(), RESOURCE_DELIMITER);
        out.push(RESOURCE_DELIMITER);
        escape_into(&mut out, &self.unique_id, RESOURCE_DELIMITER);
        out
    }

    /// Exact inverse of [`ResourceId::serialize`]
    ///
    /// An unknown kind prefix fails with [`Error::InvalidResourceKind`].
    pub fn deserialize(serialized: &str) -> Result<Self> {
        let mut fields = expect_fields(serialized, RESOURCE_DELIMITER, 3)?.into_iter();
        let kind = fields.next().unwrap_or_default().parse()?;
        let node_instance_path = NodeInstancePath::deserialize(&fields.next().unwrap_or_default())?;
        let unique_id = fields.next().unwrap_or_default();

        Ok(Self {
            kind,
            node_instance_path,
            unique_id,
        })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&ResourceId::serialize(self))
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResourceId::deserialize(s)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ResourceId::deserialize(&raw).map_err(serde::de::Error::custom)
    }
}
