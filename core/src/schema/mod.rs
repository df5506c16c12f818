//! Schema registry
//!
//! A process-wide, immutable table mapping tag names to their binary id,
//! logical type and the parent tags they may appear under. It is built once on
//! first use and never mutated; lookups of unknown names fail fast.

mod definitions;

pub use definitions::DEFINITIONS;

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Context key used for tags that appear at the message root
const ROOT_CONTEXT: &str = "";

/// Logical type of a tag payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagType {
    /// Holds child tags, never raw bytes
    Container,

    /// Minimal big-endian unsigned integer
    Unsigned,

    /// Minimal two's-complement integer
    Signed,

    /// Verbatim bytes
    Binary,

    /// UTF-8 text
    Utf8,

    /// ASCII text
    Ascii,

    /// Signed millisecond offset from 2001-01-01T00:00:00Z
    Date,

    /// Zig-zag scale followed by two's-complement unscaled value
    Decimal,
}

impl TagType {
    /// Whether the tag holds children
    pub fn is_container(self) -> bool {
        self == TagType::Container
    }
}

/// A single entry of the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDefinition {
    /// Tag name
    pub name: &'static str,

    /// Binary id, written verbatim on the wire
    pub id: &'static [u8],

    /// Payload type
    pub tag_type: TagType,

    /// Names of the tags this one may appear under; empty for message roots
    pub contexts: &'static [&'static str],
}

impl TagDefinition {
    /// Whether this tag is a message root
    pub fn is_root(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Whether this tag may appear under `parent`
    pub fn allowed_under(&self, parent: &str) -> bool {
        self.contexts.iter().any(|ctx| *ctx == parent)
    }
}

impl Display for TagDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}[{}]", self.name, hex::encode(self.id))
    }
}

/// Name and context indexed view over a set of definitions
#[derive(Debug)]
pub struct SchemaRegistry {
    by_name: HashMap<&'static str, &'static TagDefinition>,
    by_context: HashMap<&'static str, HashMap<&'static [u8], &'static TagDefinition>>,
}

impl SchemaRegistry {
    /// Index a definition table, rejecting ambiguous or dangling entries
    pub fn from_definitions(definitions: &'static [TagDefinition]) -> Result<Self> {
        let mut by_name = HashMap::new();
        for def in definitions {
            if by_name.insert(def.name, def).is_some() {
                return Err(CoreError::Schema(format!("Duplicate tag name {}", def.name)));
            }
        }

        let mut by_context: HashMap<&'static str, HashMap<&'static [u8], &'static TagDefinition>> =
            HashMap::new();
        for def in definitions {
            let contexts: &[&'static str] = if def.is_root() {
                &[ROOT_CONTEXT]
            } else {
                def.contexts
            };

            for ctx in contexts {
                if *ctx != ROOT_CONTEXT && !by_name.contains_key(ctx) {
                    return Err(CoreError::Schema(format!(
                        "Tag {} refers to undefined context {}",
                        def.name, ctx
                    )));
                }

                let ids = by_context.entry(*ctx).or_default();
                if let Some(existing) = ids.insert(def.id, def) {
                    return Err(CoreError::Schema(format!(
                        "Tags {} and {} share id {} under {}",
                        existing.name,
                        def.name,
                        hex::encode(def.id),
                        ctx
                    )));
                }
            }
        }

        Ok(Self { by_name, by_context })
    }

    /// Look up a definition by tag name
    pub fn by_name(&self, name: &str) -> Result<&'static TagDefinition> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::Schema(format!("Unknown tag name {}", name)))
    }

    /// Resolve a binary id read under `parent` (`None` for the message root)
    pub fn resolve(&self, parent: Option<&str>, id: &[u8]) -> Option<&'static TagDefinition> {
        self.by_context
            .get(parent.unwrap_or(ROOT_CONTEXT))
            .and_then(|ids| ids.get(id))
            .copied()
    }

    /// Number of known tags
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the registry holds no tags
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

static REGISTRY: OnceLock<std::result::Result<SchemaRegistry, String>> = OnceLock::new();

/// The process-wide registry over [`DEFINITIONS`]
pub fn registry() -> Result<&'static SchemaRegistry> {
    REGISTRY
        .get_or_init(|| SchemaRegistry::from_definitions(DEFINITIONS).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| CoreError::Schema(e.clone()))
}

/// Shorthand for `registry()?.by_name(name)`
pub fn definition(name: &str) -> Result<&'static TagDefinition> {
    registry()?.by_name(name)
}
