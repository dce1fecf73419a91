//! Core data models for the category catalog
//!
//! This module contains the flat category record as received from the catalog
//! endpoint, the parent reference type that separates roots from lookups, and
//! the tree node produced by the tree builder.

pub mod client;
pub mod tree;

pub use client::{CatalogClient, CatalogSource, FetchError};
pub use tree::{build_tree, root_categories};

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque identifier of a category
///
/// The catalog sends ids as JSON strings. Integer ids are accepted as well and
/// kept as their decimal text, so `1` and `"1"` name the same category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(String);

impl CategoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CategoryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Serialize for CategoryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

struct CategoryIdVisitor;

impl<'de> Visitor<'de> for CategoryIdVisitor {
    type Value = CategoryId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or integer category id")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<CategoryId, E> {
        Ok(CategoryId(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<CategoryId, E> {
        Ok(CategoryId(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<CategoryId, E> {
        Ok(CategoryId(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<CategoryId, E> {
        Ok(CategoryId(v.to_string()))
    }
}

impl<'de> Deserialize<'de> for CategoryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CategoryIdVisitor)
    }
}

/// Where a category hangs in the tree
///
/// Only JSON `null` marks a root. Any string, including the four characters
/// `"null"`, is a reference to another category's id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParentRef {
    /// `parent: null`, a top-level category
    Root,
    /// `parent: "<id>"`, attached under the category with that id if it exists
    Category(CategoryId),
    /// The `parent` key was missing. Never a root, never resolvable.
    #[default]
    Unspecified,
}

impl ParentRef {
    pub fn is_root(&self) -> bool {
        matches!(self, ParentRef::Root)
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, ParentRef::Unspecified)
    }

    /// Returns the referenced parent id, if this is a lookup
    pub fn id(&self) -> Option<&CategoryId> {
        match self {
            ParentRef::Category(id) => Some(id),
            _ => None,
        }
    }
}

impl Serialize for ParentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParentRef::Category(id) => id.serialize(serializer),
            ParentRef::Root | ParentRef::Unspecified => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ParentRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<CategoryId>::deserialize(deserializer)? {
            None => ParentRef::Root,
            Some(id) => ParentRef::Category(id),
        })
    }
}

/// Reads an optional text field, treating anything but a JSON string as absent
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// A category as sent by the catalog endpoint, one row per category
///
/// Fields the catalog sends beyond `id`/`name`/`slug`/`parent` are kept in
/// `extra` and written back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    /// Unique identifier for the category
    pub id: CategoryId,
    /// Display label, not validated
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    /// URL-safe identifier, not validated
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub slug: Option<String>,
    /// Parent reference, see [`ParentRef`]
    #[serde(default, skip_serializing_if = "ParentRef::is_unspecified")]
    pub parent: ParentRef,
    /// Any other fields present on the record
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CategoryRecord {
    /// Creates a root record with only an id
    pub fn root(id: impl Into<CategoryId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            slug: None,
            parent: ParentRef::Root,
            extra: Map::new(),
        }
    }

    /// Creates a record attached under `parent`
    pub fn child_of(id: impl Into<CategoryId>, parent: impl Into<CategoryId>) -> Self {
        Self {
            parent: ParentRef::Category(parent.into()),
            ..Self::root(id)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Label used when printing; falls back to the slug, then the id
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.slug.as_deref())
            .unwrap_or(self.id.as_str())
    }
}

/// A category with its children, in the order they appeared in the flat list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTreeNode {
    #[serde(flatten)]
    pub record: CategoryRecord,
    pub children: Vec<CategoryTreeNode>,
}

impl CategoryTreeNode {
    pub fn new(record: CategoryRecord) -> Self {
        Self {
            record,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> &CategoryId {
        &self.record.id
    }

    /// Number of nodes in this subtree, including this one
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Depth-first search for a node by id within this subtree
    pub fn find(&self, id: &CategoryId) -> Option<&CategoryTreeNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.id() == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}
