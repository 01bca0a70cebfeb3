//! JSON:API document model
//!
//! Resources are built in memory with full related resources attached to
//! their relationships; [`codec`] turns a [`Document`] into wire JSON
//! (identifiers in `relationships`, full resources in `included`) and back.

pub mod codec;

use indexmap::IndexMap;
use serde_json::{Map, Value};

pub use codec::{decode_document, encode_document, CodecError};

/// JSON:API media type
pub const MEDIA_TYPE: &str = "application/vnd.api+json";

/// URI of the private extension allowing relationships inside attribute values
pub const XA_EXTENSION: &str = "urn:station:jsonapi:ext:xa";

/// Namespaced attribute member holding embedded relationships
pub const XA_RELATIONSHIPS: &str = "xa:relationships";

/// Namespaced attribute member holding embedded links
pub const XA_LINKS: &str = "xa:links";

/// Content-Type header value advertising the `xa` extension
pub fn content_type() -> String {
    format!("{}; ext=\"{}\"", MEDIA_TYPE, XA_EXTENSION)
}

pub type Meta = Map<String, Value>;
pub type Links = IndexMap<String, Link>;
pub type Attributes = IndexMap<String, AttrValue>;

/// A link, optionally carrying meta (serialized as a link object then)
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub href: String,
    pub meta: Option<Meta>,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            meta: None,
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn meta_value(&self, key: &str) -> Option<&Value> {
        self.meta.as_ref().and_then(|m| m.get(key))
    }
}

/// Attribute value
///
/// Plain JSON is carried untouched. `Embedded` objects and lists containing
/// them are what the `xa` extension exists for.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Value(Value),
    List(Vec<AttrValue>),
    Embedded(Embedded),
}

impl AttrValue {
    pub fn null() -> Self {
        AttrValue::Value(Value::Null)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            AttrValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_embedded(&self) -> Option<&Embedded> {
        match self {
            AttrValue::Embedded(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        AttrValue::Value(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Value(Value::String(value))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Value(Value::Bool(value))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Value(Value::from(value))
    }
}

impl From<usize> for AttrValue {
    fn from(value: usize) -> Self {
        AttrValue::Value(Value::from(value))
    }
}

impl From<Embedded> for AttrValue {
    fn from(value: Embedded) -> Self {
        AttrValue::Embedded(value)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(value: Vec<AttrValue>) -> Self {
        AttrValue::List(value)
    }
}

/// Inline sub-object with relationship semantics, not promoted to `included`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Embedded {
    pub fields: Attributes,
    pub relationships: IndexMap<String, Relationship>,
    pub links: Links,
}

impl Embedded {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships
            .insert(relationship.name.clone(), relationship);
        self
    }

    pub fn link(mut self, name: impl Into<String>, link: Link) -> Self {
        self.links.insert(name.into(), link);
        self
    }
}

/// Related data of a relationship
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Box<Resource>>),
    Many(Vec<Resource>),
    /// Links only; no resource linkage is emitted
    NotLoaded,
}

/// A named relationship
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub related: Related,
    pub links: Links,
    pub meta: Option<Meta>,
}

impl Relationship {
    pub fn to_one(name: impl Into<String>, resource: Option<Resource>) -> Self {
        Self {
            name: name.into(),
            related: Related::One(resource.map(Box::new)),
            links: Links::new(),
            meta: None,
        }
    }

    pub fn to_many(name: impl Into<String>, resources: Vec<Resource>) -> Self {
        Self {
            name: name.into(),
            related: Related::Many(resources),
            links: Links::new(),
            meta: None,
        }
    }

    pub fn links_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            related: Related::NotLoaded,
            links: Links::new(),
            meta: None,
        }
    }

    pub fn with_link(mut self, name: impl Into<String>, link: Link) -> Self {
        self.links.insert(name.into(), link);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Related resources in order, whatever the cardinality
    pub fn resources(&self) -> Vec<&Resource> {
        match &self.related {
            Related::One(Some(r)) => vec![r.as_ref()],
            Related::One(None) | Related::NotLoaded => Vec::new(),
            Related::Many(list) => list.iter().collect(),
        }
    }
}

/// One JSON:API resource object
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub kind: String,
    pub id: String,
    pub attributes: Attributes,
    pub relationships: IndexMap<String, Relationship>,
    pub links: Links,
    pub meta: Option<Meta>,
}

impl Resource {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            attributes: Attributes::new(),
            relationships: IndexMap::new(),
            links: Links::new(),
            meta: None,
        }
    }

    /// Identity pair used for linkage and `included` de-duplication
    pub fn identity(&self) -> (&str, &str) {
        (&self.kind, &self.id)
    }

    /// True when the resource carries nothing beyond its identity
    pub fn is_stub(&self) -> bool {
        self.attributes.is_empty() && self.relationships.is_empty()
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    pub fn add_relationship(&mut self, relationship: Relationship) {
        self.relationships
            .insert(relationship.name.clone(), relationship);
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.add_relationship(relationship);
        self
    }

    pub fn with_link(mut self, name: impl Into<String>, link: Link) -> Self {
        self.links.insert(name.into(), link);
        self
    }
}

/// Primary data of a document
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryData {
    One(Option<Resource>),
    Many(Vec<Resource>),
}

impl PrimaryData {
    pub fn resources(&self) -> Vec<&Resource> {
        match self {
            PrimaryData::One(Some(r)) => vec![r],
            PrimaryData::One(None) => Vec::new(),
            PrimaryData::Many(list) => list.iter().collect(),
        }
    }
}

/// Top-level document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub data: PrimaryData,
    pub links: Links,
    pub meta: Option<Meta>,
    /// Dotted relationship paths whose resources go to `included`
    pub include: Vec<String>,
}

impl Document {
    pub fn one(resource: Option<Resource>) -> Self {
        Self {
            data: PrimaryData::One(resource),
            links: Links::new(),
            meta: None,
            include: Vec::new(),
        }
    }

    pub fn many(resources: Vec<Resource>) -> Self {
        Self {
            data: PrimaryData::Many(resources),
            links: Links::new(),
            meta: None,
            include: Vec::new(),
        }
    }

    pub fn with_links(mut self, links: Links) -> Self {
        self.links.extend(links);
        self
    }

    pub fn with_include(mut self, include: impl IntoIterator<Item = String>) -> Self {
        self.include.extend(include);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Error object of an error document
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ErrorObject {
    pub status: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Error document
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
}

impl ErrorDocument {
    pub fn single(status: u16, title: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            errors: vec![ErrorObject {
                status: status.to_string(),
                title: title.into(),
                detail,
                meta: None,
            }],
        }
    }
}
