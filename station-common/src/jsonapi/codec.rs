//! Wire codec with the `xa` extension
//!
//! An attribute value may carry relationships and links under the
//! `xa:relationships` / `xa:links` members. Encoding flattens
//! [`Embedded`] values into such objects; decoding expands any attribute
//! object holding those members back into an [`Embedded`]. Every other
//! attribute value passes through untouched.
//!
//! The member names are the only marker on the wire, so an [`Embedded`]
//! with neither relationships nor links encodes as a plain object and
//! decodes back as [`AttrValue::Value`]. The JSON is identical either way.

use super::{
    AttrValue, Attributes, Document, Embedded, Link, Links, PrimaryData, Related, Relationship,
    Resource, XA_EXTENSION, XA_LINKS, XA_RELATIONSHIPS,
};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised while decoding a wire document
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("{0} must be a JSON object")]
    NotAnObject(&'static str),

    #[error("{context} is missing required member '{member}'")]
    MissingMember {
        member: &'static str,
        context: &'static str,
    },

    #[error("member '{member}' must be {expected}")]
    InvalidMember {
        member: String,
        expected: &'static str,
    },
}

// ========================================
// Encoding
// ========================================

/// Serialize a document to wire JSON
pub fn encode_document(document: &Document) -> Value {
    let mut out = Map::new();
    out.insert(
        "jsonapi".to_string(),
        json!({ "version": "1.1", "ext": [XA_EXTENSION] }),
    );

    let data = match &document.data {
        PrimaryData::One(Some(r)) => encode_resource(r),
        PrimaryData::One(None) => Value::Null,
        PrimaryData::Many(list) => Value::Array(list.iter().map(encode_resource).collect()),
    };
    out.insert("data".to_string(), data);

    let primary = document.data.resources();
    let included = collect_included(&primary, &document.include);
    if !included.is_empty() {
        out.insert(
            "included".to_string(),
            Value::Array(included.into_iter().map(encode_resource).collect()),
        );
    }

    if !document.links.is_empty() {
        out.insert("links".to_string(), encode_links(&document.links));
    }
    if let Some(meta) = &document.meta {
        out.insert("meta".to_string(), Value::Object(meta.clone()));
    }

    Value::Object(out)
}

/// Walk include paths from the primary resources, collecting full related
/// resources once each, in discovery order
fn collect_included<'a>(primary: &[&'a Resource], paths: &[String]) -> Vec<&'a Resource> {
    let mut seen: HashSet<(&str, &str)> = primary.iter().map(|r| r.identity()).collect();
    let mut included = Vec::new();

    for path in paths {
        let mut current: Vec<&'a Resource> = primary.to_vec();
        for segment in path.split('.') {
            let next: Vec<&'a Resource> = current
                .iter()
                .filter_map(|r| r.relationship(segment))
                .flat_map(|rel| rel.resources())
                .collect();
            for &resource in &next {
                if !resource.is_stub() && seen.insert(resource.identity()) {
                    included.push(resource);
                }
            }
            current = next;
        }
    }

    included
}

/// Serialize one resource object
pub fn encode_resource(resource: &Resource) -> Value {
    let mut out = Map::new();
    out.insert("type".to_string(), Value::String(resource.kind.clone()));
    out.insert("id".to_string(), Value::String(resource.id.clone()));

    if !resource.attributes.is_empty() {
        out.insert(
            "attributes".to_string(),
            encode_attributes(&resource.attributes),
        );
    }
    if !resource.relationships.is_empty() {
        out.insert(
            "relationships".to_string(),
            encode_relationships(&resource.relationships),
        );
    }
    if !resource.links.is_empty() {
        out.insert("links".to_string(), encode_links(&resource.links));
    }
    if let Some(meta) = &resource.meta {
        out.insert("meta".to_string(), Value::Object(meta.clone()));
    }

    Value::Object(out)
}

fn encode_attributes(attributes: &Attributes) -> Value {
    Value::Object(
        attributes
            .iter()
            .map(|(name, value)| (name.clone(), encode_attr(value)))
            .collect(),
    )
}

fn encode_attr(value: &AttrValue) -> Value {
    match value {
        AttrValue::Value(v) => v.clone(),
        AttrValue::List(items) => Value::Array(items.iter().map(encode_attr).collect()),
        AttrValue::Embedded(embedded) => {
            let mut out = match encode_attributes(&embedded.fields) {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            if !embedded.relationships.is_empty() {
                out.insert(
                    XA_RELATIONSHIPS.to_string(),
                    encode_relationships(&embedded.relationships),
                );
            }
            if !embedded.links.is_empty() {
                out.insert(XA_LINKS.to_string(), encode_links(&embedded.links));
            }
            Value::Object(out)
        }
    }
}

fn encode_relationships(relationships: &IndexMap<String, Relationship>) -> Value {
    Value::Object(
        relationships
            .iter()
            .map(|(name, rel)| (name.clone(), encode_relationship(rel)))
            .collect(),
    )
}

fn encode_relationship(relationship: &Relationship) -> Value {
    let mut out = Map::new();
    match &relationship.related {
        Related::One(Some(r)) => {
            out.insert("data".to_string(), identifier(r));
        }
        Related::One(None) => {
            out.insert("data".to_string(), Value::Null);
        }
        Related::Many(list) => {
            out.insert(
                "data".to_string(),
                Value::Array(list.iter().map(identifier).collect()),
            );
        }
        Related::NotLoaded => {}
    }
    if !relationship.links.is_empty() {
        out.insert("links".to_string(), encode_links(&relationship.links));
    }
    if let Some(meta) = &relationship.meta {
        out.insert("meta".to_string(), Value::Object(meta.clone()));
    }
    Value::Object(out)
}

fn identifier(resource: &Resource) -> Value {
    json!({ "type": resource.kind, "id": resource.id })
}

fn encode_links(links: &Links) -> Value {
    Value::Object(
        links
            .iter()
            .map(|(name, link)| {
                let value = match &link.meta {
                    None => Value::String(link.href.clone()),
                    Some(meta) => json!({ "href": link.href, "meta": meta }),
                };
                (name.clone(), value)
            })
            .collect(),
    )
}

// ========================================
// Decoding
// ========================================

/// Parse a wire document
///
/// Relationship identifiers are resolved against `included`; the include
/// paths that resolution followed are recorded on the returned document.
pub fn decode_document(value: &Value) -> Result<Document, CodecError> {
    let root = value.as_object().ok_or(CodecError::NotAnObject("document"))?;

    let included = match root.get("included") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(decode_resource)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(CodecError::InvalidMember {
                member: "included".to_string(),
                expected: "an array",
            })
        }
    };
    let index: HashMap<(String, String), Resource> = included
        .into_iter()
        .map(|r| ((r.kind.clone(), r.id.clone()), r))
        .collect();

    let mut include = Vec::new();
    let data = match root.get("data") {
        None => {
            return Err(CodecError::MissingMember {
                member: "data",
                context: "document",
            })
        }
        Some(Value::Null) => PrimaryData::One(None),
        Some(Value::Array(items)) => {
            let mut resources = Vec::with_capacity(items.len());
            for item in items {
                let mut resource = decode_resource(item)?;
                resolve(&mut resource, &index, &mut Vec::new(), "", &mut include);
                resources.push(resource);
            }
            PrimaryData::Many(resources)
        }
        Some(item) => {
            let mut resource = decode_resource(item)?;
            resolve(&mut resource, &index, &mut Vec::new(), "", &mut include);
            PrimaryData::One(Some(resource))
        }
    };

    let links = match root.get("links") {
        Some(v) => decode_links(v)?,
        None => Links::new(),
    };
    let meta = decode_meta(root.get("meta"))?;

    Ok(Document {
        data,
        links,
        meta,
        include,
    })
}

/// Replace identifier stubs with full resources from `included`
///
/// `trail` holds the identities on the current path so cyclic graphs stop
/// at the first repeat, leaving that linkage as a stub.
fn resolve(
    resource: &mut Resource,
    index: &HashMap<(String, String), Resource>,
    trail: &mut Vec<(String, String)>,
    prefix: &str,
    include: &mut Vec<String>,
) {
    trail.push((resource.kind.clone(), resource.id.clone()));

    for (name, relationship) in resource.relationships.iter_mut() {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        let slots: Vec<&mut Resource> = match &mut relationship.related {
            Related::One(Some(r)) => vec![r.as_mut()],
            Related::Many(list) => list.iter_mut().collect(),
            Related::One(None) | Related::NotLoaded => Vec::new(),
        };

        for slot in slots {
            let key = (slot.kind.clone(), slot.id.clone());
            if trail.contains(&key) {
                continue;
            }
            if let Some(full) = index.get(&key) {
                *slot = full.clone();
                if !include.contains(&path) {
                    include.push(path.clone());
                }
                resolve(slot, index, trail, &path, include);
            }
        }
    }

    trail.pop();
}

/// Parse one resource object
pub fn decode_resource(value: &Value) -> Result<Resource, CodecError> {
    let obj = value.as_object().ok_or(CodecError::NotAnObject("resource"))?;

    let kind = required_string(obj, "type", "resource")?;
    let id = match obj.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => {
            return Err(CodecError::InvalidMember {
                member: "id".to_string(),
                expected: "a string",
            })
        }
        None => {
            return Err(CodecError::MissingMember {
                member: "id",
                context: "resource",
            })
        }
    };

    let mut resource = Resource::new(kind, id);

    if let Some(attrs) = obj.get("attributes") {
        let attrs = attrs.as_object().ok_or(CodecError::InvalidMember {
            member: "attributes".to_string(),
            expected: "an object",
        })?;
        for (name, value) in attrs {
            resource
                .attributes
                .insert(name.clone(), decode_attr(value)?);
        }
    }
    if let Some(rels) = obj.get("relationships") {
        resource.relationships = decode_relationships(rels)?;
    }
    if let Some(links) = obj.get("links") {
        resource.links = decode_links(links)?;
    }
    resource.meta = decode_meta(obj.get("meta"))?;

    Ok(resource)
}

fn decode_attr(value: &Value) -> Result<AttrValue, CodecError> {
    match value {
        Value::Object(obj) if obj.contains_key(XA_RELATIONSHIPS) || obj.contains_key(XA_LINKS) => {
            // Expand into a scratch resource so relationship/link parsing is
            // shared with top-level resources, then lift its collections out.
            let mut scratch = Map::new();
            scratch.insert("type".to_string(), Value::String("xa".to_string()));
            scratch.insert("id".to_string(), Value::String(String::new()));
            if let Some(rels) = obj.get(XA_RELATIONSHIPS) {
                scratch.insert("relationships".to_string(), rels.clone());
            }
            if let Some(links) = obj.get(XA_LINKS) {
                scratch.insert("links".to_string(), links.clone());
            }
            let scratch = decode_resource(&Value::Object(scratch))?;

            let mut fields = Attributes::new();
            for (name, v) in obj {
                if name != XA_RELATIONSHIPS && name != XA_LINKS {
                    fields.insert(name.clone(), decode_attr(v)?);
                }
            }

            Ok(AttrValue::Embedded(Embedded {
                fields,
                relationships: scratch.relationships,
                links: scratch.links,
            }))
        }
        Value::Array(items) => {
            let decoded = items
                .iter()
                .map(decode_attr)
                .collect::<Result<Vec<_>, _>>()?;
            if decoded.iter().all(|d| matches!(d, AttrValue::Value(_))) {
                Ok(AttrValue::Value(value.clone()))
            } else {
                Ok(AttrValue::List(decoded))
            }
        }
        other => Ok(AttrValue::Value(other.clone())),
    }
}

fn decode_relationships(value: &Value) -> Result<IndexMap<String, Relationship>, CodecError> {
    let obj = value.as_object().ok_or(CodecError::InvalidMember {
        member: "relationships".to_string(),
        expected: "an object",
    })?;

    let mut out = IndexMap::new();
    for (name, rel) in obj {
        let rel_obj = rel.as_object().ok_or(CodecError::InvalidMember {
            member: name.clone(),
            expected: "a relationship object",
        })?;

        let related = match rel_obj.get("data") {
            None => Related::NotLoaded,
            Some(Value::Null) => Related::One(None),
            Some(Value::Array(items)) => Related::Many(
                items
                    .iter()
                    .map(decode_identifier)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(item) => Related::One(Some(Box::new(decode_identifier(item)?))),
        };
        let links = match rel_obj.get("links") {
            Some(v) => decode_links(v)?,
            None => Links::new(),
        };

        out.insert(
            name.clone(),
            Relationship {
                name: name.clone(),
                related,
                links,
                meta: decode_meta(rel_obj.get("meta"))?,
            },
        );
    }
    Ok(out)
}

fn decode_identifier(value: &Value) -> Result<Resource, CodecError> {
    let obj = value
        .as_object()
        .ok_or(CodecError::NotAnObject("resource identifier"))?;
    let kind = required_string(obj, "type", "resource identifier")?;
    let id = required_string(obj, "id", "resource identifier")?;
    Ok(Resource::new(kind, id))
}

fn decode_links(value: &Value) -> Result<Links, CodecError> {
    let obj = value.as_object().ok_or(CodecError::InvalidMember {
        member: "links".to_string(),
        expected: "an object",
    })?;

    let mut links = Links::new();
    for (name, link) in obj {
        let decoded = match link {
            Value::String(href) => Link::new(href.clone()),
            Value::Object(o) => Link {
                href: required_string(o, "href", "link object")?,
                meta: decode_meta(o.get("meta"))?,
            },
            // JSON:API allows null for absent links
            Value::Null => continue,
            _ => {
                return Err(CodecError::InvalidMember {
                    member: name.clone(),
                    expected: "a link string or link object",
                })
            }
        };
        links.insert(name.clone(), decoded);
    }
    Ok(links)
}

fn decode_meta(value: Option<&Value>) -> Result<Option<Map<String, Value>>, CodecError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(m)) => Ok(Some(m.clone())),
        Some(_) => Err(CodecError::InvalidMember {
            member: "meta".to_string(),
            expected: "an object",
        }),
    }
}

fn required_string(
    obj: &Map<String, Value>,
    member: &'static str,
    context: &'static str,
) -> Result<String, CodecError> {
    match obj.get(member) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(CodecError::InvalidMember {
            member: member.to_string(),
            expected: "a string",
        }),
        None => Err(CodecError::MissingMember { member, context }),
    }
}
