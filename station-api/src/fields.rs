//! Sparse fieldsets
//!
//! `fields[<type>]` is either an allow-list (`fields[album]=artist,album`) or
//! a deny-list (`fields[album]=-tracks`). The first requested name decides
//! which, once per type per request; the decision lives in
//! [`FieldVisibility`], which is built per request and never shared.

use std::collections::{HashMap, HashSet};

/// Emission mode for one type
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMode {
    /// Nothing requested: every field is emitted
    All,
    /// Only the named fields are emitted
    Allow(HashSet<String>),
    /// Every field except the negated ones (stored without the `-`)
    Deny(HashSet<String>),
}

impl FieldMode {
    pub fn from_names(names: &[String]) -> Self {
        let Some(first) = names.first() else {
            return FieldMode::All;
        };

        if first.starts_with('-') {
            FieldMode::Deny(
                names
                    .iter()
                    .filter_map(|n| n.strip_prefix('-'))
                    .map(String::from)
                    .collect(),
            )
        } else {
            FieldMode::Allow(names.iter().cloned().collect())
        }
    }

    pub fn emits(&self, name: &str) -> bool {
        match self {
            FieldMode::All => true,
            FieldMode::Allow(names) => names.contains(name),
            FieldMode::Deny(negated) => !negated.contains(name),
        }
    }

    /// True only for an allow-list that names `name` explicitly
    pub fn names(&self, name: &str) -> bool {
        matches!(self, FieldMode::Allow(names) if names.contains(name))
    }
}

/// Per-request field visibility for every type
#[derive(Debug, Clone, Default)]
pub struct FieldVisibility {
    modes: HashMap<String, FieldMode>,
    include_requested: bool,
}

static ALL: FieldMode = FieldMode::All;

impl FieldVisibility {
    /// Build from the request's `fields[...]` map and whether it carried `include`
    pub fn new(fields: &HashMap<String, Vec<String>>, include_requested: bool) -> Self {
        Self {
            modes: fields
                .iter()
                .map(|(kind, names)| (kind.clone(), FieldMode::from_names(names)))
                .collect(),
            include_requested,
        }
    }

    pub fn mode(&self, kind: &str) -> &FieldMode {
        self.modes.get(kind).unwrap_or(&ALL)
    }

    pub fn emits(&self, kind: &str, name: &str) -> bool {
        self.mode(kind).emits(name)
    }

    pub fn names(&self, kind: &str, name: &str) -> bool {
        self.mode(kind).names(name)
    }

    /// Whether a `fields[kind]` directive was sent at all
    pub fn is_restricted(&self, kind: &str) -> bool {
        !matches!(self.mode(kind), FieldMode::All)
    }

    /// Deny mode that removed a real field, attribute or relationship,
    /// drops relationships too unless the client asked for some with
    /// `include`
    pub fn strips_relationships(&self, kind: &str, fields: &[&str]) -> bool {
        if self.include_requested {
            return false;
        }
        match self.mode(kind) {
            FieldMode::Deny(negated) => fields.iter().any(|f| negated.contains(*f)),
            _ => false,
        }
    }
}
