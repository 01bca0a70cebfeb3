//! Relationship flags
//!
//! Optional relationship data costs extra store reads. Views only compute a
//! group when its flag is set, and [`resolve`] derives the smallest flag set
//! that satisfies the client's `include` and `fields` request.

use crate::error::{ApiError, ApiResult};
use crate::fields::FieldVisibility;
use crate::views::ResourceKind;
use station_common::api::Principal;
use std::collections::HashSet;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Typed set of optional relationship groups
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RelationshipFlags(u8);

const BODY_BIT: u8 = 1 << 2;

impl RelationshipFlags {
    pub const NONE: Self = Self(0);
    /// Full label resource on albums
    pub const LABEL: Self = Self(1 << 0);
    /// Review resources on albums
    pub const REVIEWS: Self = Self(1 << 1);
    /// Review bodies; always carries REVIEWS with it
    pub const REVIEWS_WITH_BODY: Self = Self((1 << 1) | BODY_BIT);
    /// Album tracks and show events
    pub const TRACKS: Self = Self(1 << 3);
    /// Album artwork location
    pub const ARTWORK: Self = Self(1 << 4);
    /// Full origin show on rebroadcasts
    pub const ORIGIN: Self = Self(1 << 5);

    const NAMED: [(&'static str, Self); 6] = [
        ("LABEL", Self::LABEL),
        ("REVIEWS", Self::REVIEWS),
        ("REVIEWS_WITH_BODY", Self::REVIEWS_WITH_BODY),
        ("TRACKS", Self::TRACKS),
        ("ARTWORK", Self::ARTWORK),
        ("ORIGIN", Self::ORIGIN),
    ];

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear `other`; clearing REVIEWS clears the body refinement too
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
        if !self.contains(Self::REVIEWS) {
            self.0 &= !BODY_BIT;
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn intersection(self, other: Self) -> Self {
        let mut out = Self(self.0 & other.0);
        if !out.contains(Self::REVIEWS) {
            out.0 &= !BODY_BIT;
        }
        out
    }

    pub fn without(mut self, other: Self) -> Self {
        self.remove(other);
        self
    }
}

impl BitOr for RelationshipFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for RelationshipFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

impl BitAnd for RelationshipFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl fmt::Debug for RelationshipFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(name, flag)| {
                self.contains(*flag)
                    // REVIEWS is implied by REVIEWS_WITH_BODY
                    && !(*name == "REVIEWS" && self.contains(Self::REVIEWS_WITH_BODY))
            })
            .map(|(name, _)| *name)
            .collect();
        write!(f, "RelationshipFlags({})", names.join(" | "))
    }
}

/// Validated `include` paths, as (owner type, relationship) edges
#[derive(Debug, Clone, Default)]
pub struct IncludeSet {
    paths: Vec<String>,
    edges: HashSet<(ResourceKind, &'static str)>,
}

impl IncludeSet {
    /// Validate dotted paths against the relationship schema of `primary`
    pub fn parse(primary: ResourceKind, paths: &[String]) -> ApiResult<Self> {
        let mut set = IncludeSet::default();

        for path in paths {
            let mut owner = primary;
            for segment in path.split('.') {
                let (name, target) = owner
                    .relationships()
                    .iter()
                    .find(|(name, _)| *name == segment)
                    .copied()
                    .ok_or_else(|| ApiError::UnknownRelationship {
                        kind: owner.type_name().to_string(),
                        name: segment.to_string(),
                    })?;
                set.edges.insert((owner, name));
                owner = target;
            }
            set.paths.push(path.clone());
        }

        Ok(set)
    }

    pub fn contains(&self, owner: ResourceKind, relationship: &str) -> bool {
        self.edges.contains(&(owner, relationship))
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Minimal flag set for a request
///
/// `single` is true for one-resource fetches, where detail fields are
/// computed whenever visible; collections compute them only when an
/// allow-list names them.
pub fn resolve(
    primary: ResourceKind,
    single: bool,
    includes: &IncludeSet,
    fields: &FieldVisibility,
    principal: &Principal,
) -> ApiResult<RelationshipFlags> {
    let mut flags = RelationshipFlags::NONE;

    if includes.contains(ResourceKind::Album, "label") {
        flags |= RelationshipFlags::LABEL;
    }
    if includes.contains(ResourceKind::Show, "origin") {
        flags |= RelationshipFlags::ORIGIN;
    }

    if includes.contains(ResourceKind::Album, "reviews") || fields.names("album", "reviews") {
        flags |= RelationshipFlags::REVIEWS;
        if fields.is_restricted("review") && fields.emits("review", "review") {
            flags |= RelationshipFlags::REVIEWS_WITH_BODY;
        }
    }

    let detail_visible = |kind: ResourceKind, field: &str| {
        fields.names(kind.type_name(), field)
            || (single && primary == kind && fields.emits(kind.type_name(), field))
    };

    if detail_visible(ResourceKind::Album, "tracks") || detail_visible(ResourceKind::Show, "events")
    {
        flags |= RelationshipFlags::TRACKS;
    }

    // Artwork is never handed to anonymous clients
    if fields.names("album", "albumart") {
        principal.require_authenticated()?;
        flags |= RelationshipFlags::ARTWORK;
    } else if detail_visible(ResourceKind::Album, "albumart") && principal.is_authenticated() {
        flags |= RelationshipFlags::ARTWORK;
    }

    Ok(flags)
}
