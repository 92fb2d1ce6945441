//! Core value types: identifiers, scopes, ordering records and resources.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string-like value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Opaque identity of whoever an ordering belongs to.
    ///
    /// Two owners are the same owner iff their string values are equal.
    Owner
);

string_id!(
    /// Tag naming the external collection a resource lives in.
    ResourceType
);

string_id!(
    /// Opaque key of an item inside an external collection.
    ResourceId
);

/// System-assigned identifier of an [`OrderingRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(uuid::Uuid);

impl RecordId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parse an identifier from its hyphenated string form.
    pub fn parse(value: &str) -> Option<Self> {
        uuid::Uuid::parse_str(value).ok().map(Self)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The partition within which positions are dense and unique.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub owner: Owner,
    pub resource_type: ResourceType,
}

impl Scope {
    pub fn new(owner: impl Into<Owner>, resource_type: impl Into<ResourceType>) -> Self {
        Self {
            owner: owner.into(),
            resource_type: resource_type.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.resource_type)
    }
}

/// One item's position within one owner's ordering of a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingRecord {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner: Owner,
    pub position: usize,
    pub resource_type: ResourceType,
    pub resource_id: ResourceId,
}

impl OrderingRecord {
    /// A freshly created record for `resource_id` at `position`.
    pub fn new(
        scope: &Scope,
        resource_id: ResourceId,
        position: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::generate(),
            created_at: now,
            updated_at: now,
            owner: scope.owner.clone(),
            position,
            resource_type: scope.resource_type.clone(),
            resource_id,
        }
    }

    /// The scope this record belongs to.
    pub fn scope(&self) -> Scope {
        Scope {
            owner: self.owner.clone(),
            resource_type: self.resource_type.clone(),
        }
    }
}

/// An item of an external collection as seen through a backend.
///
/// The payload is opaque to the engine. Hosts decode it into their own types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Resource {
    pub fn new(
        id: impl Into<ResourceId>,
        created_at: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            created_at,
            payload,
        }
    }
}

/// Where a single reordered item should land.
///
/// Replaces the `-1` "append" sentinel with an explicit variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// After every other record of the scope.
    End,
    /// At the given zero-based index.
    At(usize),
}

impl Placement {
    /// Translate a signed wire position where `-1` means "at the end".
    ///
    /// Returns `None` for any other negative value.
    pub fn from_signed(position: i64) -> Option<Self> {
        match position {
            -1 => Some(Placement::End),
            p if p >= 0 => usize::try_from(p).ok().map(Placement::At),
            _ => None,
        }
    }
}

impl From<usize> for Placement {
    fn from(position: usize) -> Self {
        Placement::At(position)
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::End => f.write_str("end"),
            Placement::At(p) => write!(f, "{p}"),
        }
    }
}
