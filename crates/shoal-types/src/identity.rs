use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// Canonical textual length of an identifier (`8-4-4-4-12` plus hyphens).
const CANONICAL_LEN: usize = 36;

/// Byte offsets of the hyphens in the canonical form.
const HYPHENS: [usize; 4] = [8, 13, 18, 23];

/// The well-known identifier of every store's root object.
pub const ROOT_ID: ObjectId = ObjectId(Uuid::from_u128(1));

/// Network-wide unique identifier for an identifiable object.
///
/// Identifiers are UUID v1 values: time-ordered, generated locally without
/// coordination, and rendered in the canonical hyphenated form
/// (`xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`). The reserved [`ROOT_ID`] is never
/// produced by [`ObjectId::generate`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Generate a fresh, collision-free identifier.
    pub fn generate() -> Self {
        Self(Uuid::now_v1(node_id()))
    }

    /// The reserved root identifier.
    pub const fn root() -> Self {
        ROOT_ID
    }

    /// Returns `true` if this is the reserved root identifier.
    pub fn is_root(&self) -> bool {
        *self == ROOT_ID
    }

    /// Returns `true` iff `candidate` matches the canonical 8-4-4-4-12
    /// hexadecimal pattern.
    pub fn validate(candidate: &str) -> bool {
        let bytes = candidate.as_bytes();
        if bytes.len() != CANONICAL_LEN {
            return false;
        }
        bytes.iter().enumerate().all(|(i, b)| {
            if HYPHENS.contains(&i) {
                *b == b'-'
            } else {
                b.is_ascii_hexdigit()
            }
        })
    }

    /// Nullable variant of [`ObjectId::validate`]: `None` is never valid.
    pub fn validate_opt(candidate: Option<&str>) -> bool {
        candidate.is_some_and(Self::validate)
    }

    /// Parse an identifier that the caller guarantees is well-formed.
    ///
    /// # Panics
    ///
    /// Panics if `s` is not a canonical identifier. A malformed identifier at
    /// this point is a programming error; use [`ObjectId::try_parse`] for
    /// untrusted input.
    #[track_caller]
    pub fn parse(s: &str) -> Self {
        match Self::try_parse(s) {
            Ok(id) => id,
            Err(e) => panic!("{e}"),
        }
    }

    /// Parse an identifier, returning an error if it is malformed.
    pub fn try_parse(s: &str) -> Result<Self, TypeError> {
        if !Self::validate(s) {
            return Err(TypeError::InvalidIdentifier(s.to_string()));
        }
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| TypeError::InvalidIdentifier(s.to_string()))
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Short representation (first 8 characters).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

/// Per-process node field for v1 generation.
///
/// Random, with the multicast bit set so it can never collide with a real
/// IEEE 802 address.
fn node_id() -> &'static [u8; 6] {
    static NODE: OnceLock<[u8; 6]> = OnceLock::new();
    NODE.get_or_init(|| {
        let mut node: [u8; 6] = rand::random();
        node[0] |= 0x01;
        node
    })
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse(s)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
