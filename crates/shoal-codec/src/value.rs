use std::fmt;

use serde::{Deserialize, Serialize};
use shoal_types::ObjectId;

/// A field value as it travels between processes.
///
/// The variants correspond one-to-one with the token classes of the wire
/// grammar; cross-object links are [`Reference`]s, never inlined state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Undefined,
    Bool(bool),
    /// Unsigned decimal integer.
    Int(u64),
    Str(String),
    Ref(Reference),
}

impl Value {
    /// The reference, if this value is one.
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Self::Ref(_))
    }

    /// Short kind name used in logs and CLI output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::Ref(_) => "reference",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Int(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Self::Ref(r)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::Ref(Reference::to(id))
    }
}

/// Pointer to another identifiable object, by identifier.
///
/// The codec does not validate the target text; resolution against a local
/// object table happens in the store.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    target: String,
}

impl Reference {
    /// Reference with arbitrary target text, as decoded from `<...>`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Reference to a known object.
    pub fn to(id: ObjectId) -> Self {
        Self {
            target: id.to_string(),
        }
    }

    /// The raw target text.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The target as an identifier, if it is well-formed.
    pub fn target_id(&self) -> Option<ObjectId> {
        ObjectId::try_parse(&self.target).ok()
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference(<{}>)", self.target)
    }
}

/// A field whose referenced object is not yet present locally.
///
/// Records where the reference lives (`source` object and `property`) so
/// the field can be healed once the target arrives, plus the caller-supplied
/// marker to use in its place meanwhile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownReference {
    pub source: ObjectId,
    pub property: String,
    pub reference: Reference,
    pub missing: Value,
}

impl UnknownReference {
    pub fn new(
        source: ObjectId,
        property: impl Into<String>,
        reference: Reference,
        missing: Value,
    ) -> Self {
        Self {
            source,
            property: property.into(),
            reference,
            missing,
        }
    }
}
