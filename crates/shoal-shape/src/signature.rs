use std::borrow::{Borrow, Cow};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{ShapeError, ShapeResult};

/// Whether a structured value is a plain object or an indexed collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Keyed object (`o#` prefix).
    Object,
    /// Array / indexed collection (`a#` prefix).
    Array,
}

impl ShapeKind {
    /// The one-character signature prefix.
    pub fn prefix(&self) -> char {
        match self {
            Self::Object => 'o',
            Self::Array => 'a',
        }
    }

    fn from_prefix(c: char) -> Option<Self> {
        match c {
            'o' => Some(Self::Object),
            'a' => Some(Self::Array),
            _ => None,
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "object"),
            Self::Array => write!(f, "array"),
        }
    }
}

/// A structured value whose shape can be described.
///
/// Producers list their own enumerable property names in enumeration order.
/// The order is part of the shape: two values with the same names in a
/// different order have different shapes.
pub trait Shaped {
    /// Object or array.
    fn shape_kind(&self) -> ShapeKind;

    /// Own enumerable property names, in enumeration order.
    fn property_names(&self) -> Vec<Cow<'_, str>>;
}

/// Deterministic interning key: `<o|a>#name1#name2#...#`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeSignature(String);

impl ShapeSignature {
    /// Build the signature for `kind` with `names` in the given order.
    pub fn compute<I, S>(kind: ShapeKind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sig = String::with_capacity(16);
        sig.push(kind.prefix());
        sig.push('#');
        for name in names {
            sig.push_str(name.as_ref());
            sig.push('#');
        }
        Self(sig)
    }

    /// Signature of any [`Shaped`] value.
    pub fn of<S: Shaped + ?Sized>(value: &S) -> Self {
        Self::compute(value.shape_kind(), value.property_names())
    }

    /// Signature of a JSON document node. Scalars have no shape.
    pub fn of_json(value: &Json) -> ShapeResult<Self> {
        let (kind, names) = json_shape(value)?;
        Ok(Self::compute(kind, names))
    }

    /// Split a signature back into its kind and property names.
    pub fn parse(text: &str) -> ShapeResult<(ShapeKind, Vec<String>)> {
        let malformed = |reason: &str| ShapeError::MalformedSignature {
            signature: text.to_string(),
            reason: reason.to_string(),
        };

        let mut chars = text.chars();
        let kind = chars
            .next()
            .and_then(ShapeKind::from_prefix)
            .ok_or_else(|| malformed("expected `o` or `a` prefix"))?;
        if chars.next() != Some('#') {
            return Err(malformed("expected `#` after prefix"));
        }

        let rest = &text[2..];
        if rest.is_empty() {
            return Ok((kind, Vec::new()));
        }
        let body = rest
            .strip_suffix('#')
            .ok_or_else(|| malformed("property list must end with `#`"))?;
        let names = body.split('#').map(str::to_string).collect();
        Ok((kind, names))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Borrow<str> for ShapeSignature {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ShapeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShapeSignature({})", self.0)
    }
}

impl fmt::Display for ShapeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind and ordered property names of a JSON node.
///
/// Arrays enumerate their indices; objects keep document order.
pub(crate) fn json_shape(value: &Json) -> ShapeResult<(ShapeKind, Vec<String>)> {
    match value {
        Json::Object(map) => Ok((ShapeKind::Object, map.keys().cloned().collect())),
        Json::Array(items) => Ok((
            ShapeKind::Array,
            (0..items.len()).map(|i| i.to_string()).collect(),
        )),
        Json::Null => Err(ShapeError::NotStructured("null")),
        Json::Bool(_) => Err(ShapeError::NotStructured("boolean")),
        Json::Number(_) => Err(ShapeError::NotStructured("number")),
        Json::String(_) => Err(ShapeError::NotStructured("string")),
    }
}
