use std::fmt;

use shoal_types::{Identifiable, LazyId, ObjectId};

use crate::signature::{ShapeKind, ShapeSignature};

/// The canonical record of one object shape.
///
/// Descriptors are created by the [`TypeStore`](crate::TypeStore) on the
/// first sighting of a signature and never mutated afterwards. A descriptor's
/// own identifier is assigned lazily, the first time it is announced to
/// another process.
pub struct TypeDescriptor {
    kind: ShapeKind,
    property_names: Vec<String>,
    signature: ShapeSignature,
    id: LazyId,
}

impl TypeDescriptor {
    pub(crate) fn new(kind: ShapeKind, property_names: Vec<String>) -> Self {
        let signature = ShapeSignature::compute(kind, &property_names);
        Self {
            kind,
            property_names,
            signature,
            id: LazyId::new(),
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn is_object(&self) -> bool {
        self.kind == ShapeKind::Object
    }

    /// Property names in shape order.
    pub fn property_names(&self) -> &[String] {
        &self.property_names
    }

    pub fn signature(&self) -> &ShapeSignature {
        &self.signature
    }

    /// Position of `name` within the shape, if present.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.property_names.iter().position(|n| n == name)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.property_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.property_names.is_empty()
    }

    /// The identifier if it has already been assigned.
    pub fn assigned_id(&self) -> Option<ObjectId> {
        self.id.peek()
    }
}

impl Identifiable for TypeDescriptor {
    fn id(&self) -> ObjectId {
        self.id.get()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.property_names == other.property_names
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("signature", &self.signature.as_str())
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_identity() {
        let a = TypeDescriptor::new(ShapeKind::Object, vec!["x".into(), "y".into()]);
        let b = TypeDescriptor::new(ShapeKind::Object, vec!["x".into(), "y".into()]);
        a.id();
        assert_eq!(a, b);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let a = TypeDescriptor::new(ShapeKind::Object, vec!["x".into(), "y".into()]);
        let b = TypeDescriptor::new(ShapeKind::Object, vec!["y".into(), "x".into()]);
        assert_ne!(a, b);
    }

    #[test]
    fn equality_checks_kind() {
        let a = TypeDescriptor::new(ShapeKind::Object, vec!["0".into()]);
        let b = TypeDescriptor::new(ShapeKind::Array, vec!["0".into()]);
        assert_ne!(a, b);
    }

    #[test]
    fn id_is_lazy() {
        let d = TypeDescriptor::new(ShapeKind::Array, vec![]);
        assert!(d.assigned_id().is_none());
        let id = d.id();
        assert_eq!(d.assigned_id(), Some(id));
        assert_eq!(d.id(), id);
    }

    #[test]
    fn position_lookup() {
        let d = TypeDescriptor::new(ShapeKind::Object, vec!["name".into(), "child".into()]);
        assert_eq!(d.position("child"), Some(1));
        assert_eq!(d.position("missing"), None);
        assert_eq!(d.len(), 2);
        assert!(d.is_object());
        assert_eq!(d.signature().as_str(), "o#name#child#");
    }
}
