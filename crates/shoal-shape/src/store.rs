use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use serde_json::Value as Json;
use tracing::debug;

use crate::descriptor::TypeDescriptor;
use crate::error::{ShapeError, ShapeResult};
use crate::signature::{json_shape, ShapeKind, ShapeSignature, Shaped};

/// Process-wide type interning store.
///
/// Maps shape signatures to shared [`TypeDescriptor`]s. Entries are
/// append-only: once a signature is interned, every later `describe` of the
/// same shape returns the same `Arc` for the life of the process. Across
/// processes, shapes are compared by signature string only.
///
/// There is no public constructor. The one instance is obtained through
/// [`TypeStore::instance`] by the process bootstrap and handed down to
/// whatever needs it.
pub struct TypeStore {
    shapes: RwLock<HashMap<String, Arc<TypeDescriptor>>>,
}

impl TypeStore {
    fn new() -> Self {
        Self {
            shapes: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide store, created on first call.
    pub fn instance() -> Arc<TypeStore> {
        static INSTANCE: OnceLock<Arc<TypeStore>> = OnceLock::new();
        Arc::clone(INSTANCE.get_or_init(|| Arc::new(TypeStore::new())))
    }

    /// Descriptor for the shape of `value`, interning it on first sighting.
    pub fn describe<S: Shaped + ?Sized>(&self, value: &S) -> Arc<TypeDescriptor> {
        let names: Vec<String> = value
            .property_names()
            .into_iter()
            .map(|n| n.into_owned())
            .collect();
        self.intern(value.shape_kind(), names)
    }

    /// Descriptor for an explicit kind and ordered property list.
    pub fn describe_parts<I, S>(&self, kind: ShapeKind, names: I) -> Arc<TypeDescriptor>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.intern(kind, names.into_iter().map(Into::into).collect())
    }

    /// Descriptor for a JSON object or array. Scalars are rejected, as are
    /// keys that are empty or contain the `#` separator.
    pub fn describe_json(&self, value: &Json) -> ShapeResult<Arc<TypeDescriptor>> {
        let (kind, names) = json_shape(value)?;
        if let Some(bad) = names.iter().find(|n| n.is_empty() || n.contains('#')) {
            return Err(ShapeError::InvalidPropertyName(bad.clone()));
        }
        Ok(self.intern(kind, names))
    }

    /// Intern a signature received from another process.
    pub fn intern_signature(&self, signature: &str) -> ShapeResult<Arc<TypeDescriptor>> {
        if let Some(found) = self.lookup(signature) {
            return Ok(found);
        }
        let (kind, names) = ShapeSignature::parse(signature)?;
        Ok(self.intern(kind, names))
    }

    /// Existing descriptor for `signature`, if any.
    pub fn lookup(&self, signature: &str) -> Option<Arc<TypeDescriptor>> {
        self.shapes
            .read()
            .expect("type store lock poisoned")
            .get(signature)
            .cloned()
    }

    /// Number of interned shapes.
    pub fn len(&self) -> usize {
        self.shapes.read().expect("type store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All interned signatures, sorted.
    pub fn signatures(&self) -> Vec<ShapeSignature> {
        let map = self.shapes.read().expect("type store lock poisoned");
        let mut sigs: Vec<ShapeSignature> =
            map.values().map(|d| d.signature().clone()).collect();
        sigs.sort();
        sigs
    }

    fn intern(&self, kind: ShapeKind, names: Vec<String>) -> Arc<TypeDescriptor> {
        let signature = ShapeSignature::compute(kind, &names);
        if let Some(found) = self.lookup(signature.as_str()) {
            return found;
        }

        // Re-check under the write lock: another thread may have inserted
        // the same signature since the read above.
        let mut map = self.shapes.write().expect("type store lock poisoned");
        Arc::clone(map.entry(signature.into_string()).or_insert_with_key(|sig| {
            debug!(signature = %sig, "interned new shape");
            Arc::new(TypeDescriptor::new(kind, names))
        }))
    }
}

impl std::fmt::Debug for TypeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeStore")
            .field("shape_count", &self.len())
            .finish()
    }
}
