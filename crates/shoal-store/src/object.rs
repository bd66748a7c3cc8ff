use std::borrow::Cow;
use std::collections::HashMap;

use serde::Serialize;
use shoal_codec::{Reference, Value};
use shoal_shape::{ShapeKind, Shaped};
use shoal_types::{Identifiable, ObjectId, ROOT_ID};

/// One object in a store's table.
///
/// Fields are kept in insertion order, which is the enumeration order that
/// determines the object's shape. Overwriting a field keeps its position;
/// adding a new one appends it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ObjectState {
    id: ObjectId,
    kind: ShapeKind,
    fields: Vec<(String, Value)>,
    /// Sequence number of the commit that last wrote this object; 0 if it
    /// has never been committed.
    version: u64,
}

impl ObjectState {
    /// An empty, uncommitted object.
    pub fn new(id: ObjectId, kind: ShapeKind) -> Self {
        Self {
            id,
            kind,
            fields: Vec::new(),
            version: 0,
        }
    }

    /// The store's root object, as it exists before any commit.
    pub fn root() -> Self {
        Self::new(ROOT_ID, ShapeKind::Object)
    }

    pub(crate) fn from_parts(
        id: ObjectId,
        kind: ShapeKind,
        fields: Vec<(String, Value)>,
        version: u64,
    ) -> Self {
        Self {
            id,
            kind,
            fields,
            version,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Fields in enumeration order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Set a field, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let position = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(position).1)
    }

    pub(crate) fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Fields holding references, with the property they live in.
    pub fn references(&self) -> impl Iterator<Item = (&str, &Reference)> {
        self.fields
            .iter()
            .filter_map(|(n, v)| v.as_reference().map(|r| (n.as_str(), r)))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Identifiable for ObjectState {
    fn id(&self) -> ObjectId {
        self.id
    }
}

impl Shaped for ObjectState {
    fn shape_kind(&self) -> ShapeKind {
        self.kind
    }

    fn property_names(&self) -> Vec<Cow<'_, str>> {
        self.keys().map(Cow::Borrowed).collect()
    }
}

/// A store's local object table plus the last commit sequence it has seen.
#[derive(Debug)]
pub(crate) struct ObjectTable {
    objects: HashMap<ObjectId, ObjectState>,
    seq: u64,
}

impl ObjectTable {
    /// A table holding only the empty root object.
    pub(crate) fn new() -> Self {
        let mut objects = HashMap::new();
        objects.insert(ROOT_ID, ObjectState::root());
        Self { objects, seq: 0 }
    }

    pub(crate) fn get(&self, id: &ObjectId) -> Option<&ObjectState> {
        self.objects.get(id)
    }

    pub(crate) fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    /// Committed version of `id`; an absent object counts as version 0.
    pub(crate) fn version_of(&self, id: &ObjectId) -> u64 {
        self.objects.get(id).map(ObjectState::version).unwrap_or(0)
    }

    /// Install `state` if it is newer than the local copy. Returns whether
    /// it was applied.
    pub(crate) fn apply(&mut self, state: ObjectState) -> bool {
        let id = state.id();
        match self.objects.get(&id) {
            Some(local) if local.version() >= state.version() => false,
            _ => {
                self.seq = self.seq.max(state.version());
                self.objects.insert(id, state);
                true
            }
        }
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn advance_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub(crate) fn observe_seq(&mut self, seq: u64) {
        self.seq = self.seq.max(seq);
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &ObjectState> {
        self.objects.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }
}
