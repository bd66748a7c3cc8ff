use std::collections::BTreeMap;
use std::sync::RwLock;

use shoal_codec::Value;
use shoal_shape::ShapeKind;
use shoal_types::{Identifiable, LazyId, ObjectId, ROOT_ID};

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectState, ObjectTable};

/// An object as first seen by a transaction, plus its working copy.
struct Touched {
    before: Option<ObjectState>,
    state: ObjectState,
    dirty: bool,
}

impl Touched {
    fn base_version(&self) -> u64 {
        self.before.as_ref().map(ObjectState::version).unwrap_or(0)
    }
}

/// A unit of work against a store's table.
///
/// Objects are copied from the table on first touch; every later read sees
/// the transaction's own writes. Nothing reaches the table until the
/// primary accepts the whole transaction.
pub struct Transaction<'a> {
    table: &'a RwLock<ObjectTable>,
    touched: BTreeMap<ObjectId, Touched>,
    id: LazyId,
}

/// An object a transaction wrote: its state before and after.
#[derive(Clone, Debug)]
pub(crate) struct Write {
    pub(crate) before: Option<ObjectState>,
    pub(crate) after: ObjectState,
}

/// Everything a finished transaction needs to commit.
#[derive(Debug)]
pub(crate) struct Changes {
    pub(crate) tx: ObjectId,
    pub(crate) base_versions: Vec<(ObjectId, u64)>,
    pub(crate) writes: Vec<Write>,
}

impl Changes {
    pub(crate) fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(table: &'a RwLock<ObjectTable>) -> Self {
        Self {
            table,
            touched: BTreeMap::new(),
            id: LazyId::new(),
        }
    }

    /// The store's root object.
    pub fn root(&self) -> ObjectId {
        ROOT_ID
    }

    /// Create an empty object and return its identifier.
    pub fn create(&mut self, kind: ShapeKind) -> ObjectId {
        let id = ObjectId::generate();
        self.touched.insert(
            id,
            Touched {
                before: None,
                state: ObjectState::new(id, kind),
                dirty: true,
            },
        );
        id
    }

    /// Whether `id` exists locally or was created by this transaction.
    pub fn exists(&mut self, id: ObjectId) -> bool {
        self.touch(id).is_ok()
    }

    /// A copy of the object as this transaction sees it.
    pub fn read(&mut self, id: ObjectId) -> StoreResult<ObjectState> {
        Ok(self.touch(id)?.state.clone())
    }

    pub fn get(&mut self, id: ObjectId, property: &str) -> StoreResult<Option<Value>> {
        Ok(self.touch(id)?.state.get(property).cloned())
    }

    /// Property names in enumeration order.
    pub fn keys(&mut self, id: ObjectId) -> StoreResult<Vec<String>> {
        Ok(self.touch(id)?.state.keys().map(str::to_owned).collect())
    }

    /// Set a property, returning its previous value.
    pub fn set(
        &mut self,
        id: ObjectId,
        property: &str,
        value: impl Into<Value>,
    ) -> StoreResult<Option<Value>> {
        if property.is_empty() || property.contains('#') {
            return Err(StoreError::InvalidProperty(property.to_owned()));
        }
        let touched = self.touch(id)?;
        touched.dirty = true;
        Ok(touched.state.set(property, value.into()))
    }

    /// Point a property at another object.
    pub fn set_ref(
        &mut self,
        id: ObjectId,
        property: &str,
        target: ObjectId,
    ) -> StoreResult<Option<Value>> {
        self.set(id, property, Value::from(target))
    }

    /// Remove a property, returning its value.
    pub fn remove(&mut self, id: ObjectId, property: &str) -> StoreResult<Option<Value>> {
        let touched = self.touch(id)?;
        let old = touched.state.remove(property);
        if old.is_some() {
            touched.dirty = true;
        }
        Ok(old)
    }

    /// An error that abandons the transaction when returned from the
    /// handler: `return Err(tx.abort("out of stock"))`.
    pub fn abort(&self, reason: impl Into<String>) -> StoreError {
        StoreError::Aborted(reason.into())
    }

    fn touch(&mut self, id: ObjectId) -> StoreResult<&mut Touched> {
        if !self.touched.contains_key(&id) {
            let state = self
                .table
                .read()
                .expect("lock poisoned")
                .get(&id)
                .cloned()
                .ok_or(StoreError::ObjectNotFound(id))?;
            self.touched.insert(
                id,
                Touched {
                    before: Some(state.clone()),
                    state,
                    dirty: false,
                },
            );
        }
        self.touched
            .get_mut(&id)
            .ok_or(StoreError::ObjectNotFound(id))
    }

    pub(crate) fn into_changes(self) -> Changes {
        let tx = self.id.get();
        let base_versions = self
            .touched
            .iter()
            .map(|(id, t)| (*id, t.base_version()))
            .collect();
        let writes = self
            .touched
            .into_values()
            .filter(|t| t.dirty)
            .map(|t| Write {
                before: t.before,
                after: t.state,
            })
            .collect();
        Changes {
            tx,
            base_versions,
            writes,
        }
    }
}

impl Identifiable for Transaction<'_> {
    fn id(&self) -> ObjectId {
        self.id.get()
    }
}
