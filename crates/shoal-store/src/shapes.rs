//! Object tables on the wire: shape announcements plus positional tokens.
//!
//! A descriptor's signature crosses the wire once per peer. After that the
//! sender refers to it by descriptor id and the receiver looks the id up in
//! what it has learned so far.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use shoal_codec::{decode_fields, encode_fields};
use shoal_shape::{TypeDescriptor, TypeStore};
use shoal_types::{Identifiable, ObjectId};

use crate::error::{StoreError, StoreResult};
use crate::message::{EncodedObject, ShapeAnnouncement};
use crate::object::ObjectState;

/// Which descriptors an encoded batch announces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Announce {
    /// Only descriptors not yet marked as sent.
    Unsent,
    /// Every descriptor the batch uses.
    Used,
    /// Every descriptor the batch uses plus everything already sent.
    Everything,
}

/// Objects ready to go out, with the announcements they need.
#[derive(Debug, Default)]
pub(crate) struct Encoded {
    pub(crate) shapes: Vec<ShapeAnnouncement>,
    pub(crate) objects: Vec<EncodedObject>,
}

/// One handle's view of shapes on the wire.
pub(crate) struct ShapeCodec {
    types: Arc<TypeStore>,
    /// Descriptors the peers this handle sends to have been told about.
    sent: Mutex<HashMap<ObjectId, Arc<TypeDescriptor>>>,
    /// Descriptors learned from announcements, keyed by the sender's id.
    known: RwLock<HashMap<ObjectId, Arc<TypeDescriptor>>>,
}

impl ShapeCodec {
    pub(crate) fn new(types: Arc<TypeStore>) -> Self {
        Self {
            types,
            sent: Mutex::new(HashMap::new()),
            known: RwLock::new(HashMap::new()),
        }
    }

    /// Encode `objects` against descriptors interned in the type store.
    /// Each object's `version` is carried as is.
    pub(crate) fn encode<'a>(
        &self,
        objects: impl IntoIterator<Item = &'a ObjectState>,
        announce: Announce,
    ) -> StoreResult<Encoded> {
        let sent = self.sent.lock().expect("lock poisoned");
        let mut shapes: BTreeMap<ObjectId, ShapeAnnouncement> = BTreeMap::new();
        if announce == Announce::Everything {
            for (id, descriptor) in sent.iter() {
                shapes.insert(*id, announcement(*id, descriptor));
            }
        }
        let mut encoded = Vec::new();
        for state in objects {
            let descriptor = self.types.describe(state);
            let descriptor_id = descriptor.id();
            if announce != Announce::Unsent || !sent.contains_key(&descriptor_id) {
                shapes
                    .entry(descriptor_id)
                    .or_insert_with(|| announcement(descriptor_id, &descriptor));
            }
            encoded.push(EncodedObject {
                id: state.id(),
                descriptor: descriptor_id,
                version: state.version(),
                values: encode_fields(&descriptor, state.fields())?,
            });
        }
        Ok(Encoded {
            shapes: shapes.into_values().collect(),
            objects: encoded,
        })
    }

    /// Record that `shapes` reached their destination.
    pub(crate) fn mark_sent(&self, shapes: &[ShapeAnnouncement]) {
        if shapes.is_empty() {
            return;
        }
        let mut sent = self.sent.lock().expect("lock poisoned");
        for shape in shapes {
            if let Some(descriptor) = self.types.lookup(&shape.signature) {
                sent.insert(shape.descriptor, descriptor);
            }
        }
    }

    /// Decode objects, learning every announced signature first.
    pub(crate) fn decode(
        &self,
        shapes: &[ShapeAnnouncement],
        objects: &[EncodedObject],
    ) -> StoreResult<Vec<ObjectState>> {
        if !shapes.is_empty() {
            let mut learned = Vec::with_capacity(shapes.len());
            for shape in shapes {
                learned.push((shape.descriptor, self.types.intern_signature(&shape.signature)?));
            }
            self.known.write().expect("lock poisoned").extend(learned);
        }
        let known = self.known.read().expect("lock poisoned");
        objects
            .iter()
            .map(|obj| {
                let descriptor = known
                    .get(&obj.descriptor)
                    .ok_or(StoreError::UnknownShape(obj.descriptor))?;
                let fields = decode_fields(descriptor, &obj.values)?;
                Ok(ObjectState::from_parts(
                    obj.id,
                    descriptor.kind(),
                    fields,
                    obj.version,
                ))
            })
            .collect()
    }
}

fn announcement(id: ObjectId, descriptor: &TypeDescriptor) -> ShapeAnnouncement {
    ShapeAnnouncement {
        descriptor: id,
        signature: descriptor.signature().to_string(),
    }
}
