use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use async_trait::async_trait;
use shoal_codec::{encode, UnknownReference, Value};
use shoal_shape::ShapeKind;
use shoal_types::{Identifiable, LazyId, ObjectId};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::context::ProcessContext;
use crate::error::{StoreError, StoreResult};
use crate::fatal::FatalSink;
use crate::log::{CommitEntry, CommitLog, FieldChange};
use crate::message::{
    codes, CommitNotice, Decision, EncodedObject, Endpoint, ShapeAnnouncement, Snapshot,
    StoreMessage, TxPayload,
};
use crate::object::{ObjectState, ObjectTable};
use crate::router::{Receiver, Role, Router};
use crate::shapes::{Announce, ShapeCodec};
use crate::transaction::{Transaction, Write};

/// How many recent transaction outcomes the primary remembers for settling.
const SETTLE_WINDOW: usize = 1024;

/// Outcome of [`Store::resolve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    /// A plain value, or `Undefined` for an absent property.
    Value(Value),
    /// The referenced object, present locally.
    Object(ObjectState),
    /// The referenced object has not arrived yet.
    Unknown(UnknownReference),
}

/// Published when a previously unresolved reference's target arrives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Healed {
    pub reference: UnknownReference,
    pub target: ObjectId,
}

/// What a secondary needs to revert one of its committed transactions.
#[derive(Clone, Debug)]
struct UndoEntry {
    seq: u64,
    objects: Vec<UndoObject>,
}

#[derive(Clone, Debug)]
struct UndoObject {
    id: ObjectId,
    kind: ShapeKind,
    before: Option<ObjectState>,
    /// Version the object must still have for the revert to apply.
    expected: u64,
}

/// Commit bookkeeping on the primary, guarded by the commit lock.
#[derive(Debug, Default)]
struct Decisions {
    committed: VecDeque<(ObjectId, u64)>,
    /// Transactions settled as never committing.
    abandoned: VecDeque<ObjectId>,
}

impl Decisions {
    fn committed_at(&self, tx: &ObjectId) -> Option<u64> {
        self.committed
            .iter()
            .find(|(id, _)| id == tx)
            .map(|(_, seq)| *seq)
    }

    fn is_abandoned(&self, tx: &ObjectId) -> bool {
        self.abandoned.contains(tx)
    }

    fn record(&mut self, tx: ObjectId, seq: u64) {
        self.committed.push_back((tx, seq));
        if self.committed.len() > SETTLE_WINDOW {
            self.committed.pop_front();
        }
    }

    /// Settle `tx`: its commit sequence, or `None` after which it never commits.
    fn settle(&mut self, tx: ObjectId) -> Option<u64> {
        let seq = self.committed_at(&tx);
        if seq.is_none() && !self.is_abandoned(&tx) {
            self.abandoned.push_back(tx);
            if self.abandoned.len() > SETTLE_WINDOW {
                self.abandoned.pop_front();
            }
        }
        seq
    }
}

/// A handle on the group's replicated object table.
///
/// The primary holds the authoritative table and orders every commit;
/// secondaries keep a replica, submit transactions to the primary, and
/// apply what it broadcasts. Dropping the last `Arc` detaches the handle.
pub struct Store {
    role: Role,
    endpoint: LazyId,
    shapes: ShapeCodec,
    config: StoreConfig,
    fatal: FatalSink,
    table: RwLock<ObjectTable>,
    router: RwLock<Option<Arc<dyn Router>>>,
    /// Serialises commit decisions on the primary.
    commit_lock: tokio::sync::Mutex<Decisions>,
    log: Option<Arc<dyn CommitLog>>,
    undo: Mutex<VecDeque<UndoEntry>>,
    pending: Mutex<Vec<UnknownReference>>,
    healed: broadcast::Sender<Healed>,
}

/// What the router holds for an attached store. The store itself is held
/// weakly so a handle dropped without [`Store::stop`] is still freed.
struct Attachment(Weak<Store>);

#[async_trait]
impl Receiver for Attachment {
    async fn receive(&self, from: Endpoint, msg: StoreMessage) -> StoreResult<Option<StoreMessage>> {
        match self.0.upgrade() {
            Some(store) => store.receive(from, msg).await,
            None => Err(StoreError::Transport("store handle dropped".into())),
        }
    }
}

impl Store {
    pub(crate) fn primary(
        ctx: &ProcessContext,
        config: StoreConfig,
        log: Arc<dyn CommitLog>,
        fatal: FatalSink,
    ) -> Arc<Self> {
        Arc::new(Self::new(Role::Primary, ctx, config, Some(log), fatal))
    }

    pub(crate) fn secondary(ctx: &ProcessContext, config: StoreConfig, fatal: FatalSink) -> Arc<Self> {
        Arc::new(Self::new(Role::Secondary, ctx, config, None, fatal))
    }

    fn new(
        role: Role,
        ctx: &ProcessContext,
        config: StoreConfig,
        log: Option<Arc<dyn CommitLog>>,
        fatal: FatalSink,
    ) -> Self {
        let (healed, _) = broadcast::channel(config.heal_channel_capacity.max(1));
        Self {
            role,
            endpoint: LazyId::new(),
            shapes: ShapeCodec::new(Arc::clone(ctx.types())),
            config,
            fatal,
            table: RwLock::new(ObjectTable::new()),
            router: RwLock::new(None),
            commit_lock: tokio::sync::Mutex::new(Decisions::default()),
            log,
            undo: Mutex::new(VecDeque::new()),
            pending: Mutex::new(Vec::new()),
            healed,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_primary(&self) -> bool {
        self.role == Role::Primary
    }

    /// This handle's address on the router, assigned on first use.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint.get()
    }

    pub fn is_started(&self) -> bool {
        self.router.read().expect("lock poisoned").is_some()
    }

    /// Last commit sequence number this handle has seen.
    pub fn seq(&self) -> u64 {
        self.table.read().expect("lock poisoned").seq()
    }

    /// Number of objects in the local table.
    pub fn len(&self) -> usize {
        self.table.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach to `router`. A secondary then loads the primary's table.
    pub async fn start(self: &Arc<Self>, router: Arc<dyn Router>) -> StoreResult<()> {
        {
            let mut slot = self.router.write().expect("lock poisoned");
            if slot.is_some() {
                return Err(StoreError::AlreadyStarted);
            }
            let receiver: Arc<dyn Receiver> = Arc::new(Attachment(Arc::downgrade(self)));
            router.register(self.endpoint(), self.role, receiver)?;
            *slot = Some(Arc::clone(&router));
        }

        if self.role == Role::Secondary {
            if let Err(e) = self.sync(router.as_ref()).await {
                self.stop();
                return Err(e);
            }
        }
        info!(
            group = %self.config.group,
            role = %self.role,
            endpoint = %self.endpoint().short_id(),
            seq = self.seq(),
            "store started"
        );
        Ok(())
    }

    /// Detach from the router. Idempotent.
    pub fn stop(&self) {
        let router = self.router.write().expect("lock poisoned").take();
        if let Some(router) = router {
            router.unregister(&self.endpoint());
            info!(group = %self.config.group, role = %self.role, "store stopped");
        }
    }

    /// Run `handler` as one atomic transaction.
    ///
    /// If the handler fails nothing is sent and nothing changes. Otherwise
    /// the writes go to the primary, which either commits them for every
    /// handle or rejects them; on rejection the local table is untouched.
    /// A transaction that only reads fails with a conflict if a commit
    /// landed between its reads.
    pub async fn atomic<F, R>(&self, handler: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Transaction<'_>) -> StoreResult<R>,
    {
        self.require_router()?;
        let (value, changes) = {
            let mut tx = Transaction::new(&self.table);
            let value = handler(&mut tx)?;
            (value, tx.into_changes())
        };
        if changes.is_read_only() {
            self.check_reads(&changes.base_versions)?;
            return Ok(value);
        }

        let seq = self
            .submit(changes.tx, changes.base_versions, &changes.writes)
            .await?;
        if self.role == Role::Secondary {
            self.push_undo(seq, &changes.writes);
        }
        Ok(value)
    }

    /// Like [`atomic`](Self::atomic), handing the outcome to `callback`.
    pub async fn atomic_with<F, R, C>(&self, handler: F, callback: C)
    where
        F: FnOnce(&mut Transaction<'_>) -> StoreResult<R>,
        C: FnOnce(StoreResult<R>),
    {
        callback(self.atomic(handler).await);
    }

    /// Like [`atomic`](Self::atomic) with nobody to hear the outcome.
    /// Failures go to the group's fatal sink.
    pub async fn atomic_unobserved<F, R>(&self, handler: F)
    where
        F: FnOnce(&mut Transaction<'_>) -> StoreResult<R>,
    {
        if let Err(e) = self.atomic(handler).await {
            self.fatal.report(&e);
        }
    }

    /// Revert the most recent transaction this handle committed.
    ///
    /// The revert is itself a transaction: it fails with a conflict if
    /// another handle has since changed any of the objects involved.
    pub async fn undo(&self) -> StoreResult<u64> {
        if self.role == Role::Primary {
            return Err(StoreError::UndoUnsupported);
        }
        self.require_router()?;
        let entry = self
            .undo
            .lock()
            .expect("lock poisoned")
            .back()
            .cloned()
            .ok_or(StoreError::NothingToUndo)?;

        let mut base_versions = Vec::with_capacity(entry.objects.len());
        let mut writes = Vec::with_capacity(entry.objects.len());
        for object in &entry.objects {
            let mut restored = object
                .before
                .clone()
                .unwrap_or_else(|| ObjectState::new(object.id, object.kind));
            restored.set_version(object.expected);
            base_versions.push((object.id, object.expected));
            writes.push(Write {
                before: Some(self.read(object.id)?),
                after: restored,
            });
        }

        let seq = self
            .submit(ObjectId::generate(), base_versions, &writes)
            .await?;

        let mut undo = self.undo.lock().expect("lock poisoned");
        if undo.back().map(|e| e.seq) == Some(entry.seq) {
            undo.pop_back();
        }
        // The restored objects now carry `seq`; earlier entries that expect
        // the version we just reverted to must expect `seq` instead.
        for reverted in &entry.objects {
            let prior = reverted.before.as_ref().map(ObjectState::version);
            let earlier = undo
                .iter_mut()
                .rev()
                .flat_map(|e| e.objects.iter_mut())
                .find(|o| o.id == reverted.id);
            if let Some(earlier) = earlier {
                if Some(earlier.expected) == prior {
                    earlier.expected = seq;
                }
            }
        }
        debug!(undone = entry.seq, seq, "transaction undone");
        Ok(seq)
    }

    /// Number of transactions [`undo`](Self::undo) can still revert.
    pub fn undo_depth(&self) -> usize {
        self.undo.lock().expect("lock poisoned").len()
    }

    /// A copy of an object from the local table.
    pub fn read(&self, id: ObjectId) -> StoreResult<ObjectState> {
        self.table
            .read()
            .expect("lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(StoreError::ObjectNotFound(id))
    }

    pub fn get(&self, id: ObjectId, property: &str) -> StoreResult<Option<Value>> {
        Ok(self.read(id)?.get(property).cloned())
    }

    /// Read a property, following a reference to its target.
    ///
    /// A reference whose target is not in the local table comes back as
    /// [`Resolved::Unknown`] carrying `missing`. It is remembered until the
    /// property stops holding it, and a [`Healed`] notice is published if
    /// the target arrives first.
    pub fn resolve(&self, id: ObjectId, property: &str, missing: Value) -> StoreResult<Resolved> {
        let table = self.table.read().expect("lock poisoned");
        let object = table.get(&id).ok_or(StoreError::ObjectNotFound(id))?;
        let value = match object.get(property) {
            Some(value) => value.clone(),
            None => return Ok(Resolved::Value(Value::Undefined)),
        };
        let reference = match value {
            Value::Ref(reference) => reference,
            other => return Ok(Resolved::Value(other)),
        };
        if let Some(target) = reference.target_id().and_then(|t| table.get(&t)) {
            return Ok(Resolved::Object(target.clone()));
        }
        drop(table);

        let unknown = UnknownReference::new(id, property, reference, missing);
        let mut pending = self.pending.lock().expect("lock poisoned");
        if !pending.iter().any(|p| {
            p.source == unknown.source
                && p.property == unknown.property
                && p.reference == unknown.reference
        }) {
            pending.push(unknown.clone());
        }
        Ok(Resolved::Unknown(unknown))
    }

    /// Notices for unresolved references whose targets have arrived.
    pub fn subscribe_healed(&self) -> broadcast::Receiver<Healed> {
        self.healed.subscribe()
    }

    /// Unresolved references still waiting for their targets.
    pub fn pending_references(&self) -> Vec<UnknownReference> {
        self.pending.lock().expect("lock poisoned").clone()
    }

    fn require_router(&self) -> StoreResult<Arc<dyn Router>> {
        self.router
            .read()
            .expect("lock poisoned")
            .clone()
            .ok_or(StoreError::NotStarted)
    }

    /// Every object a read-only transaction saw must still be at the
    /// version it saw.
    fn check_reads(&self, base_versions: &[(ObjectId, u64)]) -> StoreResult<()> {
        let table = self.table.read().expect("lock poisoned");
        for &(object, expected) in base_versions {
            let found = table.version_of(&object);
            if found != expected {
                return Err(StoreError::Conflict {
                    object,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    async fn sync(&self, router: &dyn Router) -> StoreResult<()> {
        match router.request(self.endpoint(), StoreMessage::SyncRequest).await? {
            StoreMessage::SyncResponse(snapshot) => {
                self.apply_remote(&snapshot.shapes, &snapshot.objects, snapshot.seq)
            }
            StoreMessage::Error { code, message } => Err(StoreError::Remote { code, message }),
            other => Err(StoreError::UnexpectedMessage(other.type_name())),
        }
    }

    /// Send a transaction to the primary and, once committed, install the
    /// written objects locally at the commit's sequence number.
    async fn submit(
        &self,
        tx: ObjectId,
        base_versions: Vec<(ObjectId, u64)>,
        writes: &[Write],
    ) -> StoreResult<u64> {
        let router = self.require_router()?;

        let decision = match self.role {
            Role::Primary => {
                let encoded = self
                    .shapes
                    .encode(writes.iter().map(|w| &w.after), Announce::Used)?;
                let payload = TxPayload {
                    tx,
                    base_versions,
                    shapes: encoded.shapes,
                    writes: encoded.objects,
                };
                self.commit(self.endpoint(), payload, router.as_ref()).await?
            }
            Role::Secondary => {
                let encoded = self
                    .shapes
                    .encode(writes.iter().map(|w| &w.after), Announce::Unsent)?;
                let payload = TxPayload {
                    tx,
                    base_versions,
                    shapes: encoded.shapes,
                    writes: encoded.objects,
                };
                self.request_commit(router.as_ref(), payload).await?
            }
        };

        match decision {
            Decision::Committed { seq } => {
                if self.role == Role::Secondary {
                    {
                        let mut table = self.table.write().expect("lock poisoned");
                        for write in writes {
                            let mut state = write.after.clone();
                            state.set_version(seq);
                            table.apply(state);
                        }
                        table.observe_seq(seq);
                    }
                    self.heal();
                }
                Ok(seq)
            }
            Decision::Conflict {
                object,
                expected,
                found,
            } => Err(StoreError::Conflict {
                object,
                expected,
                found,
            }),
            Decision::Rejected { reason } => Err(StoreError::Rejected(reason)),
        }
    }

    /// Ask the primary to commit `payload`. If the request goes unanswered
    /// the transaction is settled before anything is reported.
    async fn request_commit(&self, router: &dyn Router, payload: TxPayload) -> StoreResult<Decision> {
        let tx = payload.tx;
        let shapes = payload.shapes.clone();
        match router
            .request(self.endpoint(), StoreMessage::CommitRequest(payload))
            .await
        {
            Ok(StoreMessage::CommitDecision(decision)) => {
                self.shapes.mark_sent(&shapes);
                Ok(decision)
            }
            Ok(StoreMessage::Error { code, message }) => Err(StoreError::Remote { code, message }),
            Ok(other) => Err(StoreError::UnexpectedMessage(other.type_name())),
            Err(StoreError::Transport(reason)) => self.settle(router, tx, reason).await,
            Err(e) => Err(e),
        }
    }

    /// Learn from the primary whether `tx` committed, resyncing the local
    /// table either way. Once settled as not committed it never will be.
    async fn settle(&self, router: &dyn Router, tx: ObjectId, reason: String) -> StoreResult<Decision> {
        warn!(tx = %tx.short_id(), %reason, "commit request unanswered, settling");
        let snapshot = match router
            .request(self.endpoint(), StoreMessage::SettleRequest(tx))
            .await
        {
            Ok(StoreMessage::SyncResponse(snapshot)) => snapshot,
            Ok(StoreMessage::Error { code, message }) => {
                return Err(StoreError::Remote { code, message })
            }
            Ok(other) => return Err(StoreError::UnexpectedMessage(other.type_name())),
            Err(e) => {
                warn!(tx = %tx.short_id(), error = %e, "commit outcome unknown");
                return Err(StoreError::Transport(reason));
            }
        };
        self.apply_remote(&snapshot.shapes, &snapshot.objects, snapshot.seq)?;
        match snapshot.settled {
            Some(seq) => Ok(Decision::Committed { seq }),
            None => Err(StoreError::Transport(reason)),
        }
    }

    /// Decide on a transaction. Primary only.
    ///
    /// Accepted transactions are logged and applied under the commit lock,
    /// then broadcast. The broadcast runs outside the lock; receivers apply
    /// per object by version, so overtaking notices are harmless.
    async fn commit(
        &self,
        origin: Endpoint,
        payload: TxPayload,
        router: &dyn Router,
    ) -> StoreResult<Decision> {
        let notice = {
            let mut decisions = self.commit_lock.lock().await;
            if decisions.is_abandoned(&payload.tx) {
                warn!(tx = %payload.tx.short_id(), "commit arrived after it was settled");
                return Ok(Decision::Rejected {
                    reason: "transaction was settled as not committed".into(),
                });
            }

            let writes = match self.shapes.decode(&payload.shapes, &payload.writes) {
                Ok(writes) => writes,
                Err(e) => {
                    warn!(tx = %payload.tx.short_id(), error = %e, "commit rejected");
                    return Ok(Decision::Rejected {
                        reason: e.to_string(),
                    });
                }
            };

            let (seq, committed) = {
                let mut table = self.table.write().expect("lock poisoned");
                let bases = payload
                    .base_versions
                    .iter()
                    .copied()
                    .chain(writes.iter().map(|w| (w.id(), w.version())));
                for (object, expected) in bases {
                    let found = table.version_of(&object);
                    if found != expected {
                        warn!(
                            tx = %payload.tx.short_id(),
                            object = %object.short_id(),
                            expected,
                            found,
                            "commit conflict"
                        );
                        return Ok(Decision::Conflict {
                            object,
                            expected,
                            found,
                        });
                    }
                }

                let seq = table.seq() + 1;
                let entry = CommitEntry {
                    seq,
                    tx: payload.tx,
                    origin,
                    changes: field_changes(&table, &writes),
                };
                if let Some(log) = &self.log {
                    if let Err(e) = log.record(entry) {
                        warn!(tx = %payload.tx.short_id(), error = %e, "commit not logged");
                        return Ok(Decision::Rejected {
                            reason: e.to_string(),
                        });
                    }
                }

                let mut committed = Vec::with_capacity(writes.len());
                for mut state in writes {
                    state.set_version(seq);
                    table.apply(state.clone());
                    committed.push(state);
                }
                table.observe_seq(seq);
                (seq, committed)
            };
            decisions.record(payload.tx, seq);
            debug!(seq, objects = committed.len(), origin = %origin.short_id(), "commit applied");

            let encoded = self.shapes.encode(&committed, Announce::Unsent)?;
            self.shapes.mark_sent(&encoded.shapes);
            CommitNotice {
                seq,
                tx: payload.tx,
                origin,
                shapes: encoded.shapes,
                objects: encoded.objects,
            }
        };

        let seq = notice.seq;
        router.broadcast(origin, StoreMessage::Committed(notice)).await;
        self.heal();
        Ok(Decision::Committed { seq })
    }

    /// The primary's table, taken between commits. With `settle`, also
    /// fixes that transaction's fate.
    async fn snapshot(&self, settle: Option<ObjectId>) -> StoreResult<Snapshot> {
        let mut decisions = self.commit_lock.lock().await;
        let settled = settle.and_then(|tx| decisions.settle(tx));
        let table = self.table.read().expect("lock poisoned");
        let encoded = self.shapes.encode(table.values(), Announce::Everything)?;
        Ok(Snapshot {
            seq: table.seq(),
            shapes: encoded.shapes,
            objects: encoded.objects,
            settled,
        })
    }

    /// Install objects received from the primary. Stale copies are skipped.
    fn apply_remote(
        &self,
        shapes: &[ShapeAnnouncement],
        objects: &[EncodedObject],
        seq: u64,
    ) -> StoreResult<()> {
        let states = self.shapes.decode(shapes, objects)?;
        let total = states.len();
        let applied = {
            let mut table = self.table.write().expect("lock poisoned");
            let applied = states
                .into_iter()
                .map(|state| table.apply(state))
                .filter(|applied| *applied)
                .count();
            table.observe_seq(seq);
            applied
        };
        if applied < total {
            debug!(seq, stale = total - applied, "skipped stale remote objects");
        }
        self.heal();
        Ok(())
    }

    fn push_undo(&self, seq: u64, writes: &[Write]) {
        if self.config.undo_depth == 0 {
            return;
        }
        let objects = writes
            .iter()
            .map(|w| UndoObject {
                id: w.after.id(),
                kind: w.after.kind(),
                before: w.before.clone(),
                expected: seq,
            })
            .collect();
        let mut undo = self.undo.lock().expect("lock poisoned");
        undo.push_back(UndoEntry { seq, objects });
        while undo.len() > self.config.undo_depth {
            undo.pop_front();
        }
    }

    /// Settle pending references against the table: drop those whose
    /// property no longer holds the reference, and publish a notice for
    /// those whose target is now present.
    fn heal(&self) {
        let table = self.table.read().expect("lock poisoned");
        let mut pending = self.pending.lock().expect("lock poisoned");
        let mut healed = Vec::new();
        pending.retain(|unknown| {
            let current = table
                .get(&unknown.source)
                .and_then(|source| source.get(&unknown.property));
            if !matches!(current, Some(Value::Ref(r)) if *r == unknown.reference) {
                return false;
            }
            match unknown.reference.target_id() {
                Some(target) if table.contains(&target) => {
                    healed.push(Healed {
                        reference: unknown.clone(),
                        target,
                    });
                    false
                }
                _ => true,
            }
        });
        drop(pending);
        drop(table);
        for notice in healed {
            debug!(
                source = %notice.reference.source.short_id(),
                property = %notice.reference.property,
                "reference healed"
            );
            // No subscribers is not an error.
            let _ = self.healed.send(notice);
        }
    }
}

/// Property-level differences between the table and the incoming writes.
fn field_changes(table: &ObjectTable, writes: &[ObjectState]) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    for write in writes {
        let local = table.get(&write.id());
        for (name, value) in write.fields() {
            let old = local.and_then(|l| l.get(name)).map(encode);
            let new = Some(encode(value));
            if old != new {
                changes.push(FieldChange {
                    object: write.id(),
                    property: name.clone(),
                    old,
                    new,
                });
            }
        }
        if let Some(local) = local {
            for (name, value) in local.fields() {
                if write.get(name).is_none() {
                    changes.push(FieldChange {
                        object: write.id(),
                        property: name.clone(),
                        old: Some(encode(value)),
                        new: None,
                    });
                }
            }
        }
    }
    changes
}

#[async_trait]
impl Receiver for Store {
    async fn receive(&self, from: Endpoint, msg: StoreMessage) -> StoreResult<Option<StoreMessage>> {
        match (self.role, msg) {
            (Role::Primary, StoreMessage::SyncRequest) => {
                Ok(Some(StoreMessage::SyncResponse(self.snapshot(None).await?)))
            }
            (Role::Primary, StoreMessage::SettleRequest(tx)) => {
                let snapshot = self.snapshot(Some(tx)).await?;
                debug!(
                    tx = %tx.short_id(),
                    committed = snapshot.settled.is_some(),
                    "transaction settled"
                );
                Ok(Some(StoreMessage::SyncResponse(snapshot)))
            }
            (Role::Primary, StoreMessage::CommitRequest(payload)) => {
                let router = self.require_router()?;
                let decision = self.commit(from, payload, router.as_ref()).await?;
                Ok(Some(StoreMessage::CommitDecision(decision)))
            }
            (Role::Secondary, StoreMessage::Committed(notice)) => {
                match self.apply_remote(&notice.shapes, &notice.objects, notice.seq) {
                    Err(StoreError::UnknownShape(descriptor)) => {
                        debug!(
                            seq = notice.seq,
                            descriptor = %descriptor.short_id(),
                            "notice uses a shape never announced here, resyncing"
                        );
                        let router = self.require_router()?;
                        self.sync(router.as_ref()).await?;
                    }
                    other => other?,
                }
                Ok(None)
            }
            (
                Role::Secondary,
                StoreMessage::SyncRequest
                | StoreMessage::SettleRequest(_)
                | StoreMessage::CommitRequest(_),
            ) => Ok(Some(StoreMessage::Error {
                code: codes::NOT_PRIMARY,
                message: "not the primary store".into(),
            })),
            (_, other) => Ok(Some(StoreMessage::Error {
                code: codes::UNSUPPORTED,
                message: format!("unexpected {}", other.type_name()),
            })),
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Identifiable for Store {
    fn id(&self) -> ObjectId {
        self.endpoint()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("role", &self.role)
            .field("endpoint", &self.endpoint.peek())
            .field("objects", &self.len())
            .field("seq", &self.seq())
            .finish()
    }
}
