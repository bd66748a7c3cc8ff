//! Replicated object store for Shoal.
//!
//! A store group holds one object table, replicated to every handle. One
//! handle, the primary, is authoritative: it orders every commit, logs it,
//! and broadcasts the result. Every other handle is a secondary that keeps
//! a replica and submits its transactions to the primary.
//!
//! # Entry points
//!
//! - [`Group`] -- a process's membership; builds the primary (coordinator
//!   only) and secondary handles
//! - [`Store`] -- a handle; runs [`atomic`](Store::atomic) transactions,
//!   resolves references, and undoes its own commits
//! - [`Transaction`] -- the mutation API handed to transaction handlers
//!
//! # Boundaries
//!
//! - [`Router`] / [`Receiver`] -- message transport between handles, with
//!   [`LocalRouter`] as the in-process implementation
//! - [`WireCodec`] -- framing for [`StoreMessage`]
//! - [`CommitLog`] -- append-only record of accepted commits, with
//!   [`InMemoryCommitLog`] as a hash-chained in-memory implementation
//!
//! # Rules
//!
//! 1. A transaction is all or nothing: a failing handler changes nothing,
//!    and a rejected commit leaves the submitting handle's table untouched.
//! 2. Commits are totally ordered by the primary's sequence number.
//! 3. Concurrent writers are detected by object version, never merged.
//! 4. Remote writes apply only when newer than the local copy.
//! 5. References to objects that have not arrived resolve to an
//!    [`UnknownReference`](shoal_codec::UnknownReference), which heals once
//!    the target arrives while the property still holds the reference.
//! 6. A commit request that goes unanswered is settled with the primary
//!    before `atomic` returns, so the reported outcome is the real one.
//! 7. A descriptor's signature crosses the wire once per peer; after that
//!    objects refer to it by id.

pub mod config;
pub mod context;
pub mod error;
pub mod fatal;
pub mod group;
pub mod local;
pub mod log;
pub mod message;
pub mod object;
pub mod router;
mod shapes;
pub mod store;
pub mod transaction;
pub mod wire;

pub use config::{RouterConfig, StoreConfig};
pub use context::ProcessContext;
pub use error::{StoreError, StoreResult};
pub use fatal::FatalSink;
pub use group::Group;
pub use local::LocalRouter;
pub use log::{CommitEntry, CommitLog, CommitRecord, FieldChange, InMemoryCommitLog};
pub use message::{Endpoint, StoreMessage};
pub use object::ObjectState;
pub use router::{Receiver, Role, Router};
pub use store::{Healed, Resolved, Store};
pub use transaction::Transaction;
pub use wire::WireCodec;
