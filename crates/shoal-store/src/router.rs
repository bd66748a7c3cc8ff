use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::message::{Endpoint, StoreMessage};

/// Which side of the replication relationship a store handle is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Holds the authoritative table and orders every commit.
    Primary,
    /// Replicates the primary's table and submits transactions to it.
    Secondary,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// Something that accepts messages delivered by a [`Router`].
#[async_trait]
pub trait Receiver: Send + Sync {
    /// Handle `msg` sent by `from`. Requests return their reply; one-way
    /// notices return `None`.
    async fn receive(&self, from: Endpoint, msg: StoreMessage) -> StoreResult<Option<StoreMessage>>;
}

/// Message transport between store handles.
#[async_trait]
pub trait Router: Send + Sync {
    /// Attach `receiver` at `endpoint`. At most one primary may be attached.
    fn register(
        &self,
        endpoint: Endpoint,
        role: Role,
        receiver: Arc<dyn Receiver>,
    ) -> StoreResult<()>;

    /// Detach `endpoint`. Unknown endpoints are ignored.
    fn unregister(&self, endpoint: &Endpoint);

    /// The attached primary, if any.
    fn primary_endpoint(&self) -> Option<Endpoint>;

    /// Send `msg` to the primary and wait for its reply.
    async fn request(&self, from: Endpoint, msg: StoreMessage) -> StoreResult<StoreMessage>;

    /// Deliver `msg` to every attached secondary other than `from`.
    /// Delivery failures are logged, not returned.
    async fn broadcast(&self, from: Endpoint, msg: StoreMessage);
}
