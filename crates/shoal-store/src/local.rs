use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::RouterConfig;
use crate::error::{StoreError, StoreResult};
use crate::message::{Endpoint, StoreMessage};
use crate::router::{Receiver, Role, Router};
use crate::wire::WireCodec;

struct Route {
    role: Role,
    receiver: Arc<dyn Receiver>,
}

#[derive(Default)]
struct Routes {
    primary: Option<Endpoint>,
    endpoints: HashMap<Endpoint, Route>,
}

/// In-process router.
///
/// Every message is framed and unframed with [`WireCodec`] on the way
/// through, so handles sharing a process see exactly what a remote peer
/// would.
pub struct LocalRouter {
    routes: RwLock<Routes>,
    codec: WireCodec,
    timeout: Duration,
}

impl LocalRouter {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            routes: RwLock::new(Routes::default()),
            codec: WireCodec::new(config.max_message_size),
            timeout: config.request_timeout(),
        }
    }

    /// Number of attached endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.routes.read().expect("lock poisoned").endpoints.len()
    }

    fn transit(&self, msg: &StoreMessage) -> StoreResult<StoreMessage> {
        let frame = self.codec.encode(msg)?;
        let (decoded, _) = self.codec.decode(&frame)?;
        Ok(decoded)
    }

    fn primary_receiver(&self) -> StoreResult<Arc<dyn Receiver>> {
        let routes = self.routes.read().expect("lock poisoned");
        routes
            .primary
            .and_then(|id| routes.endpoints.get(&id))
            .map(|route| Arc::clone(&route.receiver))
            .ok_or(StoreError::NoPrimary)
    }

    fn secondaries_except(&self, from: &Endpoint) -> Vec<(Endpoint, Arc<dyn Receiver>)> {
        self.routes
            .read()
            .expect("lock poisoned")
            .endpoints
            .iter()
            .filter(|(id, route)| route.role == Role::Secondary && *id != from)
            .map(|(id, route)| (*id, Arc::clone(&route.receiver)))
            .collect()
    }

    /// Hand `msg` to `receiver` on its own task and wait up to the request
    /// timeout for the outcome. A timeout abandons the wait, not the task:
    /// the receiver always runs to completion.
    async fn deliver(
        &self,
        receiver: Arc<dyn Receiver>,
        from: Endpoint,
        msg: StoreMessage,
    ) -> StoreResult<Option<StoreMessage>> {
        let task = tokio::spawn(async move { receiver.receive(from, msg).await });
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(StoreError::Transport(format!("receiver failed: {e}"))),
            Err(_) => Err(StoreError::Transport(format!(
                "no reply within {} ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

impl Default for LocalRouter {
    fn default() -> Self {
        Self::new(&RouterConfig::default())
    }
}

#[async_trait]
impl Router for LocalRouter {
    fn register(
        &self,
        endpoint: Endpoint,
        role: Role,
        receiver: Arc<dyn Receiver>,
    ) -> StoreResult<()> {
        let mut routes = self.routes.write().expect("lock poisoned");
        if role == Role::Primary {
            if let Some(existing) = routes.primary {
                if existing != endpoint {
                    return Err(StoreError::PrimaryExists {
                        group: existing.short_id(),
                    });
                }
            }
            routes.primary = Some(endpoint);
        }
        routes.endpoints.insert(endpoint, Route { role, receiver });
        debug!(endpoint = %endpoint.short_id(), %role, "endpoint registered");
        Ok(())
    }

    fn unregister(&self, endpoint: &Endpoint) {
        let mut routes = self.routes.write().expect("lock poisoned");
        if routes.endpoints.remove(endpoint).is_some() {
            if routes.primary == Some(*endpoint) {
                routes.primary = None;
            }
            debug!(endpoint = %endpoint.short_id(), "endpoint unregistered");
        }
    }

    fn primary_endpoint(&self) -> Option<Endpoint> {
        self.routes.read().expect("lock poisoned").primary
    }

    async fn request(&self, from: Endpoint, msg: StoreMessage) -> StoreResult<StoreMessage> {
        let receiver = self.primary_receiver()?;
        let msg = self.transit(&msg)?;
        let kind = msg.type_name();
        match self.deliver(receiver, from, msg).await? {
            Some(reply) => self.transit(&reply),
            None => Err(StoreError::Transport(format!("no reply to {kind}"))),
        }
    }

    async fn broadcast(&self, from: Endpoint, msg: StoreMessage) {
        let msg = match self.transit(&msg) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "broadcast not encodable");
                return;
            }
        };
        for (endpoint, receiver) in self.secondaries_except(&from) {
            if let Err(e) = self.deliver(receiver, from, msg.clone()).await {
                warn!(endpoint = %endpoint.short_id(), error = %e, "broadcast delivery failed");
            }
        }
    }
}

impl std::fmt::Debug for LocalRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes = self.routes.read().expect("lock poisoned");
        f.debug_struct("LocalRouter")
            .field("endpoints", &routes.endpoints.len())
            .field("primary", &routes.primary)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{codes, Decision};
    use shoal_types::ObjectId;
    use std::sync::Mutex;

    /// Answers every request with a fixed decision and records notices.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<&'static str>>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Receiver for Recorder {
        async fn receive(
            &self,
            _from: Endpoint,
            msg: StoreMessage,
        ) -> StoreResult<Option<StoreMessage>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.seen.lock().unwrap().push(msg.type_name());
            Ok(match msg {
                StoreMessage::SyncRequest => {
                    Some(StoreMessage::CommitDecision(Decision::Committed { seq: 9 }))
                }
                StoreMessage::Error { .. } => None,
                _ => Some(StoreMessage::Error {
                    code: codes::UNSUPPORTED,
                    message: "no".into(),
                }),
            })
        }
    }

    #[tokio::test]
    async fn request_reaches_primary() {
        let router = LocalRouter::default();
        let primary = Arc::new(Recorder::default());
        router
            .register(ObjectId::generate(), Role::Primary, primary.clone())
            .unwrap();
        let reply = router
            .request(ObjectId::generate(), StoreMessage::SyncRequest)
            .await
            .unwrap();
        assert_eq!(
            reply,
            StoreMessage::CommitDecision(Decision::Committed { seq: 9 })
        );
        assert_eq!(*primary.seen.lock().unwrap(), vec!["SyncRequest"]);
    }

    #[tokio::test]
    async fn request_without_primary() {
        let router = LocalRouter::default();
        let err = router
            .request(ObjectId::generate(), StoreMessage::SyncRequest)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoPrimary));
    }

    #[tokio::test]
    async fn missing_reply_is_transport_error() {
        let router = LocalRouter::default();
        router
            .register(ObjectId::generate(), Role::Primary, Arc::new(Recorder::default()))
            .unwrap();
        let msg = StoreMessage::Error {
            code: codes::INTERNAL,
            message: String::new(),
        };
        let err = router.request(ObjectId::generate(), msg).await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }

    #[tokio::test]
    async fn request_times_out() {
        let router = LocalRouter::new(&RouterConfig {
            request_timeout_ms: 10,
            ..Default::default()
        });
        let slow = Recorder {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        };
        router
            .register(ObjectId::generate(), Role::Primary, Arc::new(slow))
            .unwrap();
        let err = router
            .request(ObjectId::generate(), StoreMessage::SyncRequest)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }

    #[tokio::test]
    async fn timed_out_request_still_runs_to_completion() {
        let router = LocalRouter::new(&RouterConfig {
            request_timeout_ms: 10,
            ..Default::default()
        });
        let slow = Arc::new(Recorder {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        router
            .register(ObjectId::generate(), Role::Primary, slow.clone())
            .unwrap();
        assert!(router
            .request(ObjectId::generate(), StoreMessage::SyncRequest)
            .await
            .is_err());
        assert!(slow.seen.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*slow.seen.lock().unwrap(), vec!["SyncRequest"]);
    }

    #[test]
    fn second_primary_rejected() {
        let router = LocalRouter::default();
        let first = ObjectId::generate();
        router
            .register(first, Role::Primary, Arc::new(Recorder::default()))
            .unwrap();
        let err = router
            .register(ObjectId::generate(), Role::Primary, Arc::new(Recorder::default()))
            .unwrap_err();
        assert!(matches!(err, StoreError::PrimaryExists { .. }));
        assert_eq!(router.primary_endpoint(), Some(first));

        router.unregister(&first);
        assert_eq!(router.primary_endpoint(), None);
        assert_eq!(router.endpoint_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_skips_sender_and_primary() {
        let router = LocalRouter::default();
        let primary = Arc::new(Recorder::default());
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let a_id = ObjectId::generate();
        router
            .register(ObjectId::generate(), Role::Primary, primary.clone())
            .unwrap();
        router.register(a_id, Role::Secondary, a.clone()).unwrap();
        router
            .register(ObjectId::generate(), Role::Secondary, b.clone())
            .unwrap();

        let notice = StoreMessage::Error {
            code: codes::INTERNAL,
            message: "note".into(),
        };
        router.broadcast(a_id, notice).await;
        assert!(primary.seen.lock().unwrap().is_empty());
        assert!(a.seen.lock().unwrap().is_empty());
        assert_eq!(*b.seen.lock().unwrap(), vec!["Error"]);
    }
}
