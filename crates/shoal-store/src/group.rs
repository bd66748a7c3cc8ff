use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::config::StoreConfig;
use crate::context::ProcessContext;
use crate::error::{StoreError, StoreResult};
use crate::fatal::FatalSink;
use crate::log::{CommitLog, InMemoryCommitLog};
use crate::router::Router;
use crate::store::Store;

/// One process's membership in a store group.
///
/// Exactly one process per group is the coordinator; it alone may host
/// the primary store. Every process, coordinator included, obtains
/// secondary handles through [`Group::store`].
pub struct Group {
    ctx: ProcessContext,
    router: Arc<dyn Router>,
    config: StoreConfig,
    coordinator: bool,
    primary: tokio::sync::Mutex<Option<Arc<Store>>>,
    log: Arc<dyn CommitLog>,
    fatal: FatalSink,
}

impl Group {
    /// Membership for the group's coordinating process.
    pub fn coordinator(ctx: ProcessContext, router: Arc<dyn Router>, config: StoreConfig) -> Self {
        Self::new(ctx, router, config, true)
    }

    /// Membership for any other process.
    pub fn worker(ctx: ProcessContext, router: Arc<dyn Router>, config: StoreConfig) -> Self {
        Self::new(ctx, router, config, false)
    }

    fn new(
        ctx: ProcessContext,
        router: Arc<dyn Router>,
        config: StoreConfig,
        coordinator: bool,
    ) -> Self {
        Self {
            ctx,
            router,
            config,
            coordinator,
            primary: tokio::sync::Mutex::new(None),
            log: Arc::new(InMemoryCommitLog::new()),
            fatal: FatalSink::new(),
        }
    }

    /// Record the primary's commits in `log` instead of a fresh in-memory log.
    pub fn with_commit_log(mut self, log: Arc<dyn CommitLog>) -> Self {
        self.log = log;
        self
    }

    /// Route fatal and unobserved failures to `fatal`.
    pub fn with_fatal_sink(mut self, fatal: FatalSink) -> Self {
        self.fatal = fatal;
        self
    }

    pub fn is_coordinator(&self) -> bool {
        self.coordinator
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn context(&self) -> &ProcessContext {
        &self.ctx
    }

    pub fn router(&self) -> &Arc<dyn Router> {
        &self.router
    }

    /// The log the primary records accepted transactions in.
    pub fn commit_log(&self) -> &Arc<dyn CommitLog> {
        &self.log
    }

    /// The primary, if this process has constructed it.
    pub async fn primary(&self) -> Option<Arc<Store>> {
        self.primary.lock().await.clone()
    }

    /// Construct and start the primary unless it already exists.
    pub async fn ensure_primary(&self) -> StoreResult<Arc<Store>> {
        if !self.coordinator {
            return Err(StoreError::NotCoordinator);
        }
        let mut slot = self.primary.lock().await;
        if let Some(primary) = slot.as_ref() {
            return Ok(Arc::clone(primary));
        }
        let primary = self.start_primary().await?;
        *slot = Some(Arc::clone(&primary));
        Ok(primary)
    }

    /// Construct and start the primary.
    ///
    /// A group has exactly one primary: a second construction, from this
    /// group or from another one sharing the router, is a fatal error and
    /// halts before any transaction reaches it.
    pub async fn spawn_primary(&self) -> StoreResult<Arc<Store>> {
        if !self.coordinator {
            return Err(StoreError::NotCoordinator);
        }
        let mut slot = self.primary.lock().await;
        if slot.is_some() {
            self.fatal.fail(StoreError::PrimaryExists {
                group: self.config.group.clone(),
            });
        }
        let primary = self.start_primary().await?;
        *slot = Some(Arc::clone(&primary));
        Ok(primary)
    }

    /// A new secondary handle, attached and synchronised with the primary.
    pub async fn store(&self) -> StoreResult<Arc<Store>> {
        let store = Store::secondary(&self.ctx, self.config.clone(), self.fatal.clone());
        store.start(Arc::clone(&self.router)).await?;
        Ok(store)
    }

    async fn start_primary(&self) -> StoreResult<Arc<Store>> {
        let primary = Store::primary(
            &self.ctx,
            self.config.clone(),
            Arc::clone(&self.log),
            self.fatal.clone(),
        );
        match primary.start(Arc::clone(&self.router)).await {
            Ok(()) => {}
            Err(StoreError::PrimaryExists { .. }) => self.fatal.fail(StoreError::PrimaryExists {
                group: self.config.group.clone(),
            }),
            Err(e) => return Err(e),
        }
        info!(group = %self.config.group, endpoint = %primary.endpoint().short_id(), "primary constructed");
        Ok(primary)
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("group", &self.config.group)
            .field("coordinator", &self.coordinator)
            .field("primary", &self.router.primary_endpoint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalRouter;
    use shoal_codec::Value;
    use shoal_types::ROOT_ID;

    fn group(coordinator: bool, router: &Arc<LocalRouter>) -> Group {
        let router: Arc<dyn Router> = router.clone();
        let ctx = ProcessContext::bootstrap();
        if coordinator {
            Group::coordinator(ctx, router, StoreConfig::default())
        } else {
            Group::worker(ctx, router, StoreConfig::default())
        }
    }

    #[tokio::test]
    async fn ensure_primary_is_idempotent() {
        let router = Arc::new(LocalRouter::default());
        let group = group(true, &router);
        let a = group.ensure_primary().await.unwrap();
        let b = group.ensure_primary().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_primary());
        assert_eq!(router.primary_endpoint(), Some(a.endpoint()));
    }

    #[tokio::test]
    #[should_panic(expected = "already has a primary")]
    async fn second_primary_is_fatal() {
        let router = Arc::new(LocalRouter::default());
        let group = group(true, &router);
        group.spawn_primary().await.unwrap();
        let _ = group.spawn_primary().await;
    }

    #[tokio::test]
    #[should_panic(expected = "already has a primary")]
    async fn primary_from_another_group_is_fatal() {
        let router = Arc::new(LocalRouter::default());
        group(true, &router).spawn_primary().await.unwrap();
        let _ = group(true, &router).spawn_primary().await;
    }

    #[tokio::test]
    async fn workers_never_host_the_primary() {
        let router = Arc::new(LocalRouter::default());
        let worker = group(false, &router);
        assert!(matches!(
            worker.ensure_primary().await,
            Err(StoreError::NotCoordinator)
        ));
        assert!(matches!(
            worker.spawn_primary().await,
            Err(StoreError::NotCoordinator)
        ));
    }

    #[tokio::test]
    async fn worker_store_needs_a_primary() {
        let router = Arc::new(LocalRouter::default());
        let worker = group(false, &router);
        assert!(matches!(worker.store().await, Err(StoreError::NoPrimary)));
        assert_eq!(router.endpoint_count(), 0);

        group(true, &router).ensure_primary().await.unwrap();
        let store = worker.store().await.unwrap();
        assert!(!store.is_primary());
        assert!(store.is_started());
    }

    #[tokio::test]
    async fn every_store_call_is_a_new_secondary() {
        let router = Arc::new(LocalRouter::default());
        let group = group(true, &router);
        group.ensure_primary().await.unwrap();
        let a = group.store().await.unwrap();
        let b = group.store().await.unwrap();
        assert_ne!(a.endpoint(), b.endpoint());
        assert_eq!(router.endpoint_count(), 3);
    }

    #[tokio::test]
    async fn dropped_handles_detach() {
        let router = Arc::new(LocalRouter::default());
        let group = group(true, &router);
        let primary = group.ensure_primary().await.unwrap();
        for _ in 0..3 {
            let store = group.store().await.unwrap();
            assert!(store.is_started());
        }
        assert_eq!(router.endpoint_count(), 1);

        let kept = group.store().await.unwrap();
        primary
            .atomic(|tx| tx.set(tx.root(), "n", 1u64))
            .await
            .unwrap();
        assert_eq!(kept.get(ROOT_ID, "n").unwrap(), Some(Value::Int(1)));
        assert_eq!(router.endpoint_count(), 2);
    }
}
