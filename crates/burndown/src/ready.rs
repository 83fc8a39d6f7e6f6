//! Startup barrier.
//!
//! Nothing may touch the backlog until settings are loaded. Instead of a
//! readiness flag that handlers poll, startup hands out a [`ReadyGate`] that
//! resolves to the running service once [`bootstrap`] completes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use burndown_store::Store;

use crate::backlog::Backlog;
use crate::config::BacklogConfig;
use crate::error::{BacklogError, Result};
use crate::settings::SettingsTable;

/// Create a connected signal and gate.
pub fn ready_gate<T>() -> (ReadySignal<T>, ReadyGate<T>) {
    let (tx, rx) = watch::channel(None);
    (ReadySignal { tx }, ReadyGate { rx })
}

/// The sending half. Consumed when the value is published.
///
/// Dropping it without calling [`ReadySignal::ready`] fails every waiter.
#[derive(Debug)]
pub struct ReadySignal<T> {
    tx: watch::Sender<Option<Arc<T>>>,
}

impl<T> ReadySignal<T> {
    /// Publish `value` to every current and future waiter.
    pub fn ready(self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.tx.send_replace(Some(Arc::clone(&value)));
        value
    }
}

/// The waiting half. Cheap to clone; hand one to each handler.
#[derive(Debug)]
pub struct ReadyGate<T> {
    rx: watch::Receiver<Option<Arc<T>>>,
}

impl<T> Clone for ReadyGate<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> ReadyGate<T> {
    /// Wait until the value is published.
    pub async fn wait(&self) -> Result<Arc<T>> {
        let mut rx = self.rx.clone();
        let published = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| BacklogError::NotReady("startup was abandoned".into()))?;

        let value: Option<Arc<T>> = (*published).clone();
        value.ok_or_else(|| BacklogError::NotReady("startup was abandoned".into()))
    }

    /// Like [`ReadyGate::wait`], giving up after `timeout`.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<Arc<T>> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| BacklogError::NotReady(format!("not ready after {:?}", timeout)))?
    }

    /// The value, if it has been published already.
    pub fn try_get(&self) -> Option<Arc<T>> {
        self.rx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

/// A started service: the backlog plus the settings it was configured from.
pub struct Service<S: Store> {
    pub backlog: Backlog<S>,
    pub settings: SettingsTable,
}

/// Load settings, build the service and open the gate.
///
/// Missing settings are persisted with their defaults. If this fails, the
/// signal is dropped and every waiter sees `NotReady`.
pub async fn bootstrap<S: Store>(
    store: S,
    config: BacklogConfig,
    signal: ReadySignal<Service<S>>,
) -> Result<Arc<Service<S>>> {
    let settings = SettingsTable::load(&store).await?;
    let config = config.with_settings(&settings)?;

    info!(
        story_limit = ?config.story_limit,
        tail_policy = ?config.tail_policy,
        "backlog ready"
    );

    let service = Service {
        backlog: Backlog::new(store, config),
        settings,
    };
    Ok(signal.ready(service))
}
