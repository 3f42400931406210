use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{error, info, trace};

use crate::data::record;
use crate::graph::{NodeId, Result};
use crate::store::SharedStore;

/// Periodic driver for a node with playback behavior. Every tick is one
/// complete pass run under the store lock.
#[derive(Debug)]
pub struct Playback {
    store: SharedStore,
    node_id: NodeId,
    task_handle: Option<JoinHandle<()>>,
}

impl Playback {
    /// Switches the node into playing mode and starts ticking it at the
    /// store's configured playback interval. Must be called inside a tokio
    /// runtime.
    pub fn start(store: SharedStore, node_id: NodeId) -> Result<Self> {
        let interval = {
            let mut store = store.lock();
            store.set(&node_id, record(json!({ "is_playing": true })))?;
            store.playback_interval()
        };
        assert!(!interval.is_zero());

        let task_handle = tokio::spawn({
            let store = store.clone();
            async move {
                playback_loop(store, node_id, interval).await;
            }
        });
        info!(%node_id, interval_ms = interval.as_millis() as u64, "Playback started");

        Ok(Self {
            store,
            node_id,
            task_handle: Some(task_handle),
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops ticking and leaves playing mode. Safe to call twice.
    pub fn stop(&mut self) -> Result<()> {
        let Some(task_handle) = self.task_handle.take() else {
            return Ok(());
        };
        task_handle.abort();
        info!(node_id = %self.node_id, "Playback stopped");

        let mut store = self.store.lock();
        if store.graph().by_id(&self.node_id).is_some() {
            store.set(&self.node_id, record(json!({ "is_playing": false })))?;
        }

        Ok(())
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        if let Some(task_handle) = self.task_handle.take() {
            task_handle.abort();
        }
    }
}

async fn playback_loop(store: SharedStore, node_id: NodeId, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // the first tick of an interval completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let result = store.lock().tick(&node_id);
        match result {
            Ok(Some(report)) => trace!(%node_id, pass_no = report.pass_no, "Playback tick"),
            Ok(None) => trace!(%node_id, "Playback tick without changes"),
            Err(err) => {
                error!(%node_id, "Playback stopped: {err}");
                break;
            }
        }
    }
}
