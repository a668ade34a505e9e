//! Single-owner access to the registry.
//!
//! One task owns the [`DeviceRegistry`] and handles requests strictly in
//! arrival order, so load-modify-save cycles from different callers never
//! interleave.  Callers talk to it through a cloneable [`RegistryHandle`].

use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{RegistryError, Result};
use crate::registry::{DeviceRegistry, NO_DEVICES};
use crate::store::DeviceStore;
use crate::types::{DeviceRecord, Outcome};

#[derive(Debug)]
enum Request {
    LoadAll(oneshot::Sender<Vec<DeviceRecord>>),
    Add(DeviceRecord, oneshot::Sender<Outcome>),
    Remove(String, oneshot::Sender<Outcome>),
    Summary(oneshot::Sender<String>),
}

/// Runs the registry owner until every handle has been dropped.
async fn run_registry<S: DeviceStore>(
    registry: DeviceRegistry<S>,
    mut request_rx: mpsc::Receiver<Request>,
) {
    while let Some(request) = request_rx.recv().await {
        debug!("Registry request: {:?}", request);
        // A dropped reply receiver only means the caller went away.
        match request {
            Request::LoadAll(reply) => {
                let _ = reply.send(registry.load_all().await);
            }
            Request::Add(record, reply) => {
                let _ = reply.send(registry.add(record).await);
            }
            Request::Remove(id, reply) => {
                let _ = reply.send(registry.remove(&id).await);
            }
            Request::Summary(reply) => {
                let _ = reply.send(registry.render_summary().await);
            }
        }
    }
    info!("Registry request channel closed, shutting down");
}

#[derive(Clone)]
pub struct RegistryHandle {
    request_tx: mpsc::Sender<Request>,
}

impl RegistryHandle {
    /// Move `registry` into its owner task.  `queue_depth` bounds the number
    /// of requests waiting to be served.
    pub fn spawn<S>(registry: DeviceRegistry<S>, queue_depth: usize) -> (Self, JoinHandle<()>)
    where
        S: DeviceStore + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel(queue_depth.max(1));
        let task = tokio::spawn(run_registry(registry, request_rx));
        (Self { request_tx }, task)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| RegistryError::Closed)?;
        reply_rx.await.map_err(|_| RegistryError::Closed)
    }

    pub async fn load_all(&self) -> Vec<DeviceRecord> {
        self.request(Request::LoadAll).await.unwrap_or_else(|e| {
            error!("Failed to load device list: {}", e);
            Vec::new()
        })
    }

    pub async fn count(&self) -> usize {
        self.load_all().await.len()
    }

    pub async fn add(&self, record: DeviceRecord) -> Outcome {
        self.request(|reply| Request::Add(record, reply))
            .await
            .unwrap_or_else(unavailable)
    }

    pub async fn remove(&self, id: impl Into<String>) -> Outcome {
        let id = id.into();
        self.request(|reply| Request::Remove(id, reply))
            .await
            .unwrap_or_else(unavailable)
    }

    pub async fn render_summary(&self) -> String {
        self.request(Request::Summary).await.unwrap_or_else(|e| {
            error!("Failed to render device summary: {}", e);
            NO_DEVICES.to_string()
        })
    }
}

fn unavailable(e: RegistryError) -> Outcome {
    error!("Registry request failed: {}", e);
    Outcome::fail(e.to_string())
}
