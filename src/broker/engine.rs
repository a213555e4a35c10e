//! Broker engine
//!
//! The composition root of the core. It owns the `SubscriptionRegistry` and
//! the transform worker pools, and turns each decoded `Message` from a
//! connection into registry operations:
//! - PING is answered with a PING frame
//! - SUB/UNSUB go straight to the registry, which acknowledges them
//! - PUB payloads starting with a transform prefix (`rot13sort:`,
//!   `sumall:`) are stripped of it and dispatched to the matching pool;
//!   every other payload is fanned out directly
//!
//! Transform results come back on a single channel drained by a dispatcher
//! task, which publishes each one on its original topic exactly like a
//! fresh publish. The dispatcher is the only path from workers back into
//! the registry.
//!
//! Concurrency and usage notes:
//! - All methods take `&self`; the broker is shared as `Arc<Broker>` by the
//!   connection tasks.
//! - `Broker::start` must be called from inside a tokio runtime since it
//!   spawns the dispatcher task.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::broker::registry::SubscriptionRegistry;
use crate::client::{Client, ConnectionId};
use crate::config::BrokerSettings;
use crate::protocol::{Message, Topic, codec};
use crate::utils::error::Result;
use crate::worker::{Rot13Sort, SumAll, Transform, TransformResult, TransformWorkerPool};

/// Payload prefix routing a publish through the rot13-and-sort transform.
pub const ROT13SORT_PREFIX: &[u8] = b"rot13sort:";

/// Payload prefix routing a publish through the all-to-all checksum.
pub const SUMALL_PREFIX: &[u8] = b"sumall:";

#[derive(Debug)]
struct Route {
    prefix: &'static [u8],
    pool: TransformWorkerPool,
}

#[derive(Debug)]
pub struct Broker {
    registry: Arc<SubscriptionRegistry>,
    routes: Vec<Route>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Broker {
    /// Build the registry and worker pools and start the result dispatcher.
    pub fn start(settings: &BrokerSettings) -> Result<Self> {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        let transforms: [(&'static [u8], Arc<dyn Transform>, usize); 2] = [
            (ROT13SORT_PREFIX, Arc::new(Rot13Sort), settings.rot13sort_workers),
            (SUMALL_PREFIX, Arc::new(SumAll), settings.sumall_workers),
        ];

        let mut routes = Vec::with_capacity(transforms.len());
        for (prefix, transform, workers) in transforms {
            let pool = TransformWorkerPool::new(transform, workers, results_tx.clone())?;
            routes.push(Route { prefix, pool });
        }
        drop(results_tx);

        let dispatcher = tokio::spawn(forward_results(Arc::clone(&registry), results_rx));

        info!(
            rot13sort_workers = settings.rot13sort_workers,
            sumall_workers = settings.sumall_workers,
            "Broker started"
        );

        Ok(Self {
            registry,
            routes,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Apply one decoded message from `client`.
    pub fn handle(&self, client: &Client, message: Message) {
        match message {
            Message::Ping => {
                if let Err(e) = client.send(codec::ping_frame()) {
                    debug!(error = %e, "Ping reply not delivered");
                }
            }
            Message::Sub { topic } => {
                self.registry.subscribe(topic, client);
            }
            Message::Unsub { topic } => {
                self.registry.unsubscribe(topic, client);
            }
            Message::Pub { topic, payload } => self.publish(topic, payload),
        }
    }

    /// Publish `payload`, routing it through a worker pool when it carries
    /// a transform prefix.
    pub fn publish(&self, topic: Topic, payload: Bytes) {
        if let Some(route) = self.route_for(&payload) {
            let job = payload.slice(route.prefix.len()..);
            let transform = route.pool.name();
            match route.pool.dispatch(topic, job) {
                Ok(worker) => debug!(topic, transform, worker, "Dispatched transform"),
                Err(e) => warn!(topic, transform, error = %e, "Transform dropped"),
            }
            return;
        }

        self.registry.publish(topic, &payload);
    }

    /// Remove every subscription of a closed connection.
    pub fn disconnect(&self, id: &ConnectionId) {
        self.registry.disconnect(id);
    }

    /// Per-pool job counters, keyed by transform name.
    pub fn transform_stats(&self) -> Vec<(&'static str, Vec<u64>)> {
        self.routes
            .iter()
            .map(|r| (r.pool.name(), r.pool.jobs_dispatched()))
            .collect()
    }

    /// Stop the worker pools and wait until every finished transform has
    /// been published.
    pub async fn shutdown(self: Arc<Self>) {
        let broker = Arc::clone(&self);
        let joined = tokio::task::spawn_blocking(move || {
            for route in &broker.routes {
                route.pool.shutdown();
            }
        })
        .await;
        if let Err(e) = joined {
            error!(error = %e, "Worker pool shutdown failed");
        }

        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = dispatcher {
            if let Err(e) = handle.await {
                error!(error = %e, "Result dispatcher failed");
            }
        }

        info!("Broker stopped");
    }

    fn route_for(&self, payload: &[u8]) -> Option<&Route> {
        self.routes.iter().find(|r| payload.starts_with(r.prefix))
    }
}

async fn forward_results(
    registry: Arc<SubscriptionRegistry>,
    mut results: UnboundedReceiver<TransformResult>,
) {
    while let Some(result) = results.recv().await {
        let delivered = registry.publish(result.topic, &result.payload);
        debug!(
            topic = result.topic,
            worker = result.worker,
            delivered,
            "Published transform result"
        );
    }
    debug!("Result dispatcher finished");
}
