use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::cdn::CdnClassifier;
use crate::error::RequestError;
use crate::http_client::{Client, ClientConfig, Connector};
use crate::output::{ScanEvent, TargetError};
use crate::probe::dns::HostResolver;
use crate::probe::{ProbeResult, ProbeRunner, ProbeSet};
use crate::utils::normalize_target;

/// Shared result cache using parking_lot RwLock for better performance
pub struct ResultCache<K, V> {
    cache: Arc<RwLock<ahash::AHashMap<K, V>>>,
}

impl<K: std::hash::Hash + Eq + Clone, V: Clone> ResultCache<K, V> {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(RwLock::new(ahash::AHashMap::new())),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.cache.read().get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        self.cache.write().insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

impl<K, V> Default for ResultCache<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub targets: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs the request + probe pipeline for every target across a bounded pool
/// of workers. Each worker owns one `Client` for its lifetime and closes it
/// once the queue is drained.
pub struct Scanner {
    connector: Arc<dyn Connector>,
    resolver: Arc<dyn HostResolver>,
    classifier: Option<Arc<CdnClassifier>>,
    client_config: ClientConfig,
    probes: ProbeSet,
    workers: usize,
}

impl Scanner {
    pub fn new(
        connector: Arc<dyn Connector>,
        resolver: Arc<dyn HostResolver>,
        client_config: ClientConfig,
        probes: ProbeSet,
    ) -> Self {
        Self { connector, resolver, classifier: None, client_config, probes, workers: 50 }
    }

    pub fn with_classifier(mut self, classifier: Arc<CdnClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Request one target and run the enabled probes over the response.
    pub async fn scan_target(&self, client: &Client, target: &str) -> Result<ProbeResult, RequestError> {
        let url = normalize_target(target);
        let response = client.get(&url).await?;
        tracing::debug!(target = %target, status = response.status_code, ms = response.response_time, "response");
        let runner = ProbeRunner::new(client, self.resolver.as_ref(), self.classifier.as_deref());
        Ok(runner.run(&response, &self.probes).await)
    }

    /// Scan every target, pushing one event per target into `sink`. Ordering
    /// follows completion, not input.
    pub async fn run(self: &Arc<Self>, targets: Vec<String>, sink: mpsc::Sender<ScanEvent>) -> ScanSummary {
        let total = targets.len();
        let (tx, rx) = mpsc::channel::<String>(total.max(1));
        for t in targets {
            // capacity covers every target
            if let Err(e) = tx.try_send(t) {
                tracing::error!(error = %e, "target queue rejected a target");
            }
        }
        drop(tx);

        let queue = Arc::new(Mutex::new(rx));
        let succeeded = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let mut workers = JoinSet::new();
        for id in 0..self.workers.min(total) {
            let scanner = Arc::clone(self);
            let queue = queue.clone();
            let sink = sink.clone();
            let succeeded = succeeded.clone();
            let failed = failed.clone();
            workers.spawn(async move {
                scanner.worker(id, queue, sink, succeeded, failed).await;
            });
        }
        drop(sink);

        while let Some(res) = workers.join_next().await {
            if let Err(e) = res {
                tracing::error!(error = %e, "scan worker aborted");
            }
        }

        let summary = ScanSummary {
            targets: total,
            succeeded: succeeded.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
        };
        tracing::info!(targets = summary.targets, succeeded = summary.succeeded, failed = summary.failed, "scan finished");
        summary
    }

    async fn worker(
        &self,
        id: usize,
        queue: Arc<Mutex<mpsc::Receiver<String>>>,
        sink: mpsc::Sender<ScanEvent>,
        succeeded: Arc<AtomicUsize>,
        failed: Arc<AtomicUsize>,
    ) {
        let client = Client::open(self.connector.as_ref(), self.client_config.clone());
        if let Err(e) = &client {
            tracing::warn!(worker = id, error = %e, "could not open http client");
        }

        loop {
            let next = queue.lock().await.recv().await;
            let Some(target) = next else { break };

            let outcome = match &client {
                Ok(c) => self.scan_target(c, &target).await,
                Err(e) => Err(e.clone()),
            };
            let event = match outcome {
                Ok(result) => {
                    succeeded.fetch_add(1, Ordering::Relaxed);
                    ScanEvent::Result(result)
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(worker = id, target = %target, error = %e, "target failed");
                    ScanEvent::Error(TargetError { target, message: e.to_string() })
                }
            };
            if sink.send(event).await.is_err() {
                tracing::warn!(worker = id, "output closed, stopping worker");
                break;
            }
        }

        if let Ok(c) = client {
            c.close();
        }
    }
}
