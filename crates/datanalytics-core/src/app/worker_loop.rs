//! WorkerGroup - the lease → execute → complete/fail loop

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::gc_loop::gc_loop;
use super::runtime::Runtime;
use crate::queue::Broker;

/// Worker group handle.
/// - `request_shutdown()` stops taking new leases
/// - `shutdown_and_join()` waits for every worker to exit
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    gc: Option<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, broker: Arc<dyn Broker>, runtime: Arc<Runtime>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let broker = Arc::clone(&broker);
            let rt = Arc::clone(&runtime);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, broker, rt, &mut rx).await;
            });
            joins.push(join);
        }

        tracing::info!(workers = n, "worker group started");
        Self {
            shutdown_tx,
            joins,
            gc: None,
        }
    }

    /// Also sweep expired results every `every`, stopping with the workers.
    pub fn with_result_gc(mut self, broker: Arc<dyn Broker>, every: Duration) -> Self {
        if let Some(previous) = self.gc.take() {
            previous.abort();
        }
        let every = every.max(Duration::from_millis(1));
        let mut rx = self.shutdown_tx.subscribe();
        self.gc = Some(tokio::spawn(async move {
            gc_loop(broker, every, &mut rx).await;
        }));
        tracing::debug!(every = ?every, "result gc started");
        self
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Stop taking new leases. In-flight jobs run to completion.
    pub fn request_shutdown(&self) {
        // receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
        if let Some(gc) = self.gc {
            let _ = gc.await;
        }
        tracing::info!("worker group stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    broker: Arc<dyn Broker>,
    runtime: Arc<Runtime>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease may block, so race it against shutdown
        let lease = tokio::select! {
            changed = shutdown_rx.changed() => {
                // group dropped without shutdown
                if changed.is_err() {
                    break;
                }
                continue;
            }
            lease = broker.lease() => lease,
        };

        let Some(lease) = lease else {
            tokio::task::yield_now().await;
            continue;
        };

        let envelope = lease.envelope().clone();
        let handle = envelope.handle();
        tracing::debug!(
            worker_id,
            handle = %handle,
            kind = %envelope.kind(),
            attempt = lease.attempt(),
            "task leased"
        );

        match runtime.execute(&envelope).await {
            Ok(record) => {
                if let Err(e) = lease.complete(record).await {
                    tracing::error!(worker_id, handle = %handle, error = %e, "complete failed");
                }
            }
            Err(err) => {
                // the queue decides between retry, give up and abort
                match lease.fail(err).await {
                    Ok(decision) => {
                        tracing::debug!(worker_id, handle = %handle, decision = decision.label(), "failure recorded");
                    }
                    Err(e) => {
                        tracing::error!(worker_id, handle = %handle, error = %e, "fail report failed");
                    }
                }
            }
        }
    }
}
