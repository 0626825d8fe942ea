//! GC loop - periodic sweep of expired results
//!
//! The broker also drops an expired result when somebody fetches it; this
//! loop covers the handles nobody polls again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::queue::Broker;

/// Run `broker.purge_expired()` every `every` until shutdown is signalled.
pub(crate) async fn gc_loop(
    broker: Arc<dyn Broker>,
    every: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        match broker.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => tracing::info!(purged, "expired results purged"),
            Err(e) => tracing::error!(error = %e, "result purge failed"),
        }
    }
}
