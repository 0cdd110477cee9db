//! Periodic background sync.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::DataContext;

/// Run [`DataContext::sync_data`] every `interval` while online.
///
/// The timer stops as soon as the online flag turns false and is re-armed a
/// full interval after it turns true again. Ticks never stack: a tick that
/// lands while a sync is running is absorbed by the container's guard.
pub fn spawn_periodic_sync(
    ctx: Arc<DataContext>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut online = ctx.subscribe_online();

        loop {
            while !*online.borrow_and_update() {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = online.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }

            debug!(every_secs = interval.as_secs(), "Periodic sync armed");
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = online.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if !*online.borrow_and_update() {
                            debug!("Offline, periodic sync paused");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            ctx.sync_data().await;
                        });
                    }
                }
            }
        }
    })
}
