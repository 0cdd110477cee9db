//! Keeps [`AppData`](crate::state::AppData) in line with the device.
//!
//! The host environment is reached through [`Platform`]; connectivity changes
//! arrive as [`ConnectivityEvent`]s on a channel.

use std::sync::Arc;

use async_trait::async_trait;
use baseseva_shared::{Coordinates, LocationPermission, NetworkStatus, NotificationPermission};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::{DataContext, SyncOutcome};
use crate::state::AppDataPatch;

/// Effective connection types reported as `slow`.
const SLOW_CONNECTION_TYPES: &[&str] = &["slow-2g", "2g"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable")]
    Unavailable,

    #[error("Timed out waiting for a position")]
    Timeout,
}

/// Host capabilities the client depends on.
#[async_trait]
pub trait Platform: Send + Sync {
    fn is_online(&self) -> bool;

    /// Connection class hint such as `4g` or `2g`, when the platform has one.
    fn effective_connection_type(&self) -> Option<String>;

    /// Current geolocation permission per the permissions API. `None` when
    /// the platform has no such API.
    async fn location_permission_policy(&self) -> Option<LocationPermission>;

    /// One-shot position request. May prompt the user.
    async fn current_position(&self) -> Result<Coordinates, PositionError>;

    fn notification_permission(&self) -> NotificationPermission;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

pub fn is_slow_connection(connection_type: &str) -> bool {
    SLOW_CONNECTION_TYPES.contains(&connection_type)
}

pub fn network_status_for(online: bool, connection_type: Option<&str>) -> NetworkStatus {
    match (online, connection_type) {
        (false, _) => NetworkStatus::Offline,
        (true, Some(kind)) if is_slow_connection(kind) => NetworkStatus::Slow,
        (true, _) => NetworkStatus::Online,
    }
}

fn mark_online(ctx: &DataContext, platform: &dyn Platform) {
    let status = network_status_for(true, platform.effective_connection_type().as_deref());
    ctx.update_app_data(AppDataPatch {
        is_online: Some(true),
        network_status: Some(status),
        ..AppDataPatch::default()
    });
}

/// Back online: record it and run a catch-up sync.
pub async fn on_online(ctx: &DataContext, platform: &dyn Platform) -> SyncOutcome {
    info!("Connectivity restored");
    mark_online(ctx, platform);
    ctx.sync_data().await
}

/// Gone offline. Makes no network calls.
pub fn on_offline(ctx: &DataContext) {
    info!("Connectivity lost");
    ctx.update_app_data(AppDataPatch {
        is_online: Some(false),
        network_status: Some(NetworkStatus::Offline),
        ..AppDataPatch::default()
    });
}

/// Resolve the location permission once per session.
///
/// Does nothing unless the permission is still `prompt`. A policy denial is
/// recorded without asking for a position. Concurrent callers wait for the
/// first one and share its answer.
pub async fn resolve_location(ctx: &DataContext, platform: &dyn Platform) -> LocationPermission {
    let _resolving = ctx.lock_location().await;
    let current = ctx.app_data().location_permission;
    if current != LocationPermission::Prompt {
        return current;
    }

    if platform.location_permission_policy().await == Some(LocationPermission::Denied) {
        debug!("Location denied by policy");
        ctx.update_app_data(AppDataPatch {
            location_permission: Some(LocationPermission::Denied),
            ..AppDataPatch::default()
        });
        return LocationPermission::Denied;
    }

    match platform.current_position().await {
        Ok(position) => {
            debug!(lat = position.lat, lng = position.lng, "Location acquired");
            ctx.update_app_data(AppDataPatch {
                location: Some(Some(position)),
                location_permission: Some(LocationPermission::Granted),
                ..AppDataPatch::default()
            });
            LocationPermission::Granted
        }
        Err(e) => {
            debug!(error = %e, "Location unavailable");
            ctx.update_app_data(AppDataPatch {
                location_permission: Some(LocationPermission::Denied),
                ..AppDataPatch::default()
            });
            LocationPermission::Denied
        }
    }
}

/// Copy the platform's notification permission. Never requests it.
pub fn mirror_notification_permission(ctx: &DataContext, platform: &dyn Platform) {
    ctx.update_app_data(AppDataPatch {
        notification_permission: Some(platform.notification_permission()),
        ..AppDataPatch::default()
    });
}

/// Startup pass: connectivity, notification permission, then location.
pub async fn initialize(ctx: &DataContext, platform: &dyn Platform) {
    let online = platform.is_online();
    let status = network_status_for(online, platform.effective_connection_type().as_deref());
    ctx.update_app_data(AppDataPatch {
        is_online: Some(online),
        network_status: Some(status),
        ..AppDataPatch::default()
    });
    mirror_notification_permission(ctx, platform);
    resolve_location(ctx, platform).await;
}

/// Apply connectivity events until the channel closes or `cancel` fires.
/// Each `Online` event spawns a catch-up sync.
pub fn spawn_connectivity_watcher(
    ctx: Arc<DataContext>,
    platform: Arc<dyn Platform>,
    mut events: mpsc::Receiver<ConnectivityEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Some(ConnectivityEvent::Online) => {
                    info!("Connectivity restored");
                    mark_online(&ctx, platform.as_ref());
                    let ctx = ctx.clone();
                    tokio::spawn(async move {
                        ctx.sync_data().await;
                    });
                }
                Some(ConnectivityEvent::Offline) => on_offline(&ctx),
                None => break,
            }
        }
        debug!("Connectivity watcher stopped");
    })
}
