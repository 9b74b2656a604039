use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, FixedOffset, Offset, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::directory::Directory;
use crate::engine::actions::{ActionExecutor, Notifier, TracingGateway, TracingNotifier, WorkOrderGateway};
use crate::engine::eta::{EtaEngine, HeuristicEstimator, TrafficProfile};
use crate::engine::geofence::GeofenceEngine;
use crate::engine::location_store::LocationStore;
use crate::engine::tracking_link::TrackingLinkService;
use crate::models::geofence::GeofenceEvent;
use crate::models::location::TechnicianLocation;
use crate::observability::metrics::Metrics;

/// Pushed to `/ws` subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TrackingEvent {
    LocationUpdated(TechnicianLocation),
    GeofenceTransition(GeofenceEvent),
}

pub struct AppState {
    pub config: Config,
    pub directory: Directory,
    pub locations: LocationStore,
    pub geofences: GeofenceEngine,
    pub eta: EtaEngine,
    pub links: TrackingLinkService,
    pub actions: ActionExecutor,
    pub events_tx: broadcast::Sender<TrackingEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_collaborators(config, Arc::new(TracingNotifier), Arc::new(TracingGateway))
    }

    pub fn with_collaborators(
        config: &Config,
        notifier: Arc<dyn Notifier>,
        gateway: Arc<dyn WorkOrderGateway>,
    ) -> Self {
        let local_offset = local_offset(config.local_utc_offset_hours);
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size.max(1));

        Self {
            config: config.clone(),
            directory: Directory::new(),
            locations: LocationStore::new(
                local_offset,
                ChronoDuration::seconds(config.stale_after_secs),
            ),
            geofences: GeofenceEngine::new(local_offset),
            eta: EtaEngine::new(
                Arc::new(HeuristicEstimator::new(TrafficProfile::new(local_offset))),
                ChronoDuration::seconds(config.eta_cache_secs),
                config.fallback_destination,
            ),
            links: TrackingLinkService::new(config.tracking_link_default_hours),
            actions: ActionExecutor::new(
                notifier,
                gateway,
                Duration::from_millis(config.action_timeout_ms),
            ),
            events_tx,
            metrics: Metrics::new(),
        }
    }
}

fn local_offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}
