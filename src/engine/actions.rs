use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::geofence::{ActionResult, Geofence, GeofenceAction, GeofenceEventType};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DispatchAlert,
    CustomerArrival,
    EtaUpdate,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "to", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Dispatch,
    Customer(Uuid),
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: Recipient,
    pub technician_id: Uuid,
    pub job_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    ClockIn,
    ClockOut,
    StartJob,
    CompleteJob,
}

/// Request handed to the work-order service. The tracking core never
/// changes job records itself.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleRequest {
    pub kind: LifecycleKind,
    pub technician_id: Uuid,
    pub job_id: Option<Uuid>,
    pub geofence_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError>;
}

#[async_trait]
pub trait WorkOrderGateway: Send + Sync {
    async fn submit(&self, request: &LifecycleRequest) -> Result<(), AppError>;
}

pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError> {
        info!(
            kind = ?notification.kind,
            recipient = ?notification.recipient,
            technician_id = %notification.technician_id,
            job_id = ?notification.job_id,
            message = %notification.message,
            "notification dispatched"
        );
        Ok(())
    }
}

pub struct TracingGateway;

#[async_trait]
impl WorkOrderGateway for TracingGateway {
    async fn submit(&self, request: &LifecycleRequest) -> Result<(), AppError> {
        info!(
            kind = ?request.kind,
            technician_id = %request.technician_id,
            job_id = ?request.job_id,
            geofence_id = %request.geofence_id,
            "lifecycle request submitted"
        );
        Ok(())
    }
}

/// Everything an action needs to know about the transition that fired it.
pub struct ActionContext<'a> {
    pub geofence: &'a Geofence,
    pub event_type: GeofenceEventType,
    pub technician_id: Uuid,
    pub job_id: Option<Uuid>,
    /// Customer of the technician's current job, when known.
    pub job_customer_id: Option<Uuid>,
    pub position: GeoPoint,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub result: ActionResult,
    pub detail: Option<String>,
}

impl ActionOutcome {
    fn success() -> Self {
        Self {
            result: ActionResult::Success,
            detail: None,
        }
    }

    fn skipped(detail: &str) -> Self {
        Self {
            result: ActionResult::Skipped,
            detail: Some(detail.to_string()),
        }
    }

    fn failed(detail: String) -> Self {
        Self {
            result: ActionResult::Failed,
            detail: Some(detail),
        }
    }
}

#[derive(Clone)]
pub struct ActionExecutor {
    notifier: Arc<dyn Notifier>,
    gateway: Arc<dyn WorkOrderGateway>,
    timeout: Duration,
}

impl ActionExecutor {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        gateway: Arc<dyn WorkOrderGateway>,
        timeout: Duration,
    ) -> Self {
        Self {
            notifier,
            gateway,
            timeout,
        }
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs the configured action. Never returns an error: failures and
    /// timeouts are folded into the outcome so the event is still recorded.
    pub async fn execute(&self, action: GeofenceAction, ctx: &ActionContext<'_>) -> ActionOutcome {
        let job_id = ctx.job_id.or(ctx.geofence.job_id);

        let call = match action {
            GeofenceAction::LogOnly => {
                info!(
                    geofence_id = %ctx.geofence.id,
                    technician_id = %ctx.technician_id,
                    event_type = ctx.event_type.as_str(),
                    lat = ctx.position.lat,
                    lng = ctx.position.lng,
                    "geofence transition"
                );
                return ActionOutcome::success();
            }
            GeofenceAction::NotifyDispatch => Call::Notify(Notification {
                kind: NotificationKind::DispatchAlert,
                recipient: Recipient::Dispatch,
                technician_id: ctx.technician_id,
                job_id,
                message: format!(
                    "technician {} {} {}",
                    ctx.technician_id,
                    transition_verb(ctx.event_type),
                    ctx.geofence.name
                ),
            }),
            GeofenceAction::NotifyCustomer => {
                let Some(customer_id) = ctx.geofence.customer_id.or(ctx.job_customer_id) else {
                    return ActionOutcome::skipped("no customer to notify");
                };
                Call::Notify(Notification {
                    kind: NotificationKind::CustomerArrival,
                    recipient: Recipient::Customer(customer_id),
                    technician_id: ctx.technician_id,
                    job_id,
                    message: match ctx.event_type {
                        GeofenceEventType::Entry => "Your technician has arrived.".to_string(),
                        GeofenceEventType::Exit => "Your technician has left the site.".to_string(),
                    },
                })
            }
            GeofenceAction::ClockIn => Call::Submit(self.lifecycle(LifecycleKind::ClockIn, ctx, job_id)),
            GeofenceAction::ClockOut => Call::Submit(self.lifecycle(LifecycleKind::ClockOut, ctx, job_id)),
            GeofenceAction::StartJob | GeofenceAction::CompleteJob => {
                if job_id.is_none() {
                    return ActionOutcome::skipped("no job associated with transition");
                }
                let kind = if action == GeofenceAction::StartJob {
                    LifecycleKind::StartJob
                } else {
                    LifecycleKind::CompleteJob
                };
                Call::Submit(self.lifecycle(kind, ctx, job_id))
            }
        };

        let result = match call {
            Call::Notify(notification) => {
                tokio::time::timeout(self.timeout, self.notifier.notify(&notification)).await
            }
            Call::Submit(request) => {
                tokio::time::timeout(self.timeout, self.gateway.submit(&request)).await
            }
        };

        match result {
            Ok(Ok(())) => ActionOutcome::success(),
            Ok(Err(err)) => {
                let detail = match err {
                    AppError::ActionFailed(msg) => msg,
                    other => other.to_string(),
                };
                warn!(
                    geofence_id = %ctx.geofence.id,
                    technician_id = %ctx.technician_id,
                    action = %action,
                    error = %detail,
                    "geofence action failed"
                );
                ActionOutcome::failed(detail)
            }
            Err(_) => {
                warn!(
                    geofence_id = %ctx.geofence.id,
                    technician_id = %ctx.technician_id,
                    action = %action,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "geofence action timed out"
                );
                ActionOutcome::failed(format!(
                    "{action} timed out after {}ms",
                    self.timeout.as_millis()
                ))
            }
        }
    }

    fn lifecycle(&self, kind: LifecycleKind, ctx: &ActionContext<'_>, job_id: Option<Uuid>) -> LifecycleRequest {
        LifecycleRequest {
            kind,
            technician_id: ctx.technician_id,
            job_id,
            geofence_id: ctx.geofence.id,
            occurred_at: ctx.occurred_at,
        }
    }
}

enum Call {
    Notify(Notification),
    Submit(LifecycleRequest),
}

fn transition_verb(event_type: GeofenceEventType) -> &'static str {
    match event_type {
        GeofenceEventType::Entry => "entered",
        GeofenceEventType::Exit => "left",
    }
}
