use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a derived alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Red,
    Green,
    Blue,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Red
    }
}

/// A container's operational role, as reported by the engine's labels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Service,
    Task,
}

impl Default for Role {
    fn default() -> Self {
        Role::Task
    }
}

/// Health status as reported by the engine's health checker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    #[default]
    #[serde(rename = "")]
    None,
    Starting,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn from_engine_token(s: &str) -> Self {
        match s {
            "starting" => HealthStatus::Starting,
            "healthy" => HealthStatus::Healthy,
            "unhealthy" => HealthStatus::Unhealthy,
            _ => HealthStatus::None,
        }
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy)
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Healthcheck descriptor, carried through from inspect when configured.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Healthcheck {
    pub test: Vec<String>,
    pub interval_ns: i64,
    pub timeout_ns: i64,
    pub start_period_ns: i64,
    pub start_interval_ns: i64,
    pub retries: i64,
}

/// The durable row for a single observed container (§3 Container).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Container {
    pub id: i64,
    pub name: String,
    pub container_id: String,

    pub image: String,
    pub image_tag: String,
    pub image_id: String,

    pub created_at: Option<DateTime<Utc>>,
    pub registered_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,

    pub status: String,
    pub role: Role,
    pub user: String,
    pub caps: Vec<String>,
    pub read_only: bool,
    pub no_new_privileges: bool,

    pub health_status: HealthStatus,
    pub health_failing_streak: i64,
    pub unhealthy_since: Option<DateTime<Utc>>,

    pub restart_loop: bool,
    pub restart_streak: i64,
    pub restart_loop_since: Option<DateTime<Utc>>,

    pub present: bool,

    pub last_event_id: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub healthcheck: Option<Healthcheck>,

    /// Some(name) when an auto-restart policy is configured and its name isn't "no".
    pub auto_restart_policy: Option<String>,
}

impl Container {
    pub fn has_auto_restart(&self) -> bool {
        matches!(self.auto_restart_policy.as_deref(), Some(name) if !name.is_empty() && name != "no")
    }
}

/// An append-only informational event row (§3 Event).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub container_pk: i64,
    pub container: String,
    pub container_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub old_image: Option<String>,
    pub new_image: Option<String>,
    pub old_image_id: Option<String>,
    pub new_image_id: Option<String>,
    pub old_image_tag: Option<String>,
    pub new_image_tag: Option<String>,
    pub reason: Option<String>,
    pub exit_code: Option<i64>,
    pub details: Option<serde_json::Value>,
}

/// A derived alert row (§3 Alert) — same shape as Event plus severity.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub container_pk: i64,
    pub container: String,
    pub container_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub details: Option<serde_json::Value>,
}

/// A page of rows plus the exact total count, the shape every list endpoint returns.
#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// The discriminated payload pushed to every connected dashboard (§4.6).
#[derive(Clone, Debug, Serialize)]
pub struct UpdateRecord {
    pub container: Container,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_event_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_total: Option<i64>,
}

/// What the common inspect step (§4.4) resolves from the engine, prior to
/// being merged onto a cached `Container` row.
#[derive(Clone, Debug, Default)]
pub struct InspectSnapshot {
    pub container_id: String,
    pub image: String,
    pub image_tag: String,
    pub image_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub status: String,
    pub role: Role,
    pub user: String,
    pub caps: Vec<String>,
    pub read_only: bool,
    pub no_new_privileges: bool,
    pub health_status: HealthStatus,
    pub health_failing_streak: i64,
    pub healthcheck: Option<Healthcheck>,
    pub auto_restart_policy: Option<String>,
}
