use async_trait::async_trait;
use bollard::query_parameters::{EventsOptions, InspectContainerOptions, ListContainersOptions};
use bollard::Docker;
use chrono::{DateTime, Utc};
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::pin::Pin;
use tracing::{debug, warn};

use crate::error::{HealthmonError, Result};
use crate::types::{Healthcheck, HealthStatus, InspectSnapshot, Role};

use super::{EngineClient, EngineContainerRef, EngineMessage};

/// The default capability set every container gets unless `cap_drop`
/// removes it; `cap_add` adds on top. Mirrors the Linux container runtime's
/// well-known default bounding set.
const DEFAULT_CAPS: &[&str] = &[
    "CHOWN",
    "DAC_OVERRIDE",
    "FSETID",
    "FOWNER",
    "MKNOD",
    "NET_RAW",
    "SETGID",
    "SETUID",
    "SETFCAP",
    "SETPCAP",
    "NET_BIND_SERVICE",
    "SYS_CHROOT",
    "KILL",
    "AUDIT_WRITE",
];

/// Concrete `EngineClient` backed by a live Docker-compatible engine socket
/// (`Docker::connect_with_local_defaults`, `bollard::query_parameters`).
pub struct BollardEngine {
    docker: Docker,
    events: Pin<Box<dyn futures_util::Stream<Item = bollard::errors::Result<bollard::models::EventMessage>> + Send>>,
}

impl BollardEngine {
    pub fn connect(host: &str) -> Result<Self> {
        let docker = connect(host)?;
        let events = build_event_stream(&docker);
        Ok(Self { docker, events })
    }

    fn reconnect_events(&mut self) {
        self.events = build_event_stream(&self.docker);
    }
}

fn connect(host: &str) -> Result<Docker> {
    let docker = if host == "local" || host.is_empty() {
        Docker::connect_with_local_defaults()
    } else if host.starts_with("unix://") {
        Docker::connect_with_socket(host.trim_start_matches("unix://"), 120, bollard::API_DEFAULT_VERSION)
    } else if host.starts_with("tcp://") || host.starts_with("http://") {
        Docker::connect_with_http(host, 120, bollard::API_DEFAULT_VERSION)
    } else {
        Docker::connect_with_local_defaults()
    };
    docker.map_err(|e| HealthmonError::EngineStream(e.to_string()))
}

fn build_event_stream(
    docker: &Docker,
) -> Pin<Box<dyn futures_util::Stream<Item = bollard::errors::Result<bollard::models::EventMessage>> + Send>> {
    let mut filters = HashMap::new();
    filters.insert("type".to_string(), vec!["container".to_string()]);
    let options = EventsOptions {
        filters: Some(filters),
        ..Default::default()
    };
    Box::pin(docker.events(Some(options)))
}

#[async_trait]
impl EngineClient for BollardEngine {
    async fn next_event(&mut self) -> Option<Result<EngineMessage>> {
        match self.events.next().await {
            Some(Ok(event)) => Some(Ok(to_engine_message(event))),
            Some(Err(e)) => {
                warn!(error = %e, "engine event stream error, will reconnect on next poll");
                self.reconnect_events();
                Some(Err(HealthmonError::EngineStream(e.to_string())))
            }
            None => None,
        }
    }

    async fn list(&self) -> Result<Vec<EngineContainerRef>> {
        let options = Some(ListContainersOptions {
            all: true,
            ..Default::default()
        });
        let containers = self
            .docker
            .list_containers(options)
            .await
            .map_err(|e| HealthmonError::EngineStream(e.to_string()))?;

        Ok(containers
            .into_iter()
            .map(|c| EngineContainerRef {
                id: c.id.unwrap_or_default(),
                names: c
                    .names
                    .unwrap_or_default()
                    .into_iter()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .collect(),
            })
            .collect())
    }

    async fn inspect(&self, id: &str) -> Result<Option<InspectSnapshot>> {
        match self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
        {
            Ok(inspect) => Ok(Some(to_snapshot(inspect))),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                Ok(None)
            }
            Err(e) => Err(HealthmonError::Inspect {
                id: id.to_string(),
                source: e,
            }),
        }
    }
}

fn to_engine_message(event: bollard::models::EventMessage) -> EngineMessage {
    let message_type = event
        .typ
        .map(|t| format!("{t:?}").to_lowercase())
        .unwrap_or_default();
    let action = event.action.unwrap_or_default();
    let (actor_id, attributes) = match event.actor {
        Some(actor) => (actor.id.unwrap_or_default(), actor.attributes.unwrap_or_default()),
        None => (String::new(), HashMap::new()),
    };
    let time = event
        .time
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

    debug!(action = %action, actor_id = %actor_id, "engine event observed");

    EngineMessage {
        message_type,
        action,
        actor_id,
        attributes,
        time,
    }
}

fn to_snapshot(inspect: bollard::models::ContainerInspectResponse) -> InspectSnapshot {
    let state = inspect.state.unwrap_or_default();
    let host_config = inspect.host_config.unwrap_or_default();
    let config = inspect.config.unwrap_or_default();

    let image_ref = config.image.clone().unwrap_or_default();
    let (image, image_tag) = split_image_ref(&image_ref);

    let cap_add: Vec<String> = host_config.cap_add.unwrap_or_default();
    let cap_drop: Vec<String> = host_config.cap_drop.unwrap_or_default();
    let mut caps: Vec<String> = DEFAULT_CAPS
        .iter()
        .map(|s| s.to_string())
        .filter(|c| !cap_drop.iter().any(|d| d.eq_ignore_ascii_case(c) || d == "ALL"))
        .collect();
    for add in cap_add {
        if !caps.iter().any(|c| c.eq_ignore_ascii_case(&add)) {
            caps.push(add);
        }
    }
    caps.sort();

    let no_new_privileges = host_config
        .security_opt
        .unwrap_or_default()
        .iter()
        .any(|opt| opt.starts_with("no-new-privileges"));

    let health = state.health;
    let health_status = health
        .as_ref()
        .and_then(|h| h.status.as_ref())
        .map(|s| HealthStatus::from_engine_token(&format!("{s:?}").to_lowercase()))
        .unwrap_or_default();
    let health_failing_streak = health.as_ref().and_then(|h| h.failing_streak).unwrap_or(0);

    let healthcheck = config.healthcheck.map(|hc| Healthcheck {
        test: hc.test.unwrap_or_default(),
        interval_ns: hc.interval.unwrap_or(0),
        timeout_ns: hc.timeout.unwrap_or(0),
        start_period_ns: hc.start_period.unwrap_or(0),
        start_interval_ns: hc.start_interval.unwrap_or(0),
        retries: hc.retries.unwrap_or(0),
    });

    let auto_restart_policy = host_config
        .restart_policy
        .and_then(|rp| rp.name)
        .map(|n| format!("{n:?}").to_lowercase());

    let role = if config
        .labels
        .unwrap_or_default()
        .get("healthmon.role")
        .map(|v| v == "service")
        .unwrap_or(true)
    {
        Role::Service
    } else {
        Role::Task
    };

    InspectSnapshot {
        container_id: inspect.id.unwrap_or_default(),
        image,
        image_tag,
        image_id: inspect.image.unwrap_or_default(),
        created_at: inspect.created.as_deref().and_then(parse_rfc3339),
        started_at: state.started_at.as_deref().and_then(parse_rfc3339),
        status: state
            .status
            .map(|s| format!("{s:?}").to_lowercase())
            .unwrap_or_default(),
        role,
        user: config.user.unwrap_or_default(),
        caps,
        read_only: host_config.readonly_rootfs.unwrap_or(false),
        no_new_privileges,
        health_status,
        health_failing_streak,
        healthcheck,
        auto_restart_policy,
    }
}

fn split_image_ref(image_ref: &str) -> (String, String) {
    // image refs that are already resolved to a digest carry no tag to split.
    if image_ref.contains('@') {
        return (image_ref.to_string(), String::new());
    }
    match image_ref.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo.to_string(), tag.to_string()),
        _ => (image_ref.to_string(), "latest".to_string()),
    }
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|dt| dt.timestamp() > 0)
}
