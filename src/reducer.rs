//! State reducer / dispatcher (§4.4): the single-threaded consumer of
//! classified actions. Every store write and every broadcast record in the
//! system passes through here — the reducer is the only writer, matching
//! the store's single-writer discipline (§5).

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcaster;
use crate::classifier::{classify, Action, RestartReason};
use crate::engine::EngineClient;
use crate::error::{HealthmonError, Result};
use crate::notify::Notifier;
use crate::store::Store;
use crate::tracker::RestartTracker;
use crate::types::{Alert, Container, Event, HealthStatus, InspectSnapshot, Severity, UpdateRecord};

pub struct Reducer {
    engine: Box<dyn EngineClient>,
    store: Arc<Store>,
    tracker: Arc<StdMutex<RestartTracker>>,
    broadcaster: Arc<Broadcaster>,
    notifier: Option<Arc<Notifier>>,
}

impl Reducer {
    /// `tracker` is shared with the heal scanner (§4.5 and §4.2 share the
    /// same in-memory series); both take the same `Arc`.
    pub fn new(
        engine: Box<dyn EngineClient>,
        store: Arc<Store>,
        tracker: Arc<StdMutex<RestartTracker>>,
        broadcaster: Arc<Broadcaster>,
        notifier: Option<Arc<Notifier>>,
    ) -> Self {
        Self {
            engine,
            store,
            tracker,
            broadcaster,
            notifier,
        }
    }

    /// Consume the engine's event stream until cancelled or the stream
    /// fails. A stream failure is returned to the caller per §7: the
    /// process-level supervisor is responsible for cancelling the other
    /// tasks and exiting.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("reducer stopping on cancellation");
                    return Ok(());
                }
                next = self.engine.next_event() => {
                    match next {
                        None => {
                            warn!("engine event stream ended");
                            return Err(HealthmonError::EngineStream("event stream closed".to_string()));
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "engine event stream failed");
                            return Err(e);
                        }
                        Some(Ok(msg)) => {
                            if let Err(e) = self.dispatch(msg).await {
                                error!(error = %e, "failed to apply engine event, continuing");
                            }
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(&self, msg: crate::engine::EngineMessage) -> Result<()> {
        let resolved_name = if msg.attr("name").is_none() && !msg.actor_id.is_empty() {
            self.store.get_container_by_container_id(&msg.actor_id).map(|c| c.name)
        } else {
            None
        };
        let action = classify(&msg, resolved_name.as_deref());

        match action {
            Action::Created { name, id } => self.handle_created(name, id).await,
            Action::Started { name, id } => self.handle_started(name, id).await,
            Action::Stopped { name, id, exit_code } => self.handle_stopped(name, id, exit_code).await,
            Action::RestartLike { name, id, reason, exit_code, signal } => {
                self.handle_restart_like(name, id, reason, exit_code, signal).await
            }
            Action::Signal { name, id, signal } => self.handle_signal(name, id, signal).await,
            Action::Health { name, id, status } => self.handle_health(name, id, status).await,
            Action::Rename { id, old_name, new_name } => self.handle_rename(id, old_name, new_name).await,
            Action::Absent { name } => self.handle_absent(name).await,
            Action::Unresolvable => {
                debug!("dropping message with unresolvable container name");
                Ok(())
            }
            Action::Ignored => Ok(()),
        }
    }

    // ---- CREATED -------------------------------------------------------

    async fn handle_created(&self, name: String, id: String) -> Result<()> {
        let cached = self.store.get_container(&name);
        let snap = self.inspect_opt(&id).await;
        let mut container = merge_snapshot(cached.as_ref(), &name, &id, snap.as_ref());
        if let Some(prev) = &cached {
            container.id = prev.id;
        }

        let now = Utc::now();
        let mut recreate_event = None;
        let mut recreate_alert = None;

        if let Some(prev) = &cached {
            let is_recreate = !prev.container_id.is_empty()
                && !container.container_id.is_empty()
                && prev.container_id != container.container_id;
            if is_recreate {
                let image_changed = prev.image_id != container.image_id || prev.image_tag != container.image_tag;
                if image_changed {
                    recreate_event = Some(Event {
                        kind: "image_changed".to_string(),
                        message: format!("Image changed from {} to {}", prev.image_id, container.image_id),
                        timestamp: now,
                        old_image: Some(prev.image.clone()),
                        new_image: Some(container.image.clone()),
                        old_image_id: Some(prev.image_id.clone()),
                        new_image_id: Some(container.image_id.clone()),
                        old_image_tag: Some(prev.image_tag.clone()),
                        new_image_tag: Some(container.image_tag.clone()),
                        ..Default::default()
                    });
                    recreate_alert = Some(Alert {
                        kind: "image_changed".to_string(),
                        message: "Container image changed on recreate".to_string(),
                        timestamp: now,
                        severity: Severity::Blue,
                        ..Default::default()
                    });
                } else {
                    recreate_event = Some(Event {
                        kind: "recreated".to_string(),
                        message: "Container recreated".to_string(),
                        timestamp: now,
                        ..Default::default()
                    });
                    recreate_alert = Some(Alert {
                        kind: "recreated".to_string(),
                        message: "Container recreated".to_string(),
                        timestamp: now,
                        severity: Severity::Blue,
                        ..Default::default()
                    });
                }
                container.restart_loop = prev.restart_loop;
                container.restart_streak = prev.restart_streak;
                container.restart_loop_since = prev.restart_loop_since;
            }
        }

        let pk = self.upsert_silent(container.clone()).await?;
        if let Some(ev) = recreate_event {
            self.emit_event(pk, &container, ev).await?;
        }
        if let Some(al) = recreate_alert {
            self.emit_alert(pk, &container, al).await?;
        }
        self.emit_event(
            pk,
            &container,
            Event {
                kind: "created".to_string(),
                message: "Container created".to_string(),
                timestamp: now,
                ..Default::default()
            },
        )
        .await
    }

    // ---- STARTED --------------------------------------------------------

    async fn handle_started(&self, name: String, id: String) -> Result<()> {
        let cached = self.store.get_container(&name);
        let snap = self.inspect_opt(&id).await;
        let mut container = merge_snapshot(cached.as_ref(), &name, &id, snap.as_ref());
        if let Some(prev) = &cached {
            container.id = prev.id;
        }

        if !container.has_auto_restart() {
            container.restart_loop = false;
            container.restart_streak = 0;
            container.restart_loop_since = None;
            self.tracker.lock().expect("tracker lock poisoned").reset(&name);
        }
        if container.started_at.is_none() {
            container.started_at = Some(Utc::now());
        }

        let pk = self.upsert_silent(container.clone()).await?;
        self.emit_event(
            pk,
            &container,
            Event {
                kind: "started".to_string(),
                message: "Container started".to_string(),
                timestamp: Utc::now(),
                ..Default::default()
            },
        )
        .await
    }

    // ---- STOPPED ----------------------------------------------------------

    async fn handle_stopped(&self, name: String, id: String, exit_code: Option<i64>) -> Result<()> {
        let cached = self.store.get_container(&name);
        let pk = self.ensure_pk(&cached, &name).await?;
        let now = Utc::now();

        let snap = self.inspect_opt(&id).await;
        let mut container = merge_snapshot(cached.as_ref(), &name, &id, snap.as_ref());
        container.id = pk;
        let has_auto_restart = container.has_auto_restart();
        self.upsert_silent(container.clone()).await?;

        // upsert before emit: `emit_event`/`emit_alert` advance `last_event_id`
        // on the container row directly, so writing the pre-event snapshot
        // afterwards would clobber it back to a stale value (§3 invariant 5).
        self.emit_event(
            pk,
            &container,
            Event {
                kind: "stopped".to_string(),
                message: "Container stopped".to_string(),
                timestamp: now,
                exit_code,
                ..Default::default()
            },
        )
        .await?;

        if let Some(code) = exit_code {
            if code != 0 && !has_auto_restart {
                self.emit_alert(
                    pk,
                    &container,
                    Alert {
                        kind: "failure_no_restart".to_string(),
                        message: format!("Container exited with code {code} and no restart policy"),
                        timestamp: now,
                        severity: Severity::Red,
                        ..Default::default()
                    },
                )
                .await?;
            }
        }
        Ok(())
    }

    // ---- RESTART_LIKE -----------------------------------------------------

    async fn handle_restart_like(
        &self,
        name: String,
        id: String,
        reason: RestartReason,
        exit_code: Option<i64>,
        signal: Option<String>,
    ) -> Result<()> {
        let cached = self.store.get_container(&name);
        let previously_in_loop = cached.as_ref().map(|c| c.restart_loop).unwrap_or(false);
        let prev_restart_streak = cached.as_ref().map(|c| c.restart_streak).unwrap_or(0);

        let snap = self.inspect_opt(&id).await;
        let inspected = snap.is_some();
        let has_auto_restart = snap
            .as_ref()
            .and_then(|s| s.auto_restart_policy.as_deref())
            .map(|p| !p.is_empty() && p != "no")
            .unwrap_or_else(|| cached.as_ref().map(|c| c.has_auto_restart()).unwrap_or(false));

        let now = Utc::now();
        let (streak, entered_loop) = if has_auto_restart {
            self.tracker.lock().expect("tracker lock poisoned").record(&name, now)
        } else {
            self.tracker.lock().expect("tracker lock poisoned").reset(&name);
            (0, false)
        };
        let tracker_in_loop = self.tracker.lock().expect("tracker lock poisoned").in_loop(&name);
        let in_loop_now = has_auto_restart && (tracker_in_loop || previously_in_loop);

        let pk = self.ensure_pk(&cached, &name).await?;

        let mut container = merge_snapshot(cached.as_ref(), &name, &id, snap.as_ref());
        container.id = pk;

        container.restart_streak = if has_auto_restart {
            if entered_loop || prev_restart_streak == 0 {
                streak as i64
            } else {
                prev_restart_streak + 1
            }
        } else {
            0
        };
        if in_loop_now {
            if container.restart_loop_since.is_none() {
                container.restart_loop_since = Some(now);
            }
        } else {
            container.restart_loop_since = None;
        }
        container.restart_loop = in_loop_now;
        if !inspected {
            container.status = "exited".to_string();
        }

        // upsert before emit: `emit_event`/`emit_alert` advance `last_event_id`
        // on the container row directly, so writing this snapshot afterwards
        // would clobber it back to a stale value (§3 invariant 5).
        self.upsert_silent(container.clone()).await?;

        let mut message = format!("Restart event: {}", reason.as_str());
        if let Some(sig) = &signal {
            message.push_str(&format!(" (signal {sig})"));
        }
        self.emit_event(
            pk,
            &container,
            Event {
                kind: "restart".to_string(),
                message,
                timestamp: now,
                reason: Some(reason.as_str().to_string()),
                exit_code,
                ..Default::default()
            },
        )
        .await?;

        if reason == RestartReason::Oom {
            self.emit_alert(
                pk,
                &container,
                Alert {
                    kind: "oom_killed".to_string(),
                    message: "Container was killed by the out-of-memory killer".to_string(),
                    timestamp: now,
                    severity: Severity::Red,
                    ..Default::default()
                },
            )
            .await?;
        }

        if entered_loop && !previously_in_loop {
            self.emit_alert(
                pk,
                &container,
                Alert {
                    kind: "restart_loop".to_string(),
                    message: format!("{streak} restarts in the last window"),
                    timestamp: now,
                    severity: Severity::Red,
                    details: Some(serde_json::json!({ "restart_count": streak })),
                    ..Default::default()
                },
            )
            .await?;
        }

        if inspected {
            if let Some(code) = exit_code {
                if code != 0 && !has_auto_restart && reason != RestartReason::Oom {
                    self.emit_alert(
                        pk,
                        &container,
                        Alert {
                            kind: "failure_no_restart".to_string(),
                            message: format!("Container exited with code {code} and no restart policy"),
                            timestamp: now,
                            severity: Severity::Red,
                            ..Default::default()
                        },
                    )
                    .await?;
                }
            }
        }

        Ok(())
    }

    // ---- SIGNAL -------------------------------------------------------

    async fn handle_signal(&self, name: String, id: String, signal: Option<String>) -> Result<()> {
        let cached = self.store.get_container(&name);
        let snap = self.inspect_opt(&id).await;
        let mut container = merge_snapshot(cached.as_ref(), &name, &id, snap.as_ref());
        if let Some(prev) = &cached {
            container.id = prev.id;
        }
        let pk = self.upsert_silent(container.clone()).await?;

        let (message, reason) = match &signal {
            Some(sig) => (format!("Signal sent: {sig}"), format!("signal_{}", sig.to_lowercase())),
            None => ("Signal sent".to_string(), "signal".to_string()),
        };
        self.emit_event(
            pk,
            &container,
            Event {
                kind: "signal".to_string(),
                message,
                timestamp: Utc::now(),
                reason: Some(reason),
                ..Default::default()
            },
        )
        .await
    }

    // ---- HEALTH -------------------------------------------------------

    async fn handle_health(&self, name: String, id: String, status: String) -> Result<()> {
        let cached = self.store.get_container(&name);
        let prev_status = cached.as_ref().map(|c| c.health_status.clone()).unwrap_or_default();
        let prev_failing_streak = cached.as_ref().map(|c| c.health_failing_streak).unwrap_or(0);

        let snap = self.inspect_opt(&id).await;
        let inspected = snap.is_some();
        let mut container = merge_snapshot(cached.as_ref(), &name, &id, snap.as_ref());
        if let Some(prev) = &cached {
            container.id = prev.id;
        }

        let new_status = if inspected {
            container.health_status.clone()
        } else {
            let token_status = HealthStatus::from_engine_token(&status);
            match token_status {
                HealthStatus::Unhealthy => {
                    container.health_failing_streak = prev_failing_streak + 1;
                    if container.unhealthy_since.is_none() {
                        container.unhealthy_since = Some(Utc::now());
                    }
                }
                HealthStatus::Healthy => {
                    container.health_failing_streak = 0;
                    container.unhealthy_since = None;
                }
                _ => {}
            }
            container.health_status = token_status.clone();
            token_status
        };

        let pk = self.upsert_silent(container.clone()).await?;

        if new_status.is_unhealthy() && !prev_status.is_unhealthy() {
            self.emit_alert(
                pk,
                &container,
                Alert {
                    kind: "unhealthy".to_string(),
                    message: "Container became unhealthy".to_string(),
                    timestamp: Utc::now(),
                    severity: Severity::Red,
                    ..Default::default()
                },
            )
            .await?;
        }
        if new_status.is_healthy() && (prev_status.is_unhealthy() || prev_failing_streak > 0) {
            let message = if prev_failing_streak > 0 {
                format!("Container recovered after {prev_failing_streak} failing health checks")
            } else {
                "Container is healthy".to_string()
            };
            self.emit_alert(
                pk,
                &container,
                Alert {
                    kind: "healthy".to_string(),
                    message,
                    timestamp: Utc::now(),
                    severity: Severity::Green,
                    ..Default::default()
                },
            )
            .await?;
        }
        Ok(())
    }

    // ---- RENAME -------------------------------------------------------

    async fn handle_rename(&self, id: String, old_name: String, new_name: String) -> Result<()> {
        let snap = self.inspect_opt(&id).await;
        let collision = self.store.get_container(&new_name);
        let base = if collision.is_some() {
            collision.clone()
        } else {
            self.store.get_container(&old_name)
        };
        let new_info = merge_snapshot(base.as_ref(), &new_name, &id, snap.as_ref());

        let pk = self.store.rename_container(&old_name, &new_name, new_info)?;

        {
            let mut tracker = self.tracker.lock().expect("tracker lock poisoned");
            tracker.reset(&old_name);
            tracker.reset(&new_name);
        }

        let container = self.store.find_container_by_id(pk).unwrap_or_default();
        self.emit_event(
            pk,
            &container,
            Event {
                kind: "renamed".to_string(),
                message: format!("Container renamed {old_name} -> {new_name}"),
                timestamp: Utc::now(),
                ..Default::default()
            },
        )
        .await
    }

    // ---- ABSENT -------------------------------------------------------

    async fn handle_absent(&self, name: String) -> Result<()> {
        self.store.set_container_present(&name, false)?;
        if let Some(container) = self.store.get_container(&name) {
            self.broadcast_record(container, None, None).await?;
        }
        Ok(())
    }

    // ---- shared primitives -------------------------------------------------------

    async fn inspect_opt(&self, id: &str) -> Option<InspectSnapshot> {
        if id.is_empty() {
            return None;
        }
        match self.engine.inspect(id).await {
            Ok(Some(snap)) => Some(snap),
            Ok(None) => {
                debug!(id, "inspect found no container");
                None
            }
            Err(e) => {
                warn!(error = %e, id, "inspect failed, proceeding with the cached snapshot");
                None
            }
        }
    }

    async fn upsert_silent(&self, container: Container) -> Result<i64> {
        self.store.upsert_container(container)
    }

    /// Returns the surrogate id for `name`, upserting a bare placeholder row
    /// first if this is the first time the reducer has ever seen it (a
    /// stop/restart-like/signal event can race ahead of its creation).
    async fn ensure_pk(&self, cached: &Option<Container>, name: &str) -> Result<i64> {
        match cached {
            Some(c) => Ok(c.id),
            None => {
                self.upsert_silent(Container {
                    name: name.to_string(),
                    present: true,
                    ..Default::default()
                })
                .await
            }
        }
    }

    async fn emit_event(&self, pk: i64, container: &Container, mut ev: Event) -> Result<()> {
        ev.container_pk = pk;
        ev.container = container.name.clone();
        ev.container_id = container.container_id.clone();
        let id = self.store.add_event(ev.clone())?;
        ev.id = id;
        self.broadcast_record(container.clone(), Some(ev), None).await
    }

    async fn emit_alert(&self, pk: i64, container: &Container, mut al: Alert) -> Result<()> {
        al.container_pk = pk;
        al.container = container.name.clone();
        al.container_id = container.container_id.clone();
        let id = self.store.add_alert(al.clone())?;
        al.id = id;
        if let Some(notifier) = &self.notifier {
            notifier.notify(&al).await;
        }
        self.broadcast_record(container.clone(), None, Some(al)).await
    }

    /// Serialize and fan out a single update record (§4.6). Always carries
    /// the container snapshot the reducer just computed (not necessarily
    /// the persisted row, if this fires ahead of the step 10 upsert); at
    /// most one of `event`/`alert`.
    async fn broadcast_record(&self, container: Container, event: Option<Event>, alert: Option<Alert>) -> Result<()> {
        let record = UpdateRecord {
            container_event_total: Some(self.store.count_events_by_container(&container.name)?),
            event_total: Some(self.store.count_all_events()?),
            alert_total: Some(self.store.count_all_alerts()?),
            container,
            event,
            alert,
        };
        let payload = serde_json::to_vec(&record)?;
        self.broadcaster.broadcast(payload).await;
        Ok(())
    }
}

/// The common inspect step (§4.4): merge a freshly-inspected snapshot onto
/// the cached row, preserving `registered_at` always and `started_at` when
/// the new snapshot doesn't report one. `unhealthy_since` is recomputed
/// unconditionally from the merged health status so invariant 4 holds
/// regardless of which action triggered the merge.
fn merge_snapshot(cached: Option<&Container>, name: &str, fallback_container_id: &str, snap: Option<&InspectSnapshot>) -> Container {
    let mut c = cached.cloned().unwrap_or_default();
    c.name = name.to_string();

    match snap {
        Some(s) => {
            c.container_id = s.container_id.clone();
            c.image = s.image.clone();
            c.image_tag = s.image_tag.clone();
            c.image_id = s.image_id.clone();
            if s.created_at.is_some() {
                c.created_at = s.created_at;
            }
            if let Some(started) = s.started_at {
                c.started_at = Some(started);
            }
            c.status = s.status.clone();
            c.role = s.role.clone();
            c.user = s.user.clone();
            c.caps = s.caps.clone();
            c.read_only = s.read_only;
            c.no_new_privileges = s.no_new_privileges;
            c.health_status = s.health_status.clone();
            c.health_failing_streak = s.health_failing_streak;
            c.healthcheck = s.healthcheck.clone();
            c.auto_restart_policy = s.auto_restart_policy.clone();

            if c.health_status.is_unhealthy() {
                if c.unhealthy_since.is_none() {
                    c.unhealthy_since = Some(Utc::now());
                }
            } else {
                c.unhealthy_since = None;
            }
        }
        None => {
            if c.container_id.is_empty() {
                c.container_id = fallback_container_id.to_string();
            }
        }
    }

    c
}
