//! Startup reconciliation (§4.7): runs once after `Store::open`/`load`,
//! before the reducer starts consuming the live event stream. Lists every
//! container the engine currently knows about, seeds the store, restores
//! restart-loop/health carry-over from persisted alerts, and marks anything
//! tracked-but-missing absent.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::engine::EngineClient;
use crate::error::Result;
use crate::store::Store;
use crate::tracker::RestartTracker;
use crate::types::Container;

pub async fn reconcile(
    engine: &dyn EngineClient,
    store: &Store,
    tracker: &Arc<StdMutex<RestartTracker>>,
    restart_window: Duration,
) -> Result<()> {
    let refs = engine.list().await?;
    let mut present_names = HashSet::new();

    for engine_ref in refs {
        let name = match engine_ref.names.first() {
            Some(n) => n.clone(),
            None => continue,
        };
        present_names.insert(name.clone());

        let cached = store.get_container(&name);
        let snap = match engine.inspect(&engine_ref.id).await {
            Ok(Some(s)) => Some(s),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, name = %name, "reconcile inspect failed, seeding from cache only");
                None
            }
        };

        let mut container = cached.clone().unwrap_or_default();
        container.name = name.clone();
        if let Some(s) = &snap {
            container.container_id = s.container_id.clone();
            container.image = s.image.clone();
            container.image_tag = s.image_tag.clone();
            container.image_id = s.image_id.clone();
            container.created_at = s.created_at.or(container.created_at);
            container.started_at = s.started_at.or(container.started_at);
            container.status = s.status.clone();
            container.role = s.role.clone();
            container.user = s.user.clone();
            container.caps = s.caps.clone();
            container.read_only = s.read_only;
            container.no_new_privileges = s.no_new_privileges;
            container.health_status = s.health_status.clone();
            container.health_failing_streak = s.health_failing_streak;
            container.healthcheck = s.healthcheck.clone();
            container.auto_restart_policy = s.auto_restart_policy.clone();
        }
        // registered_at and unhealthy_since carry forward untouched from the
        // cached row (already the default behavior of cloning `cached` as
        // the base); `upsert_container` additionally preserves
        // `registered_at` across a conflict on its own.

        let pk = store.upsert_container(container)?;

        if let Some(container) = store.find_container_by_id(pk) {
            if container.has_auto_restart() {
                restore_loop_state(store, tracker, &container, restart_window)?;
            }
        }
    }

    store.mark_absent_except(&present_names)?;
    debug!(count = present_names.len(), "startup reconciliation complete");
    Ok(())
}

/// Step 3 of §4.7: consult the latest restart-loop alert to restore
/// `restart_loop`/`restart_streak`, or confirm it's already healed if the
/// container has been running quietly since before the restart window.
fn restore_loop_state(
    store: &Store,
    tracker: &Arc<StdMutex<RestartTracker>>,
    container: &Container,
    restart_window: Duration,
) -> Result<()> {
    let latest = store.get_latest_restart_loop_alert_by_container_pk(container.id)?;

    let mut restored = container.clone();
    match latest.as_ref().map(|a| a.kind.as_str()) {
        Some("restart_loop") => {
            let restart_count = latest
                .as_ref()
                .and_then(|a| a.details.as_ref())
                .and_then(|d| d.get("restart_count"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            restored.restart_loop = true;
            restored.restart_streak = restart_count;
            restored.restart_loop_since = restored.restart_loop_since.or(Some(Utc::now()));
            tracker.lock().expect("tracker lock poisoned").seed_in_loop(&container.name);
        }
        Some("restart_healed") | None => {
            restored.restart_loop = false;
            restored.restart_streak = 0;
            restored.restart_loop_since = None;
        }
        _ => {}
    }

    let window = chrono::Duration::from_std(restart_window).unwrap_or_default();
    let running_quietly = restored.status == "running"
        && restored
            .started_at
            .map(|started| Utc::now().signed_duration_since(started) > window)
            .unwrap_or(false);

    if restored.restart_loop && running_quietly {
        restored.restart_loop = false;
        restored.restart_streak = 0;
        restored.restart_loop_since = None;
        tracker.lock().expect("tracker lock poisoned").reset(&container.name);
    }

    if restored.restart_loop != container.restart_loop
        || restored.restart_streak != container.restart_streak
        || restored.restart_loop_since != container.restart_loop_since
    {
        store.upsert_container(restored)?;
    }
    Ok(())
}
