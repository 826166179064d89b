//! Heal scanner (§4.5): a periodic tick that walks every container flagged
//! `restart_loop` and downgrades it to healed once the restart window has
//! lapsed. This is the only place a restart loop exits to healed — STARTED
//! alone never clears a persisted loop for an auto-restarting container
//! (§9 Design Notes).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::broadcast::Broadcaster;
use crate::error::Result;
use crate::notify::Notifier;
use crate::store::Store;
use crate::tracker::RestartTracker;
use crate::types::{Alert, Severity, UpdateRecord};

pub const HEAL_TICK_INTERVAL: Duration = Duration::from_secs(30);

pub struct HealScanner {
    store: Arc<Store>,
    tracker: Arc<std::sync::Mutex<RestartTracker>>,
    broadcaster: Arc<Broadcaster>,
    notifier: Option<Arc<Notifier>>,
    window: Duration,
}

impl HealScanner {
    pub fn new(
        store: Arc<Store>,
        tracker: Arc<std::sync::Mutex<RestartTracker>>,
        broadcaster: Arc<Broadcaster>,
        notifier: Option<Arc<Notifier>>,
        window: Duration,
    ) -> Self {
        Self {
            store,
            tracker,
            broadcaster,
            notifier,
            window,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(HEAL_TICK_INTERVAL);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("heal scanner stopping on cancellation");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.scan_once().await {
                        error!(error = %e, "heal scan failed");
                    }
                }
            }
        }
    }

    /// One pass over every currently-looping, currently-running container.
    /// Public so tests and a one-shot CLI invocation can drive it directly.
    pub async fn scan_once(&self) -> Result<()> {
        let candidates = self.store.list_restart_loop_candidates()?;
        for mut container in candidates {
            if container.status != "running" {
                continue;
            }

            let last_restart = self.store.get_latest_restart_timestamp_by_container_pk(container.id)?;
            let window = chrono::Duration::from_std(self.window).unwrap_or_default();
            let past_window = match last_restart {
                Some(ts) => Utc::now().signed_duration_since(ts) > window,
                None => true,
            };

            if past_window {
                let previous_streak = container.restart_streak;
                container.restart_loop = false;
                container.restart_streak = 0;
                container.restart_loop_since = None;
                self.store.upsert_container(container.clone())?;
                self.tracker.lock().expect("tracker lock poisoned").mark_healed(&container.name);

                let message = if previous_streak > 0 {
                    format!("Healed after {previous_streak} restarts")
                } else {
                    "Restart loop healed".to_string()
                };
                let alert = Alert {
                    container_pk: container.id,
                    container: container.name.clone(),
                    container_id: container.container_id.clone(),
                    kind: "restart_healed".to_string(),
                    message,
                    timestamp: Utc::now(),
                    severity: Severity::Green,
                    details: Some(serde_json::json!({ "restart_count": previous_streak })),
                    ..Default::default()
                };
                let id = self.store.add_alert(alert.clone())?;
                let mut alert = alert;
                alert.id = id;

                if let Some(notifier) = &self.notifier {
                    notifier.notify(&alert).await;
                }

                debug!(container = %container.name, "restart loop healed");
                let record = UpdateRecord {
                    container_event_total: Some(self.store.count_events_by_container(&container.name)?),
                    event_total: Some(self.store.count_all_events()?),
                    alert_total: Some(self.store.count_all_alerts()?),
                    container,
                    event: None,
                    alert: Some(alert),
                };
                let payload = serde_json::to_vec(&record)?;
                self.broadcaster.broadcast(payload).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Container;

    fn looping_container(name: &str) -> Container {
        Container {
            name: name.to_string(),
            present: true,
            status: "running".to_string(),
            restart_loop: true,
            restart_streak: 3,
            restart_loop_since: Some(Utc::now() - chrono::Duration::minutes(10)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn heals_a_loop_with_no_recent_restart() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.upsert_container(looping_container("web")).unwrap();

        let tracker = Arc::new(std::sync::Mutex::new(RestartTracker::new(Duration::from_secs(300), 3)));
        let broadcaster = Arc::new(Broadcaster::new());
        let scanner = HealScanner::new(store.clone(), tracker, broadcaster, None, Duration::from_secs(300));

        scanner.scan_once().await.unwrap();

        let c = store.get_container("web").unwrap();
        assert!(!c.restart_loop);
        assert_eq!(c.restart_streak, 0);

        let alerts = store.list_all_alerts(0, 10).unwrap();
        assert!(alerts.items.iter().any(|a| a.kind == "restart_healed"));
    }

    #[tokio::test]
    async fn does_not_heal_while_restarts_are_recent() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let pk = store.upsert_container(looping_container("web")).unwrap();
        store
            .add_event(crate::types::Event {
                container_pk: pk,
                container: "web".to_string(),
                kind: "restart".to_string(),
                timestamp: Utc::now(),
                ..Default::default()
            })
            .unwrap();

        let tracker = Arc::new(std::sync::Mutex::new(RestartTracker::new(Duration::from_secs(300), 3)));
        let broadcaster = Arc::new(Broadcaster::new());
        let scanner = HealScanner::new(store.clone(), tracker, broadcaster, None, Duration::from_secs(300));

        scanner.scan_once().await.unwrap();

        let c = store.get_container("web").unwrap();
        assert!(c.restart_loop);
    }

    #[tokio::test]
    async fn ignores_non_running_containers() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut c = looping_container("web");
        c.status = "exited".to_string();
        store.upsert_container(c).unwrap();

        let tracker = Arc::new(std::sync::Mutex::new(RestartTracker::new(Duration::from_secs(300), 3)));
        let broadcaster = Arc::new(Broadcaster::new());
        let scanner = HealScanner::new(store.clone(), tracker, broadcaster, None, Duration::from_secs(300));

        scanner.scan_once().await.unwrap();

        let c = store.get_container("web").unwrap();
        assert!(c.restart_loop);
    }
}
