//! End-to-end scenario tests (spec.md §8 S1-S6). Each drives the public
//! `Reducer`/`HealScanner`/`Store` surface against a small scripted
//! `EngineClient`, the same fake-over-mock style the reducer's own unit
//! tests use, but exercised here across full container lifecycles.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use healthmon::broadcast::Broadcaster;
use healthmon::engine::{EngineClient, EngineContainerRef, EngineMessage};
use healthmon::error::Result;
use healthmon::heal::HealScanner;
use healthmon::reducer::Reducer;
use healthmon::store::Store;
use healthmon::tracker::RestartTracker;
use healthmon::types::InspectSnapshot;

struct ScriptedEngine {
    events: StdMutex<VecDeque<EngineMessage>>,
    snapshots: StdMutex<HashMap<String, InspectSnapshot>>,
}

impl ScriptedEngine {
    fn new(events: Vec<EngineMessage>, snapshots: HashMap<String, InspectSnapshot>) -> Self {
        Self {
            events: StdMutex::new(events.into()),
            snapshots: StdMutex::new(snapshots),
        }
    }

    fn set_snapshot(&self, id: &str, snap: InspectSnapshot) {
        self.snapshots.lock().unwrap().insert(id.to_string(), snap);
    }
}

#[async_trait]
impl EngineClient for ScriptedEngine {
    async fn next_event(&mut self) -> Option<Result<EngineMessage>> {
        self.events.lock().unwrap().pop_front().map(Ok)
    }

    async fn list(&self) -> Result<Vec<EngineContainerRef>> {
        Ok(Vec::new())
    }

    async fn inspect(&self, id: &str) -> Result<Option<InspectSnapshot>> {
        Ok(self.snapshots.lock().unwrap().get(id).cloned())
    }
}

fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn die_msg(actor_id: &str, name: &str, exit_code: &str) -> EngineMessage {
    EngineMessage {
        message_type: "container".to_string(),
        action: "die".to_string(),
        actor_id: actor_id.to_string(),
        attributes: attrs(&[("name", name), ("exitCode", exit_code)]),
        time: None,
    }
}

async fn run_reducer(reducer: Reducer) {
    let cancel = CancellationToken::new();
    reducer.run(cancel).await.unwrap();
}

/// S1 — Restart-loop detection and healing. W=30s, T=3, policy `always`.
/// Three `die(exit=1)` events cross the threshold; once no new restart
/// arrives and the window lapses, the heal scanner flips the container back.
#[tokio::test]
async fn s1_restart_loop_detection_and_healing() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let broadcaster = Arc::new(Broadcaster::new());
    let tracker = Arc::new(StdMutex::new(RestartTracker::new(std::time::Duration::from_secs(30), 3)));

    let mut snapshots = HashMap::new();
    snapshots.insert(
        "c1".to_string(),
        InspectSnapshot {
            status: "running".to_string(),
            auto_restart_policy: Some("always".to_string()),
            ..Default::default()
        },
    );
    let events = vec![
        die_msg("c1", "web", "1"),
        die_msg("c1", "web", "1"),
        die_msg("c1", "web", "1"),
    ];
    let engine: Box<dyn EngineClient> = Box::new(ScriptedEngine::new(events, snapshots));
    let reducer = Reducer::new(engine, store.clone(), tracker.clone(), broadcaster.clone(), None);
    run_reducer(reducer).await;

    let c = store.get_container("web").unwrap();
    assert!(c.restart_loop);
    assert_eq!(c.restart_streak, 3);

    let alerts = store.list_all_alerts(0, 50).unwrap();
    let loop_alert = alerts.items.iter().find(|a| a.kind == "restart_loop").unwrap();
    assert_eq!(
        loop_alert.details.as_ref().and_then(|d| d.get("restart_count")).and_then(|v| v.as_i64()),
        Some(3)
    );

    // No new restart event arrives; the persisted last restart is now, so
    // directly backdate it by seeding an old restart event instead of
    // sleeping out the real window in a test.
    {
        let pk = c.id;
        // overwrite the most recent restart event's timestamp to be outside the window
        let old_ts = Utc::now() - chrono::Duration::seconds(60);
        store
            .add_event(healthmon::types::Event {
                container_pk: pk,
                container: "web".to_string(),
                container_id: c.container_id.clone(),
                kind: "restart".to_string(),
                message: "backdated".to_string(),
                timestamp: old_ts,
                reason: Some("die".to_string()),
                ..Default::default()
            })
            .unwrap();
    }

    let scanner = HealScanner::new(store.clone(), tracker.clone(), broadcaster, None, std::time::Duration::from_secs(30));
    scanner.scan_once().await.unwrap();

    let healed = store.get_container("web").unwrap();
    assert!(!healed.restart_loop);
    assert_eq!(healed.restart_streak, 0);

    let alerts = store.list_all_alerts(0, 50).unwrap();
    let healed_alert = alerts.items.iter().find(|a| a.kind == "restart_healed").unwrap();
    assert_eq!(
        healed_alert.details.as_ref().and_then(|d| d.get("restart_count")).and_then(|v| v.as_i64()),
        Some(3)
    );
}

/// S2 — Image change on recreate: `destroy` then `create` whose inspect
/// reports a new image id/tag produces an `image_changed` event and alert,
/// and `registered_at` is preserved.
#[tokio::test]
async fn s2_image_change_on_recreate() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let registered_at = Utc::now() - chrono::Duration::hours(2);
    store
        .upsert_container(healthmon::types::Container {
            name: "web".to_string(),
            present: true,
            container_id: "old-cid".to_string(),
            image: "repo/web".to_string(),
            image_tag: "v1".to_string(),
            image_id: "sha:A".to_string(),
            registered_at: Some(registered_at),
            ..Default::default()
        })
        .unwrap();

    let broadcaster = Arc::new(Broadcaster::new());
    let tracker = Arc::new(StdMutex::new(RestartTracker::new(std::time::Duration::from_secs(300), 3)));

    let mut snapshots = HashMap::new();
    snapshots.insert(
        "new-cid".to_string(),
        InspectSnapshot {
            container_id: "new-cid".to_string(),
            image: "repo/web".to_string(),
            image_tag: "v2".to_string(),
            image_id: "sha:B".to_string(),
            status: "running".to_string(),
            ..Default::default()
        },
    );
    let create_msg = EngineMessage {
        message_type: "container".to_string(),
        action: "create".to_string(),
        actor_id: "new-cid".to_string(),
        attributes: attrs(&[("name", "web")]),
        time: None,
    };
    let engine: Box<dyn EngineClient> = Box::new(ScriptedEngine::new(vec![create_msg], snapshots));
    let reducer = Reducer::new(engine, store.clone(), tracker, broadcaster, None);
    run_reducer(reducer).await;

    let c = store.get_container("web").unwrap();
    assert_eq!(c.image_id, "sha:B");
    assert_eq!(c.image_tag, "v2");
    assert_eq!(c.registered_at, Some(registered_at));

    let events = store.list_all_events(0, 50).unwrap();
    let image_changed = events.items.iter().find(|e| e.kind == "image_changed").unwrap();
    assert_eq!(image_changed.old_image_id.as_deref(), Some("sha:A"));
    assert_eq!(image_changed.new_image_id.as_deref(), Some("sha:B"));

    let alerts = store.list_all_alerts(0, 50).unwrap();
    assert_eq!(alerts.items.iter().filter(|a| a.kind == "image_changed").count(), 1);
    assert_eq!(alerts.items.iter().filter(|a| a.kind == "recreated").count(), 0);
}

/// S3 — Health transitions: unhealthy, unhealthy again (no change), healthy.
/// Exactly one `unhealthy` alert then one `healthy` alert; `unhealthy_since`
/// set then cleared.
#[tokio::test]
async fn s3_health_transitions() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let broadcaster = Arc::new(Broadcaster::new());
    let tracker = Arc::new(StdMutex::new(RestartTracker::new(std::time::Duration::from_secs(300), 3)));

    let health_msg = |status: &str| EngineMessage {
        message_type: "container".to_string(),
        action: format!("health_status: {status}"),
        actor_id: String::new(),
        attributes: attrs(&[("name", "web")]),
        time: None,
    };
    let events = vec![health_msg("unhealthy"), health_msg("unhealthy"), health_msg("healthy")];
    let engine: Box<dyn EngineClient> = Box::new(ScriptedEngine::new(events, HashMap::new()));
    let reducer = Reducer::new(engine, store.clone(), tracker, broadcaster, None);
    run_reducer(reducer).await;

    let c = store.get_container("web").unwrap();
    assert!(c.unhealthy_since.is_none());

    let alerts = store.list_all_alerts(0, 50).unwrap();
    assert_eq!(alerts.items.iter().filter(|a| a.kind == "unhealthy").count(), 1);
    assert_eq!(alerts.items.iter().filter(|a| a.kind == "healthy").count(), 1);
    let healthy_alert = alerts.items.iter().find(|a| a.kind == "healthy").unwrap();
    assert!(healthy_alert.message.contains("failing"));
}

/// S4 — Failure without restart policy: `die(exit=137)`, policy `no`.
/// One `restart` event (reason `die`, exit 137); one `failure_no_restart`
/// alert; restart tracker/loop stay empty.
#[tokio::test]
async fn s4_failure_without_restart_policy() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let broadcaster = Arc::new(Broadcaster::new());
    let tracker = Arc::new(StdMutex::new(RestartTracker::new(std::time::Duration::from_secs(300), 3)));

    let mut snapshots = HashMap::new();
    snapshots.insert(
        "c2".to_string(),
        InspectSnapshot {
            status: "exited".to_string(),
            auto_restart_policy: Some("no".to_string()),
            ..Default::default()
        },
    );
    let engine: Box<dyn EngineClient> = Box::new(ScriptedEngine::new(vec![die_msg("c2", "worker", "137")], snapshots));
    let reducer = Reducer::new(engine, store.clone(), tracker.clone(), broadcaster, None);
    run_reducer(reducer).await;

    let c = store.get_container("worker").unwrap();
    assert!(!c.restart_loop);
    assert_eq!(c.restart_streak, 0);
    assert!(!tracker.lock().unwrap().in_loop("worker"));

    let events = store.list_all_events(0, 50).unwrap();
    let restart_events: Vec<_> = events.items.iter().filter(|e| e.kind == "restart").collect();
    assert_eq!(restart_events.len(), 1);
    assert_eq!(restart_events[0].exit_code, Some(137));
    assert_eq!(restart_events[0].reason.as_deref(), Some("die"));

    let alerts = store.list_all_alerts(0, 50).unwrap();
    assert_eq!(alerts.items.iter().filter(|a| a.kind == "failure_no_restart").count(), 1);
}

/// S5 — Rename collision: containers `a` and `b` both have history; renaming
/// `a` onto `b` repoints `a`'s events onto `b`'s surrogate id, flips `a` to
/// absent, and emits one `renamed` event under `b`.
#[tokio::test]
async fn s5_rename_collision() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let broadcaster = Arc::new(Broadcaster::new());
    let tracker = Arc::new(StdMutex::new(RestartTracker::new(std::time::Duration::from_secs(300), 3)));

    let id_a = store
        .upsert_container(healthmon::types::Container {
            name: "a".to_string(),
            present: true,
            ..Default::default()
        })
        .unwrap();
    let id_b = store
        .upsert_container(healthmon::types::Container {
            name: "b".to_string(),
            present: true,
            registered_at: Some(Utc::now() - chrono::Duration::hours(3)),
            ..Default::default()
        })
        .unwrap();
    store
        .add_event(healthmon::types::Event {
            container_pk: id_a,
            container: "a".to_string(),
            kind: "started".to_string(),
            timestamp: Utc::now(),
            ..Default::default()
        })
        .unwrap();
    store
        .add_event(healthmon::types::Event {
            container_pk: id_b,
            container: "b".to_string(),
            kind: "started".to_string(),
            timestamp: Utc::now(),
            ..Default::default()
        })
        .unwrap();

    let mut snapshots = HashMap::new();
    snapshots.insert(
        "rotated-cid".to_string(),
        InspectSnapshot {
            container_id: "rotated-cid".to_string(),
            status: "running".to_string(),
            ..Default::default()
        },
    );
    let rename_msg = EngineMessage {
        message_type: "container".to_string(),
        action: "rename".to_string(),
        actor_id: "rotated-cid".to_string(),
        attributes: attrs(&[("name", "b"), ("oldName", "a")]),
        time: None,
    };
    let engine: Box<dyn EngineClient> = Box::new(ScriptedEngine::new(vec![rename_msg], snapshots));
    let reducer = Reducer::new(engine, store.clone(), tracker, broadcaster, None);
    run_reducer(reducer).await;

    let all_events = store.list_all_events(0, 50).unwrap();
    assert!(all_events.items.iter().all(|e| e.container_pk == id_b));

    assert!(!store.get_container("a").unwrap().present);
    let b = store.get_container("b").unwrap();
    assert_eq!(b.container_id, "rotated-cid");

    assert!(all_events.items.iter().any(|e| e.kind == "renamed" && e.container_pk == id_b));
}

/// S6 — Event/container association repair at startup: an event is seeded
/// with a stale `container_pk` but a `container` name matching a different
/// row; `Store::load` repairs the pointer.
#[tokio::test]
async fn s6_startup_repair_fixes_mismatched_pointer() {
    let store = Store::open_in_memory().unwrap();
    let id10 = store
        .upsert_container(healthmon::types::Container {
            name: "ten".to_string(),
            present: true,
            ..Default::default()
        })
        .unwrap();
    let id11 = store
        .upsert_container(healthmon::types::Container {
            name: "eleven".to_string(),
            present: true,
            container_id: "cid-11".to_string(),
            ..Default::default()
        })
        .unwrap();

    store
        .add_event(healthmon::types::Event {
            container_pk: id10,
            container: "eleven".to_string(),
            container_id: "cid-11".to_string(),
            kind: "started".to_string(),
            timestamp: Utc::now(),
            ..Default::default()
        })
        .unwrap();

    store.load().unwrap();

    let events = store.list_all_events(0, 50).unwrap();
    assert_eq!(events.items[0].container_pk, id11);
}
