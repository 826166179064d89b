//! Persistence store (§4.1): a single-writer SQLite database with WAL, plus
//! an in-memory `name -> Container` cache kept coherent with it.
//!
//! Concurrency discipline mirrors §5: one connection, one writer at a time.
//! Writers hold the connection mutex for the whole of a logical write
//! (store mutation + cache mutation) so a reader taking only the cache's
//! `RwLock` never observes a half-applied update.

mod migrations;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use crate::error::Result;
use crate::types::{Alert, Container, Event, Healthcheck, HealthStatus, Page, Role, Severity};

pub struct Store {
    conn: Mutex<Connection>,
    cache: RwLock<HashMap<String, Container>>,
}

impl Store {
    /// Open (creating if absent) the database at `path`, apply pending
    /// migrations, and hydrate the in-memory cache (§4.1 `Load`).
    pub fn open(path: &str) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000; PRAGMA foreign_keys=OFF;")?;
        migrations::migrate(&mut conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            cache: RwLock::new(HashMap::new()),
        };
        store.load()?;
        Ok(store)
    }

    /// Open an in-memory database, used by tests that don't want a temp file.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrations::migrate(&mut conn)?;
        let store = Self {
            conn: Mutex::new(conn),
            cache: RwLock::new(HashMap::new()),
        };
        store.load()?;
        Ok(store)
    }

    pub fn close(self) -> Result<()> {
        let conn = self.conn.into_inner().expect("store mutex poisoned");
        conn.close().map_err(|(_, e)| e.into())
    }

    /// Hydrate the cache from the `containers` table and repair any
    /// event/alert row whose `container_pk` no longer matches the
    /// container currently holding that row's `container` name (§4.1,
    /// Testable Property 7 / scenario S6). Engine container-ids rotate on
    /// recreate; rows inserted under a stale mapping get healed here.
    pub fn load(&self) -> Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");

        let mut stmt = conn.prepare(SELECT_CONTAINER_COLUMNS)?;
        let rows = stmt.query_map([], row_to_container)?;
        {
            let mut cache = self.cache.write().expect("cache lock poisoned");
            cache.clear();
            for row in rows {
                let c = row?;
                cache.insert(c.name.clone(), c);
            }
        }
        drop(stmt);

        self.repair_pointers(&conn, "events")?;
        self.repair_pointers(&conn, "alerts")?;
        Ok(())
    }

    fn repair_pointers(&self, conn: &Connection, table: &str) -> Result<()> {
        let cache = self.cache.read().expect("cache lock poisoned");
        let sql = format!("SELECT id, container_pk, container FROM {table}");
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<(i64, i64, String)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);

        let update_sql = format!("UPDATE {table} SET container_pk = ?1 WHERE id = ?2");
        for (row_id, container_pk, name) in rows {
            if let Some(c) = cache.get(&name) {
                if c.id != container_pk {
                    conn.execute(&update_sql, params![c.id, row_id])?;
                }
            }
        }
        Ok(())
    }

    /// Insert-or-update by name. Retains `registered_at` across a conflict
    /// if the incoming value is unset; always sets `present = true`.
    /// Returns the stable surrogate id.
    pub fn upsert_container(&self, mut c: Container) -> Result<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let existing: Option<(i64, Option<DateTime<Utc>>)> = conn
            .query_row(
                "SELECT id, registered_at FROM containers WHERE name = ?1",
                params![c.name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        c.present = true;

        if let Some((id, registered_at)) = existing {
            c.id = id;
            if c.registered_at.is_none() {
                c.registered_at = registered_at;
            }
            conn.execute(UPDATE_CONTAINER_SQL, rusqlite::params_from_iter(container_update_params(&c)))?;
        } else {
            if c.registered_at.is_none() {
                c.registered_at = Some(Utc::now());
            }
            conn.execute(INSERT_CONTAINER_SQL, rusqlite::params_from_iter(container_insert_params(&c)))?;
            c.id = conn.last_insert_rowid();
        }

        self.cache
            .write()
            .expect("cache lock poisoned")
            .insert(c.name.clone(), c.clone());
        Ok(c.id)
    }

    pub fn get_container(&self, name: &str) -> Option<Container> {
        self.cache.read().expect("cache lock poisoned").get(name).cloned()
    }

    /// Every container currently marked present, for `GET /api/containers`.
    pub fn list_present_containers(&self) -> Vec<Container> {
        self.cache
            .read()
            .expect("cache lock poisoned")
            .values()
            .filter(|c| c.present)
            .cloned()
            .collect()
    }

    pub fn get_container_by_container_id(&self, container_id: &str) -> Option<Container> {
        if container_id.is_empty() {
            return None;
        }
        {
            let cache = self.cache.read().expect("cache lock poisoned");
            if let Some(c) = cache.values().find(|c| c.container_id == container_id) {
                return Some(c.clone());
            }
        }
        let conn = self.conn.lock().expect("store mutex poisoned");
        let found: Option<Container> = conn
            .query_row(
                &format!("{SELECT_CONTAINER_COLUMNS} WHERE container_id = ?1"),
                params![container_id],
                row_to_container,
            )
            .optional()
            .ok()
            .flatten();
        if let Some(c) = &found {
            self.cache
                .write()
                .expect("cache lock poisoned")
                .insert(c.name.clone(), c.clone());
        }
        found
    }

    pub fn find_container_by_id(&self, id: i64) -> Option<Container> {
        {
            let cache = self.cache.read().expect("cache lock poisoned");
            if let Some(c) = cache.values().find(|c| c.id == id) {
                return Some(c.clone());
            }
        }
        let conn = self.conn.lock().expect("store mutex poisoned");
        let found: Option<Container> = conn
            .query_row(
                &format!("{SELECT_CONTAINER_COLUMNS} WHERE id = ?1"),
                params![id],
                row_to_container,
            )
            .optional()
            .ok()
            .flatten();
        if let Some(c) = &found {
            self.cache
                .write()
                .expect("cache lock poisoned")
                .insert(c.name.clone(), c.clone());
        }
        found
    }

    /// Append an event and, in the same logical write, set the owning
    /// container's `last_event_id`/`updated_at` (§3 invariant 5).
    pub fn add_event(&self, e: Event) -> Result<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO events (container_pk, container, container_id, type, message, timestamp,
                old_image, new_image, old_image_id, new_image_id, old_image_tag, new_image_tag,
                reason, exit_code, details)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
            params![
                e.container_pk,
                e.container,
                e.container_id,
                e.kind,
                e.message,
                e.timestamp,
                e.old_image,
                e.new_image,
                e.old_image_id,
                e.new_image_id,
                e.old_image_tag,
                e.new_image_tag,
                e.reason,
                e.exit_code,
                e.details.as_ref().map(|v| v.to_string()),
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.touch_last_event(&conn, e.container_pk, id, e.timestamp)?;
        Ok(id)
    }

    pub fn add_alert(&self, a: Alert) -> Result<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO alerts (container_pk, container, container_id, type, message, timestamp, severity, details)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                a.container_pk,
                a.container,
                a.container_id,
                a.kind,
                a.message,
                a.timestamp,
                severity_to_str(a.severity),
                a.details.as_ref().map(|v| v.to_string()),
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.touch_last_event(&conn, a.container_pk, id, a.timestamp)?;
        Ok(id)
    }

    fn touch_last_event(
        &self,
        conn: &Connection,
        container_pk: i64,
        event_id: i64,
        ts: DateTime<Utc>,
    ) -> Result<()> {
        conn.execute(
            "UPDATE containers SET last_event_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![event_id, ts, container_pk],
        )?;
        let mut cache = self.cache.write().expect("cache lock poisoned");
        if let Some(c) = cache.values_mut().find(|c| c.id == container_pk) {
            c.last_event_id = Some(event_id);
            c.updated_at = Some(ts);
        }
        Ok(())
    }

    pub fn list_events(&self, name: &str, before_id: i64, limit: i64) -> Result<Page<Event>> {
        let before_id = normalize_before_id(before_id);
        let conn = self.conn.lock().expect("store mutex poisoned");
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM events WHERE container = ?1",
            params![name],
            |r| r.get(0),
        )?;
        let mut stmt = conn.prepare(
            "SELECT id, container_pk, container, container_id, type, message, timestamp,
                old_image, new_image, old_image_id, new_image_id, old_image_tag, new_image_tag,
                reason, exit_code, details
             FROM events WHERE container = ?1 AND id < ?2 ORDER BY id DESC LIMIT ?3",
        )?;
        let items = stmt
            .query_map(params![name, before_id, limit], row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Page { items, total })
    }

    pub fn list_all_events(&self, before_id: i64, limit: i64) -> Result<Page<Event>> {
        let before_id = normalize_before_id(before_id);
        let conn = self.conn.lock().expect("store mutex poisoned");
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))?;
        let mut stmt = conn.prepare(
            "SELECT id, container_pk, container, container_id, type, message, timestamp,
                old_image, new_image, old_image_id, new_image_id, old_image_tag, new_image_tag,
                reason, exit_code, details
             FROM events WHERE id < ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let items = stmt
            .query_map(params![before_id, limit], row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Page { items, total })
    }

    pub fn list_all_alerts(&self, before_id: i64, limit: i64) -> Result<Page<Alert>> {
        let before_id = normalize_before_id(before_id);
        let conn = self.conn.lock().expect("store mutex poisoned");
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM alerts", [], |r| r.get(0))?;
        let mut stmt = conn.prepare(
            "SELECT id, container_pk, container, container_id, type, message, timestamp, severity, details
             FROM alerts WHERE id < ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let items = stmt
            .query_map(params![before_id, limit], row_to_alert)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Page { items, total })
    }

    pub fn count_events_by_container(&self, name: &str) -> Result<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM events WHERE container = ?1",
            params![name],
            |r| r.get(0),
        )?)
    }

    pub fn count_all_events(&self) -> Result<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        Ok(conn.query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))?)
    }

    pub fn count_all_alerts(&self) -> Result<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        Ok(conn.query_row("SELECT COUNT(*) FROM alerts", [], |r| r.get(0))?)
    }

    /// Latest `restart` event for this container — what the heal scanner
    /// measures elapsed time against (§4.5).
    pub fn get_latest_restart_timestamp_by_container_pk(
        &self,
        container_pk: i64,
    ) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        Ok(conn
            .query_row(
                "SELECT timestamp FROM events WHERE container_pk = ?1 AND type = 'restart'
                 ORDER BY id DESC LIMIT 1",
                params![container_pk],
                |r| r.get(0),
            )
            .optional()?)
    }

    /// Most recent `restart_loop`/`restart_healed` alert, used to
    /// reconstruct loop flags at startup (§4.7).
    pub fn get_latest_restart_loop_alert_by_container_pk(
        &self,
        container_pk: i64,
    ) -> Result<Option<Alert>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        Ok(conn
            .query_row(
                "SELECT id, container_pk, container, container_id, type, message, timestamp, severity, details
                 FROM alerts WHERE container_pk = ?1 AND type IN ('restart_loop', 'restart_healed')
                 ORDER BY id DESC LIMIT 1",
                params![container_pk],
                row_to_alert,
            )
            .optional()?)
    }

    /// Every container currently flagged `restart_loop`, read from the
    /// cache — what the heal scanner walks each tick (§4.5).
    pub fn list_restart_loop_candidates(&self) -> Result<Vec<Container>> {
        let cache = self.cache.read().expect("cache lock poisoned");
        Ok(cache.values().filter(|c| c.restart_loop).cloned().collect())
    }

    pub fn set_container_present(&self, name: &str, present: bool) -> Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "UPDATE containers SET present = ?1 WHERE name = ?2",
            params![present, name],
        )?;
        if let Some(c) = self.cache.write().expect("cache lock poisoned").get_mut(name) {
            c.present = present;
        }
        Ok(())
    }

    /// Flip every tracked container not in `present_names` to absent (§4.7
    /// step 4).
    pub fn mark_absent_except(&self, present_names: &HashSet<String>) -> Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut cache = self.cache.write().expect("cache lock poisoned");
        let to_flip: Vec<String> = cache
            .values()
            .filter(|c| c.present && !present_names.contains(&c.name))
            .map(|c| c.name.clone())
            .collect();
        for name in to_flip {
            conn.execute(
                "UPDATE containers SET present = 0 WHERE name = ?1",
                params![name],
            )?;
            if let Some(c) = cache.get_mut(&name) {
                c.present = false;
            }
        }
        Ok(())
    }

    /// Handles both branches of §4.4 RENAME: either repoint a collision
    /// target's history onto the surviving row, or rename the row in place.
    /// Returns the surrogate id the caller should now treat as "new_name".
    pub fn rename_container(&self, old: &str, new: &str, new_info: Container) -> Result<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let old_row: Option<(i64, Option<DateTime<Utc>>, Option<DateTime<Utc>>)> = conn
            .query_row(
                "SELECT id, registered_at, started_at FROM containers WHERE name = ?1",
                params![old],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;
        let new_row: Option<(i64, Option<DateTime<Utc>>, Option<DateTime<Utc>>)> = conn
            .query_row(
                "SELECT id, registered_at, started_at FROM containers WHERE name = ?1",
                params![new],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        let target_id = match (old_row, new_row) {
            (Some((old_id, old_registered, old_started)), Some((new_id, new_registered, new_started))) => {
                // collision: repoint history, update the surviving row, retire the old one.
                // the denormalized `container` name has to move with the pointer too, or
                // the next `load`'s repair pass sees container["a"].id != container_pk and
                // rewrites container_pk straight back to old_id.
                conn.execute(
                    "UPDATE events SET container_pk = ?1, container = ?2 WHERE container_pk = ?3",
                    params![new_id, new, old_id],
                )?;
                conn.execute(
                    "UPDATE alerts SET container_pk = ?1, container = ?2 WHERE container_pk = ?3",
                    params![new_id, new, old_id],
                )?;
                conn.execute(
                    "UPDATE containers SET present = 0 WHERE id = ?1",
                    params![old_id],
                )?;

                let mut info = new_info;
                info.id = new_id;
                info.registered_at = info.registered_at.or(new_registered).or(old_registered);
                info.started_at = info.started_at.or(new_started).or(old_started);
                conn.execute(UPDATE_CONTAINER_SQL, rusqlite::params_from_iter(container_update_params(&info)))?;

                let mut cache = self.cache.write().expect("cache lock poisoned");
                if let Some(old_c) = cache.get_mut(old) {
                    old_c.present = false;
                }
                cache.insert(new.to_string(), info);
                new_id
            }
            (Some((old_id, old_registered, old_started)), None) => {
                // plain rename, no collision.
                let mut info = new_info;
                info.id = old_id;
                info.registered_at = info.registered_at.or(old_registered);
                info.started_at = info.started_at.or(old_started);
                conn.execute(
                    "UPDATE containers SET name = ?1 WHERE id = ?2",
                    params![new, old_id],
                )?;
                conn.execute(UPDATE_CONTAINER_SQL, rusqlite::params_from_iter(container_update_params(&info)))?;
                conn.execute(
                    "UPDATE events SET container = ?1 WHERE container_pk = ?2",
                    params![new, old_id],
                )?;
                conn.execute(
                    "UPDATE alerts SET container = ?1 WHERE container_pk = ?2",
                    params![new, old_id],
                )?;

                let mut cache = self.cache.write().expect("cache lock poisoned");
                cache.remove(old);
                cache.insert(new.to_string(), info);
                old_id
            }
            (None, _) => {
                // old row vanished (raced with another rename); treat as a fresh upsert.
                drop(conn);
                return self.upsert_container(new_info);
            }
        };

        Ok(target_id)
    }
}

fn normalize_before_id(before_id: i64) -> i64 {
    if before_id <= 0 {
        i64::MAX
    } else {
        before_id
    }
}

const SELECT_CONTAINER_COLUMNS: &str = "SELECT id, name, container_id, image, image_tag, image_id,
    created_at, registered_at, started_at, status, role, user, caps, read_only, no_new_privileges,
    health_status, health_failing_streak, unhealthy_since, restart_loop, restart_streak,
    restart_loop_since, present, last_event_id, updated_at, healthcheck, auto_restart_policy
    FROM containers";

const INSERT_CONTAINER_SQL: &str = "INSERT INTO containers (
    name, container_id, image, image_tag, image_id, created_at, registered_at, started_at,
    status, role, user, caps, read_only, no_new_privileges, health_status, health_failing_streak,
    unhealthy_since, restart_loop, restart_streak, restart_loop_since, present, last_event_id,
    updated_at, healthcheck, auto_restart_policy
) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24,?25)";

const UPDATE_CONTAINER_SQL: &str = "UPDATE containers SET
    container_id=?2, image=?3, image_tag=?4, image_id=?5, created_at=?6, registered_at=?7,
    started_at=?8, status=?9, role=?10, user=?11, caps=?12, read_only=?13, no_new_privileges=?14,
    health_status=?15, health_failing_streak=?16, unhealthy_since=?17, restart_loop=?18,
    restart_streak=?19, restart_loop_since=?20, present=?21, last_event_id=?22, updated_at=?23,
    healthcheck=?24, auto_restart_policy=?25
    WHERE id=?1";

fn container_insert_params(c: &Container) -> Vec<Box<dyn rusqlite::ToSql>> {
    let caps = serde_json::to_string(&c.caps).unwrap_or_else(|_| "[]".to_string());
    let healthcheck = c.healthcheck.as_ref().map(|h| serde_json::to_string(h).unwrap_or_default());
    vec![
        Box::new(c.name.clone()),
        Box::new(c.container_id.clone()),
        Box::new(c.image.clone()),
        Box::new(c.image_tag.clone()),
        Box::new(c.image_id.clone()),
        Box::new(c.created_at),
        Box::new(c.registered_at),
        Box::new(c.started_at),
        Box::new(c.status.clone()),
        Box::new(role_to_str(&c.role).to_string()),
        Box::new(c.user.clone()),
        Box::new(caps),
        Box::new(c.read_only),
        Box::new(c.no_new_privileges),
        Box::new(health_to_str(&c.health_status).to_string()),
        Box::new(c.health_failing_streak),
        Box::new(c.unhealthy_since),
        Box::new(c.restart_loop),
        Box::new(c.restart_streak),
        Box::new(c.restart_loop_since),
        Box::new(c.present),
        Box::new(c.last_event_id),
        Box::new(c.updated_at),
        Box::new(healthcheck),
        Box::new(c.auto_restart_policy.clone()),
    ]
}

fn container_update_params(c: &Container) -> Vec<Box<dyn rusqlite::ToSql>> {
    let mut p = vec![Box::new(c.id) as Box<dyn rusqlite::ToSql>];
    p.extend(container_insert_params(c));
    p
}

fn row_to_container(row: &Row) -> rusqlite::Result<Container> {
    let caps_json: String = row.get(12)?;
    let healthcheck_json: Option<String> = row.get(24)?;
    Ok(Container {
        id: row.get(0)?,
        name: row.get(1)?,
        container_id: row.get(2)?,
        image: row.get(3)?,
        image_tag: row.get(4)?,
        image_id: row.get(5)?,
        created_at: row.get(6)?,
        registered_at: row.get(7)?,
        started_at: row.get(8)?,
        status: row.get(9)?,
        role: str_to_role(&row.get::<_, String>(10)?),
        user: row.get(11)?,
        caps: serde_json::from_str(&caps_json).unwrap_or_default(),
        read_only: row.get(13)?,
        no_new_privileges: row.get(14)?,
        health_status: str_to_health(&row.get::<_, String>(15)?),
        health_failing_streak: row.get(16)?,
        unhealthy_since: row.get(17)?,
        restart_loop: row.get(18)?,
        restart_streak: row.get(19)?,
        restart_loop_since: row.get(20)?,
        present: row.get(21)?,
        last_event_id: row.get(22)?,
        updated_at: row.get(23)?,
        healthcheck: healthcheck_json.and_then(|s| serde_json::from_str(&s).ok()),
        auto_restart_policy: row.get(25)?,
    })
}

fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
    let details_json: Option<String> = row.get(15)?;
    Ok(Event {
        id: row.get(0)?,
        container_pk: row.get(1)?,
        container: row.get(2)?,
        container_id: row.get(3)?,
        kind: row.get(4)?,
        message: row.get(5)?,
        timestamp: row.get(6)?,
        old_image: row.get(7)?,
        new_image: row.get(8)?,
        old_image_id: row.get(9)?,
        new_image_id: row.get(10)?,
        old_image_tag: row.get(11)?,
        new_image_tag: row.get(12)?,
        reason: row.get(13)?,
        exit_code: row.get(14)?,
        details: details_json.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

fn row_to_alert(row: &Row) -> rusqlite::Result<Alert> {
    let details_json: Option<String> = row.get(8)?;
    Ok(Alert {
        id: row.get(0)?,
        container_pk: row.get(1)?,
        container: row.get(2)?,
        container_id: row.get(3)?,
        kind: row.get(4)?,
        message: row.get(5)?,
        timestamp: row.get(6)?,
        severity: str_to_severity(&row.get::<_, String>(7)?),
        details: details_json.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

fn role_to_str(r: &Role) -> &'static str {
    match r {
        Role::Service => "service",
        Role::Task => "task",
    }
}

fn str_to_role(s: &str) -> Role {
    match s {
        "service" => Role::Service,
        _ => Role::Task,
    }
}

fn health_to_str(h: &HealthStatus) -> &'static str {
    match h {
        HealthStatus::None => "",
        HealthStatus::Starting => "starting",
        HealthStatus::Healthy => "healthy",
        HealthStatus::Unhealthy => "unhealthy",
    }
}

fn str_to_health(s: &str) -> HealthStatus {
    match s {
        "starting" => HealthStatus::Starting,
        "healthy" => HealthStatus::Healthy,
        "unhealthy" => HealthStatus::Unhealthy,
        _ => HealthStatus::None,
    }
}

fn severity_to_str(s: Severity) -> &'static str {
    match s {
        Severity::Red => "red",
        Severity::Green => "green",
        Severity::Blue => "blue",
    }
}

fn str_to_severity(s: &str) -> Severity {
    match s {
        "green" => Severity::Green,
        "blue" => Severity::Blue,
        _ => Severity::Red,
    }
}
