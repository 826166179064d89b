use rusqlite::Connection;

use crate::error::{HealthmonError, Result};

/// One schema migration: applied once, in order, inside a transaction.
/// Idempotent by construction — each uses `IF NOT EXISTS` / `IF NOT EXISTS`
/// equivalents so a partially-applied `schema_migrations` table can never
/// wedge a reopen.
struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
            CREATE TABLE IF NOT EXISTS containers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                container_id TEXT NOT NULL DEFAULT '',
                image TEXT NOT NULL DEFAULT '',
                image_tag TEXT NOT NULL DEFAULT '',
                image_id TEXT NOT NULL DEFAULT '',
                created_at TEXT,
                registered_at TEXT,
                started_at TEXT,
                status TEXT NOT NULL DEFAULT '',
                role TEXT NOT NULL DEFAULT 'task',
                user TEXT NOT NULL DEFAULT '',
                caps TEXT NOT NULL DEFAULT '[]',
                read_only INTEGER NOT NULL DEFAULT 0,
                no_new_privileges INTEGER NOT NULL DEFAULT 0,
                health_status TEXT NOT NULL DEFAULT '',
                health_failing_streak INTEGER NOT NULL DEFAULT 0,
                unhealthy_since TEXT,
                restart_loop INTEGER NOT NULL DEFAULT 0,
                restart_streak INTEGER NOT NULL DEFAULT 0,
                restart_loop_since TEXT,
                present INTEGER NOT NULL DEFAULT 1,
                last_event_id INTEGER,
                updated_at TEXT,
                healthcheck TEXT,
                auto_restart_policy TEXT
            );

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                container_pk INTEGER NOT NULL,
                container TEXT NOT NULL,
                container_id TEXT NOT NULL DEFAULT '',
                type TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                timestamp TEXT NOT NULL,
                old_image TEXT,
                new_image TEXT,
                old_image_id TEXT,
                new_image_id TEXT,
                old_image_tag TEXT,
                new_image_tag TEXT,
                reason TEXT,
                exit_code INTEGER,
                details TEXT
            );

            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                container_pk INTEGER NOT NULL,
                container TEXT NOT NULL,
                container_id TEXT NOT NULL DEFAULT '',
                type TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                timestamp TEXT NOT NULL,
                severity TEXT NOT NULL,
                details TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_events_container_pk ON events(container_pk);
            CREATE INDEX IF NOT EXISTS idx_events_type ON events(type);
            CREATE INDEX IF NOT EXISTS idx_alerts_container_pk ON alerts(container_pk);
            CREATE INDEX IF NOT EXISTS idx_alerts_type ON alerts(type);
        "#,
    },
];

pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    for migration in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?1)",
                [migration.version],
                |row| row.get(0),
            )
            .unwrap_or(false);
        if already_applied {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql).map_err(|e| {
            HealthmonError::Migration(format!("migration {} failed: {e}", migration.version))
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
            [migration.version],
        )?;
        tx.commit()?;
    }

    Ok(())
}
