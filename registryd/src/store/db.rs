use std::path::Path;
use anyhow::{Context, Result};
use rusqlite::{Connection, params, OptionalExtension};
use shared::types::ServiceRecord;
use chrono::{DateTime, SecondsFormat, Utc};

pub struct RegistryDb {
    conn: Connection,
}

impl RegistryDb {
    /// Open or create the SQLite database with WAL mode enabled
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // Enable WAL mode for better concurrency and crash recovery
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;

        // AUTOINCREMENT keeps ids of purged services from ever being reused
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS services (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                name           TEXT NOT NULL UNIQUE,
                address        TEXT NOT NULL,
                last_heartbeat TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_services_heartbeat ON services(last_heartbeat);
            "#,
        )
        .context("Failed to create database schema")?;

        Ok(Self { conn })
    }

    /// Insert a new service or refresh an existing one by name.
    /// Returns the record's id.
    pub fn upsert_service(
        &self,
        name: &str,
        address: &str,
        heartbeat: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn
            .execute(
                r#"
                INSERT INTO services (name, address, last_heartbeat)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(name) DO UPDATE SET
                    address = excluded.address,
                    last_heartbeat = excluded.last_heartbeat
                "#,
                params![name, address, format_heartbeat(heartbeat)],
            )
            .context("Failed to upsert service")?;

        let id = self
            .conn
            .query_row(
                "SELECT id FROM services WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .context("Failed to look up service id after upsert")?;

        Ok(id)
    }

    /// Get all services. A row whose stored heartbeat fails to parse is
    /// skipped with a warning rather than failing the whole read.
    pub fn get_all_services(&self) -> Result<Vec<ServiceRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, address, last_heartbeat FROM services ORDER BY id")
            .context("Failed to prepare query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("Failed to query services")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect services")?;

        let mut services = Vec::with_capacity(rows.len());
        for (id, name, address, heartbeat_str) in rows {
            match parse_heartbeat(&heartbeat_str) {
                Ok(last_heartbeat) => services.push(ServiceRecord {
                    id,
                    name,
                    address,
                    last_heartbeat,
                }),
                Err(e) => {
                    tracing::warn!("Skipping service {} with malformed heartbeat: {}", name, e);
                }
            }
        }

        Ok(services)
    }

    /// Get a single service by exact name. A malformed stored heartbeat
    /// reads as absent, same skip policy as listing.
    pub fn get_service(&self, name: &str) -> Result<Option<ServiceRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, address, last_heartbeat FROM services WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query service")?;

        let Some((id, name, address, heartbeat_str)) = row else {
            return Ok(None);
        };

        match parse_heartbeat(&heartbeat_str) {
            Ok(last_heartbeat) => Ok(Some(ServiceRecord {
                id,
                name,
                address,
                last_heartbeat,
            })),
            Err(e) => {
                tracing::warn!("Skipping service {} with malformed heartbeat: {}", name, e);
                Ok(None)
            }
        }
    }

    /// Delete every service whose heartbeat is at least `expiry_timeout_secs`
    /// old. Returns the number of rows removed.
    pub fn purge_expired(&self, expiry_timeout_secs: u64) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::seconds(expiry_timeout_secs as i64);

        let count = self
            .conn
            .execute(
                "DELETE FROM services WHERE last_heartbeat <= ?1",
                params![format_heartbeat(cutoff)],
            )
            .context("Failed to purge expired services")?;

        Ok(count as u64)
    }
}

/// Heartbeats are stored as RFC 3339 at second resolution. The format is
/// fixed-width, so SQL string comparison orders chronologically.
fn format_heartbeat(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_heartbeat(s: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid heartbeat timestamp: {}", s))?;
    Ok(ts.with_timezone(&Utc))
}
