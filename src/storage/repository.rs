//! SQLite and in-memory storage backends
//!
//! # Schema
//!
//! ```text
//! hospitals         id PK, static metadata
//! hospital_status   hospital_id PK, latest record (upserted)
//! hospital_history  id AUTOINCREMENT, one row per successful scrape
//! ```
//!
//! The distribution is stored as five integer columns. Observation times
//! are RFC 3339 text; source timestamps are naive local time text.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{HospitalDirectory, StatusStore};
use crate::models::{
    ColorCode, ColorCodeDistribution, HospitalHistory, HospitalIdentity, HospitalStatus,
    HospitalStatusCreate,
};

const NAIVE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite backend
///
/// Uses `Mutex` to serialize access to the single connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS hospitals (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    department TEXT NOT NULL DEFAULT '',
                    city TEXT NOT NULL,
                    province TEXT NOT NULL,
                    address TEXT,
                    latitude REAL,
                    longitude REAL
                );

                CREATE TABLE IF NOT EXISTS hospital_status (
                    hospital_id INTEGER PRIMARY KEY,
                    color_code TEXT NOT NULL,
                    waiting_time INTEGER NOT NULL,
                    patients_waiting INTEGER NOT NULL,
                    available_beds INTEGER NOT NULL,
                    red INTEGER NOT NULL DEFAULT 0,
                    orange INTEGER NOT NULL DEFAULT 0,
                    blue INTEGER NOT NULL DEFAULT 0,
                    green INTEGER NOT NULL DEFAULT 0,
                    white INTEGER NOT NULL DEFAULT 0,
                    external_last_update TEXT,
                    last_updated TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS hospital_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    hospital_id INTEGER NOT NULL,
                    color_code TEXT NOT NULL,
                    waiting_time INTEGER NOT NULL,
                    patients_waiting INTEGER NOT NULL,
                    available_beds INTEGER NOT NULL,
                    red INTEGER NOT NULL DEFAULT 0,
                    orange INTEGER NOT NULL DEFAULT 0,
                    blue INTEGER NOT NULL DEFAULT 0,
                    green INTEGER NOT NULL DEFAULT 0,
                    white INTEGER NOT NULL DEFAULT 0,
                    external_last_update TEXT,
                    scraped_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_history_hospital_time
                    ON hospital_history(hospital_id, scraped_at);
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }
}

fn format_utc(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn format_naive(ts: &Option<NaiveDateTime>) -> Option<String> {
    ts.map(|t| t.format(NAIVE_FORMAT).to_string())
}

fn conversion_error(idx: usize, e: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn utc_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn naive_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDateTime::parse_from_str(&s, NAIVE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Distribution from five consecutive columns starting at `idx`
fn distribution_columns(row: &Row<'_>, idx: usize) -> rusqlite::Result<ColorCodeDistribution> {
    Ok(ColorCodeDistribution {
        red: row.get(idx)?,
        orange: row.get(idx + 1)?,
        blue: row.get(idx + 2)?,
        green: row.get(idx + 3)?,
        white: row.get(idx + 4)?,
    })
}

fn color_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ColorCode> {
    let raw: String = row.get(idx)?;
    Ok(raw.parse().unwrap_or(ColorCode::Unknown))
}

fn hospital_from_row(row: &Row<'_>) -> rusqlite::Result<HospitalIdentity> {
    Ok(HospitalIdentity {
        id: row.get(0)?,
        name: row.get(1)?,
        department: row.get(2)?,
        city: row.get(3)?,
        province: row.get(4)?,
        address: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
    })
}

const STATUS_COLUMNS: &str = "hospital_id, color_code, waiting_time, patients_waiting, \
     available_beds, red, orange, blue, green, white, external_last_update";

#[async_trait]
impl HospitalDirectory for SqliteStore {
    async fn list_hospitals(&self) -> Result<Vec<HospitalIdentity>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, department, city, province, address, latitude, longitude
             FROM hospitals ORDER BY id",
        )?;
        let hospitals = stmt
            .query_map([], hospital_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list hospitals")?;
        Ok(hospitals)
    }

    async fn get_hospital(&self, id: i64) -> Result<Option<HospitalIdentity>> {
        let conn = self.lock()?;
        let hospital = conn
            .query_row(
                "SELECT id, name, department, city, province, address, latitude, longitude
                 FROM hospitals WHERE id = ?1",
                params![id],
                hospital_from_row,
            )
            .optional()
            .context("Failed to get hospital")?;
        Ok(hospital)
    }

    async fn upsert_hospital(&self, hospital: &HospitalIdentity) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
                INSERT INTO hospitals (id, name, department, city, province, address, latitude, longitude)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    department = excluded.department,
                    city = excluded.city,
                    province = excluded.province,
                    address = excluded.address,
                    latitude = excluded.latitude,
                    longitude = excluded.longitude
                "#,
            params![
                hospital.id,
                hospital.name,
                hospital.department,
                hospital.city,
                hospital.province,
                hospital.address,
                hospital.latitude,
                hospital.longitude
            ],
        )
        .context("Failed to upsert hospital")?;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for SqliteStore {
    async fn persist_status(&self, status: &HospitalStatusCreate) -> Result<HospitalStatus> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("Failed to begin transaction")?;

        let dist = &status.color_distribution;
        let external = format_naive(&status.external_last_update);
        let observed = format_utc(&status.observed_at);

        tx.execute(
            &format!(
                "INSERT INTO hospital_status ({STATUS_COLUMNS}, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(hospital_id) DO UPDATE SET
                    color_code = excluded.color_code,
                    waiting_time = excluded.waiting_time,
                    patients_waiting = excluded.patients_waiting,
                    available_beds = excluded.available_beds,
                    red = excluded.red,
                    orange = excluded.orange,
                    blue = excluded.blue,
                    green = excluded.green,
                    white = excluded.white,
                    external_last_update = excluded.external_last_update,
                    last_updated = excluded.last_updated"
            ),
            params![
                status.hospital_id,
                status.color_code.as_str(),
                status.waiting_time,
                status.patients_waiting,
                status.available_beds,
                dist.red,
                dist.orange,
                dist.blue,
                dist.green,
                dist.white,
                external,
                observed
            ],
        )
        .context("Failed to upsert current status")?;

        tx.execute(
            &format!(
                "INSERT INTO hospital_history ({STATUS_COLUMNS}, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                status.hospital_id,
                status.color_code.as_str(),
                status.waiting_time,
                status.patients_waiting,
                status.available_beds,
                dist.red,
                dist.orange,
                dist.blue,
                dist.green,
                dist.white,
                external,
                observed
            ],
        )
        .context("Failed to append history")?;

        tx.commit().context("Failed to commit status")?;

        Ok(HospitalStatus::from_create(status))
    }

    async fn current_status(&self, hospital_id: i64) -> Result<Option<HospitalStatus>> {
        let conn = self.lock()?;
        let status = conn
            .query_row(
                &format!(
                    "SELECT {STATUS_COLUMNS}, last_updated FROM hospital_status WHERE hospital_id = ?1"
                ),
                params![hospital_id],
                |row| {
                    Ok(HospitalStatus {
                        hospital_id: row.get(0)?,
                        color_code: color_column(row, 1)?,
                        waiting_time: row.get(2)?,
                        patients_waiting: row.get(3)?,
                        available_beds: row.get(4)?,
                        color_distribution: distribution_columns(row, 5)?,
                        external_last_update: naive_column(row, 10)?,
                        last_updated: utc_column(row, 11)?,
                    })
                },
            )
            .optional()
            .context("Failed to read current status")?;
        Ok(status)
    }

    async fn history(&self, hospital_id: i64, limit: usize) -> Result<Vec<HospitalHistory>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, {STATUS_COLUMNS}, scraped_at FROM hospital_history
             WHERE hospital_id = ?1 ORDER BY id DESC LIMIT ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![hospital_id, limit], |row| {
                Ok(HospitalHistory {
                    id: row.get(0)?,
                    hospital_id: row.get(1)?,
                    color_code: color_column(row, 2)?,
                    waiting_time: row.get(3)?,
                    patients_waiting: row.get(4)?,
                    available_beds: row.get(5)?,
                    color_distribution: distribution_columns(row, 6)?,
                    external_last_update: naive_column(row, 11)?,
                    scraped_at: utc_column(row, 12)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read history")?;
        Ok(rows)
    }
}

// ============================================================================
// In-memory Implementation (for testing)
// ============================================================================

/// In-memory backend
///
/// Persistence can be made to fail per hospital to exercise rollback paths.
#[derive(Default)]
pub struct MemoryStore {
    hospitals: RwLock<BTreeMap<i64, HospitalIdentity>>,
    current: RwLock<HashMap<i64, HospitalStatus>>,
    history: RwLock<Vec<HospitalHistory>>,
    failing: RwLock<HashSet<i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `hospitals`
    pub fn with_hospitals(hospitals: impl IntoIterator<Item = HospitalIdentity>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.hospitals.write() {
            map.extend(hospitals.into_iter().map(|h| (h.id, h)));
        }
        store
    }

    /// Make every `persist_status` call for `hospital_id` fail
    pub fn fail_persist_for(&self, hospital_id: i64) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(hospital_id);
        }
    }

    /// Number of history rows across all hospitals
    pub fn history_len(&self) -> usize {
        self.history.read().map(|h| h.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("memory store lock poisoned")
}

#[async_trait]
impl HospitalDirectory for MemoryStore {
    async fn list_hospitals(&self) -> Result<Vec<HospitalIdentity>> {
        Ok(self.hospitals.read().map_err(poisoned)?.values().cloned().collect())
    }

    async fn get_hospital(&self, id: i64) -> Result<Option<HospitalIdentity>> {
        Ok(self.hospitals.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn upsert_hospital(&self, hospital: &HospitalIdentity) -> Result<()> {
        self.hospitals
            .write()
            .map_err(poisoned)?
            .insert(hospital.id, hospital.clone());
        Ok(())
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn persist_status(&self, status: &HospitalStatusCreate) -> Result<HospitalStatus> {
        if self.failing.read().map_err(poisoned)?.contains(&status.hospital_id) {
            anyhow::bail!("simulated write failure for hospital {}", status.hospital_id);
        }

        let mut current = self.current.write().map_err(poisoned)?;
        let mut history = self.history.write().map_err(poisoned)?;

        let row = HospitalStatus::from_create(status);
        current.insert(status.hospital_id, row.clone());

        let id = i64::try_from(history.len()).unwrap_or(i64::MAX) + 1;
        history.push(HospitalHistory {
            id,
            hospital_id: status.hospital_id,
            color_code: status.color_code,
            waiting_time: status.waiting_time,
            patients_waiting: status.patients_waiting,
            available_beds: status.available_beds,
            color_distribution: status.color_distribution,
            external_last_update: status.external_last_update,
            scraped_at: status.observed_at,
        });

        Ok(row)
    }

    async fn current_status(&self, hospital_id: i64) -> Result<Option<HospitalStatus>> {
        Ok(self.current.read().map_err(poisoned)?.get(&hospital_id).cloned())
    }

    async fn history(&self, hospital_id: i64, limit: usize) -> Result<Vec<HospitalHistory>> {
        Ok(self
            .history
            .read()
            .map_err(poisoned)?
            .iter()
            .rev()
            .filter(|h| h.hospital_id == hospital_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
