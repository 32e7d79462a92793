//! PostgreSQL backend
//!
//! Pooled through deadpool; every `persist_status` runs in its own
//! transaction so concurrent jobs for different hospitals never share one.

use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_postgres::{
    Config as PoolConfig, ManagerConfig, Pool, PoolConfig as SizeConfig, RecyclingMethod, Runtime,
};
use tokio_postgres::{NoTls, Row};

use super::{to_count, HospitalDirectory, StatusStore};
use crate::models::{
    ColorCode, ColorCodeDistribution, HospitalHistory, HospitalIdentity, HospitalStatus,
    HospitalStatusCreate,
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS hospitals (
        id BIGINT PRIMARY KEY,
        name TEXT NOT NULL,
        department TEXT NOT NULL DEFAULT '',
        city TEXT NOT NULL,
        province TEXT NOT NULL,
        address TEXT,
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION
    );

    CREATE TABLE IF NOT EXISTS hospital_status (
        hospital_id BIGINT PRIMARY KEY,
        color_code TEXT NOT NULL,
        waiting_time BIGINT NOT NULL,
        patients_waiting BIGINT NOT NULL,
        available_beds BIGINT NOT NULL,
        red BIGINT NOT NULL DEFAULT 0,
        orange BIGINT NOT NULL DEFAULT 0,
        blue BIGINT NOT NULL DEFAULT 0,
        green BIGINT NOT NULL DEFAULT 0,
        white BIGINT NOT NULL DEFAULT 0,
        external_last_update TIMESTAMP,
        last_updated TIMESTAMPTZ NOT NULL
    );

    CREATE TABLE IF NOT EXISTS hospital_history (
        id BIGSERIAL PRIMARY KEY,
        hospital_id BIGINT NOT NULL,
        color_code TEXT NOT NULL,
        waiting_time BIGINT NOT NULL,
        patients_waiting BIGINT NOT NULL,
        available_beds BIGINT NOT NULL,
        red BIGINT NOT NULL DEFAULT 0,
        orange BIGINT NOT NULL DEFAULT 0,
        blue BIGINT NOT NULL DEFAULT 0,
        green BIGINT NOT NULL DEFAULT 0,
        white BIGINT NOT NULL DEFAULT 0,
        external_last_update TIMESTAMP,
        scraped_at TIMESTAMPTZ NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_history_hospital_time
        ON hospital_history(hospital_id, scraped_at DESC);
"#;

const STATUS_COLUMNS: &str = "hospital_id, color_code, waiting_time, patients_waiting, \
     available_beds, red, orange, blue, green, white, external_last_update";

pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Build the pool and create the schema
    pub async fn connect(url: &str, pool_size: usize) -> Result<Self> {
        let mut cfg = PoolConfig::new();
        cfg.url = Some(url.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(SizeConfig::new(pool_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("Failed to create PostgreSQL connection pool")?;

        let client = pool.get().await.context("Failed to connect to PostgreSQL")?;
        client
            .batch_execute(SCHEMA)
            .await
            .context("Failed to create PostgreSQL schema")?;

        tracing::info!(pool_size = pool_size, "PostgreSQL store initialized");
        Ok(Self { pool })
    }

    async fn client(&self) -> Result<deadpool_postgres::Client> {
        self.pool.get().await.context("Failed to get PostgreSQL connection")
    }
}

fn distribution(row: &Row, idx: usize) -> ColorCodeDistribution {
    ColorCodeDistribution {
        red: to_count(row.get(idx)),
        orange: to_count(row.get(idx + 1)),
        blue: to_count(row.get(idx + 2)),
        green: to_count(row.get(idx + 3)),
        white: to_count(row.get(idx + 4)),
    }
}

fn color(row: &Row, idx: usize) -> ColorCode {
    row.get::<_, String>(idx).parse().unwrap_or(ColorCode::Unknown)
}

fn hospital_from_row(row: &Row) -> HospitalIdentity {
    HospitalIdentity {
        id: row.get(0),
        name: row.get(1),
        department: row.get(2),
        city: row.get(3),
        province: row.get(4),
        address: row.get(5),
        latitude: row.get(6),
        longitude: row.get(7),
    }
}

#[async_trait]
impl HospitalDirectory for PostgresStore {
    async fn list_hospitals(&self) -> Result<Vec<HospitalIdentity>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT id, name, department, city, province, address, latitude, longitude
                 FROM hospitals ORDER BY id",
                &[],
            )
            .await
            .context("Failed to list hospitals")?;
        Ok(rows.iter().map(hospital_from_row).collect())
    }

    async fn get_hospital(&self, id: i64) -> Result<Option<HospitalIdentity>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT id, name, department, city, province, address, latitude, longitude
                 FROM hospitals WHERE id = $1",
                &[&id],
            )
            .await
            .context("Failed to get hospital")?;
        Ok(row.as_ref().map(hospital_from_row))
    }

    async fn upsert_hospital(&self, hospital: &HospitalIdentity) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                r#"
                INSERT INTO hospitals (id, name, department, city, province, address, latitude, longitude)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    department = EXCLUDED.department,
                    city = EXCLUDED.city,
                    province = EXCLUDED.province,
                    address = EXCLUDED.address,
                    latitude = EXCLUDED.latitude,
                    longitude = EXCLUDED.longitude
                "#,
                &[
                    &hospital.id,
                    &hospital.name,
                    &hospital.department,
                    &hospital.city,
                    &hospital.province,
                    &hospital.address,
                    &hospital.latitude,
                    &hospital.longitude,
                ],
            )
            .await
            .context("Failed to upsert hospital")?;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for PostgresStore {
    async fn persist_status(&self, status: &HospitalStatusCreate) -> Result<HospitalStatus> {
        let mut client = self.client().await?;
        let tx = client
            .transaction()
            .await
            .context("Failed to begin transaction")?;

        let dist = &status.color_distribution;
        let color_code = status.color_code.as_str();
        let counts: [i64; 8] = [
            i64::from(status.waiting_time),
            i64::from(status.patients_waiting),
            i64::from(status.available_beds),
            i64::from(dist.red),
            i64::from(dist.orange),
            i64::from(dist.blue),
            i64::from(dist.green),
            i64::from(dist.white),
        ];
        let params: [&(dyn tokio_postgres::types::ToSql + Sync); 12] = [
            &status.hospital_id,
            &color_code,
            &counts[0],
            &counts[1],
            &counts[2],
            &counts[3],
            &counts[4],
            &counts[5],
            &counts[6],
            &counts[7],
            &status.external_last_update,
            &status.observed_at,
        ];

        tx.execute(
            &format!(
                "INSERT INTO hospital_status ({STATUS_COLUMNS}, last_updated)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                 ON CONFLICT (hospital_id) DO UPDATE SET
                    color_code = EXCLUDED.color_code,
                    waiting_time = EXCLUDED.waiting_time,
                    patients_waiting = EXCLUDED.patients_waiting,
                    available_beds = EXCLUDED.available_beds,
                    red = EXCLUDED.red,
                    orange = EXCLUDED.orange,
                    blue = EXCLUDED.blue,
                    green = EXCLUDED.green,
                    white = EXCLUDED.white,
                    external_last_update = EXCLUDED.external_last_update,
                    last_updated = EXCLUDED.last_updated"
            ),
            &params,
        )
        .await
        .context("Failed to upsert current status")?;

        tx.execute(
            &format!(
                "INSERT INTO hospital_history ({STATUS_COLUMNS}, scraped_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
            ),
            &params,
        )
        .await
        .context("Failed to append history")?;

        tx.commit().await.context("Failed to commit status")?;

        Ok(HospitalStatus::from_create(status))
    }

    async fn current_status(&self, hospital_id: i64) -> Result<Option<HospitalStatus>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {STATUS_COLUMNS}, last_updated FROM hospital_status WHERE hospital_id = $1"
                ),
                &[&hospital_id],
            )
            .await
            .context("Failed to read current status")?;

        Ok(row.map(|row| HospitalStatus {
            hospital_id: row.get(0),
            color_code: color(&row, 1),
            waiting_time: to_count(row.get(2)),
            patients_waiting: to_count(row.get(3)),
            available_beds: to_count(row.get(4)),
            color_distribution: distribution(&row, 5),
            external_last_update: row.get(10),
            last_updated: row.get(11),
        }))
    }

    async fn history(&self, hospital_id: i64, limit: usize) -> Result<Vec<HospitalHistory>> {
        let client = self.client().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = client
            .query(
                &format!(
                    "SELECT id, {STATUS_COLUMNS}, scraped_at FROM hospital_history
                     WHERE hospital_id = $1 ORDER BY id DESC LIMIT $2"
                ),
                &[&hospital_id, &limit],
            )
            .await
            .context("Failed to read history")?;

        Ok(rows
            .iter()
            .map(|row| HospitalHistory {
                id: row.get(0),
                hospital_id: row.get(1),
                color_code: color(row, 2),
                waiting_time: to_count(row.get(3)),
                patients_waiting: to_count(row.get(4)),
                available_beds: to_count(row.get(5)),
                color_distribution: distribution(row, 6),
                external_last_update: row.get(11),
                scraped_at: row.get(12),
            })
            .collect())
    }
}
