//! # fv-store-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `fv-core` domain models.

use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use fv_core::models::{
    Deadline, DeadlineRow, DeadlineType, JoinedTypeName, Machine, MachineDraft, NewDeadline, TypeJoin,
};
use fv_core::traits::FleetStore;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

pub struct SqliteFleetStore {
    pool: SqlitePool,
}

// Helpers for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> anyhow::Result<Uuid> {
    Uuid::from_slice(blob).context("malformed uuid column")
}

impl SqliteFleetStore {
    /// Opens (creating if missing) the database at `url` and runs migrations.
    /// `sqlite::memory:` gives a private database on a single connection.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url {url:?}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("failed to open sqlite database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run migrations")?;
        tracing::info!("sqlite fleet store ready");

        Ok(Self { pool })
    }
}

fn machine_from_row(row: &SqliteRow) -> anyhow::Result<Machine> {
    Ok(Machine {
        id: blob_to_uuid(row.try_get::<Vec<u8>, _>("id")?.as_slice())?,
        name: row.try_get("name")?,
        machine_type: row.try_get("type")?,
        brand: row.try_get("brand")?,
        model: row.try_get("model")?,
        plate_number: row.try_get("plate_number")?,
        status: row.try_get("status")?,
    })
}

fn frequency_from_row(row: &SqliteRow) -> anyhow::Result<u32> {
    let raw: i64 = row.try_get("frequency_days")?;
    u32::try_from(raw).with_context(|| format!("frequency_days out of range: {raw}"))
}

fn deadline_row_from_row(row: &SqliteRow) -> anyhow::Result<DeadlineRow> {
    let type_name: Option<String> = row.try_get("type_name")?;
    Ok(DeadlineRow {
        id: blob_to_uuid(row.try_get::<Vec<u8>, _>("id")?.as_slice())?,
        machine_id: blob_to_uuid(row.try_get::<Vec<u8>, _>("machine_id")?.as_slice())?,
        type_id: blob_to_uuid(row.try_get::<Vec<u8>, _>("type_id")?.as_slice())?,
        last_performed: row.try_get::<NaiveDate, _>("date")?,
        frequency_days: frequency_from_row(row)?,
        deadline_types: type_name.map(|name| TypeJoin::One(JoinedTypeName { name })),
    })
}

const SELECT_DEADLINES: &str = "SELECT d.id, d.machine_id, d.type_id, d.date, d.frequency_days, t.name AS type_name \
     FROM deadlines d LEFT JOIN deadline_types t ON t.id = d.type_id";

#[async_trait]
impl FleetStore for SqliteFleetStore {
    async fn list_machines(&self) -> anyhow::Result<Vec<Machine>> {
        let rows = sqlx::query("SELECT * FROM machines ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(machine_from_row).collect()
    }

    async fn insert_machine(&self, draft: MachineDraft) -> anyhow::Result<Machine> {
        let machine = draft.into_machine(Uuid::now_v7());
        sqlx::query("INSERT INTO machines (id, name, type, brand, model, plate_number, status) VALUES (?, ?, ?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(machine.id))
            .bind(&machine.name)
            .bind(&machine.machine_type)
            .bind(&machine.brand)
            .bind(&machine.model)
            .bind(&machine.plate_number)
            .bind(&machine.status)
            .execute(&self.pool)
            .await?;
        Ok(machine)
    }

    async fn update_machine(&self, machine: Machine) -> anyhow::Result<Option<Machine>> {
        let result = sqlx::query("UPDATE machines SET name = ?, type = ?, brand = ?, model = ?, plate_number = ?, status = ? WHERE id = ?")
            .bind(&machine.name)
            .bind(&machine.machine_type)
            .bind(&machine.brand)
            .bind(&machine.model)
            .bind(&machine.plate_number)
            .bind(&machine.status)
            .bind(uuid_to_blob(machine.id))
            .execute(&self.pool)
            .await?;
        Ok((result.rows_affected() > 0).then_some(machine))
    }

    /// Deletes the machine's deadlines and then the machine in one transaction,
    /// so a failure part-way leaves both tables untouched.
    async fn delete_machine(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM deadlines WHERE machine_id = ?")
            .bind(uuid_to_blob(id))
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM machines WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn list_deadline_types(&self) -> anyhow::Result<Vec<DeadlineType>> {
        let rows = sqlx::query("SELECT id, name FROM deadline_types ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(DeadlineType {
                    id: blob_to_uuid(row.try_get::<Vec<u8>, _>("id")?.as_slice())?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn insert_deadline_type(&self, name: String) -> anyhow::Result<DeadlineType> {
        let created = DeadlineType { id: Uuid::now_v7(), name };
        sqlx::query("INSERT INTO deadline_types (id, name) VALUES (?, ?)")
            .bind(uuid_to_blob(created.id))
            .bind(&created.name)
            .execute(&self.pool)
            .await?;
        Ok(created)
    }

    async fn delete_deadline_type(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM deadline_types WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_deadlines_of_type(&self, type_id: Uuid) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deadlines WHERE type_id = ?")
            .bind(uuid_to_blob(type_id))
            .fetch_one(&self.pool)
            .await?;
        u64::try_from(count).context("negative deadline count")
    }

    async fn select_deadlines(&self, machine_id: Option<Uuid>) -> anyhow::Result<Vec<DeadlineRow>> {
        let rows = match machine_id {
            Some(id) => {
                let sql = format!("{SELECT_DEADLINES} WHERE d.machine_id = ? ORDER BY d.rowid");
                sqlx::query(&sql)
                    .bind(uuid_to_blob(id))
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("{SELECT_DEADLINES} ORDER BY d.rowid");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };
        rows.iter().map(deadline_row_from_row).collect()
    }

    async fn insert_deadline(&self, deadline: NewDeadline) -> anyhow::Result<Deadline> {
        let created = Deadline {
            id: Uuid::now_v7(),
            machine_id: deadline.machine_id,
            type_id: deadline.type_id,
            last_performed: deadline.last_performed,
            frequency_days: deadline.frequency_days,
        };
        sqlx::query("INSERT INTO deadlines (id, machine_id, type_id, date, frequency_days) VALUES (?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(created.id))
            .bind(uuid_to_blob(created.machine_id))
            .bind(uuid_to_blob(created.type_id))
            .bind(created.last_performed)
            .bind(i64::from(created.frequency_days))
            .execute(&self.pool)
            .await?;
        Ok(created)
    }

    async fn update_deadline(&self, deadline: Deadline) -> anyhow::Result<Option<Deadline>> {
        let result = sqlx::query("UPDATE deadlines SET date = ?, frequency_days = ? WHERE id = ?")
            .bind(deadline.last_performed)
            .bind(i64::from(deadline.frequency_days))
            .bind(uuid_to_blob(deadline.id))
            .execute(&self.pool)
            .await?;
        Ok((result.rows_affected() > 0).then_some(deadline))
    }

    async fn delete_deadline(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM deadlines WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
