//! SQLite-backed implementation of the `LandingRepository` port.
//!
//! Bulk operations are staged in memory and only reach the database on
//! `commit()`, which applies every staged insert, update and delete inside
//! one transaction. A failed commit rolls the transaction back, so the table
//! never reflects half a pass.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use landfall_core::LandingRepository;
use landfall_domain::{LandfallError, MeteoriteLanding, Result as DomainResult};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, Transaction};
use tokio::task;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::manager::{map_sql_error, DbManager};

#[derive(Debug, Clone)]
enum StagedOp {
    Insert(Vec<MeteoriteLanding>),
    Update(Vec<MeteoriteLanding>),
    Delete(Vec<Uuid>),
}

impl StagedOp {
    fn len(&self) -> usize {
        match self {
            Self::Insert(records) | Self::Update(records) => records.len(),
            Self::Delete(ids) => ids.len(),
        }
    }
}

/// Rows affected by one commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// SQLite repository for meteorite landings.
pub struct SqliteLandingRepository {
    db: Arc<DbManager>,
    staged: Mutex<Vec<StagedOp>>,
}

impl SqliteLandingRepository {
    /// Create a repository backed by the shared pool.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db, staged: Mutex::new(Vec::new()) }
    }

    fn stage(&self, op: StagedOp) {
        if op.len() > 0 {
            self.staged.lock().push(op);
        }
    }

    fn fetch_all(conn: &Connection) -> DomainResult<Vec<MeteoriteLanding>> {
        let mut stmt = conn.prepare(LANDING_SELECT_ALL_QUERY).map_err(map_sql_error)?;
        let rows = stmt.query_map([], map_landing_row).map_err(map_sql_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
    }

    fn apply(tx: &Transaction<'_>, ops: &[StagedOp]) -> rusqlite::Result<CommitSummary> {
        let mut summary = CommitSummary::default();
        let mut insert = tx.prepare(LANDING_INSERT_SQL)?;
        let mut update = tx.prepare(LANDING_UPDATE_SQL)?;
        let mut delete = tx.prepare(LANDING_DELETE_SQL)?;

        for op in ops {
            match op {
                StagedOp::Insert(records) => {
                    for r in records {
                        insert.execute(params![
                            r.id.to_string(),
                            r.external_id,
                            r.name,
                            r.name_type,
                            r.rec_class,
                            r.mass,
                            r.fall,
                            r.year,
                            r.reclat,
                            r.reclong,
                            r.geolocation,
                            format_timestamp(r.created_at),
                            format_timestamp(r.updated_at),
                        ])?;
                        summary.inserted += 1;
                    }
                }
                StagedOp::Update(records) => {
                    for r in records {
                        summary.updated += update.execute(params![
                            r.id.to_string(),
                            r.name,
                            r.name_type,
                            r.rec_class,
                            r.mass,
                            r.fall,
                            r.year,
                            r.reclat,
                            r.reclong,
                            r.geolocation,
                            format_timestamp(r.updated_at),
                        ])?;
                    }
                }
                StagedOp::Delete(ids) => {
                    for id in ids {
                        summary.deleted += delete.execute(params![id.to_string()])?;
                    }
                }
            }
        }

        Ok(summary)
    }
}

#[async_trait]
impl LandingRepository for SqliteLandingRepository {
    async fn read_all(&self) -> DomainResult<Vec<MeteoriteLanding>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<MeteoriteLanding>> {
            let conn = db.get_connection()?;
            Self::fetch_all(&conn)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn bulk_insert(&self, records: &[MeteoriteLanding]) -> DomainResult<()> {
        self.stage(StagedOp::Insert(records.to_vec()));
        Ok(())
    }

    async fn bulk_update(&self, records: &[MeteoriteLanding]) -> DomainResult<()> {
        self.stage(StagedOp::Update(records.to_vec()));
        Ok(())
    }

    async fn bulk_delete(&self, records: &[MeteoriteLanding]) -> DomainResult<()> {
        self.stage(StagedOp::Delete(records.iter().map(|r| r.id).collect()));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn commit(&self) -> DomainResult<()> {
        let ops: Vec<StagedOp> = std::mem::take(&mut *self.staged.lock());
        if ops.is_empty() {
            debug!("nothing staged, commit skipped");
            return Ok(());
        }

        let db = Arc::clone(&self.db);
        let summary = task::spawn_blocking(move || -> DomainResult<CommitSummary> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            let summary = Self::apply(&tx, &ops).map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(summary)
        })
        .await
        .map_err(map_join_error)??;

        debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            "staged changes committed"
        );
        Ok(())
    }

    async fn discard_pending(&self) -> DomainResult<()> {
        let dropped = std::mem::take(&mut *self.staged.lock());
        if !dropped.is_empty() {
            warn!(operations = dropped.len(), "discarding staged changes");
        }
        Ok(())
    }
}

const LANDING_INSERT_SQL: &str = "INSERT INTO meteorite_landings (
        id, external_id, name, name_type, rec_class, mass, fall, year,
        reclat, reclong, geolocation, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

const LANDING_UPDATE_SQL: &str = "UPDATE meteorite_landings SET
        name = ?2, name_type = ?3, rec_class = ?4, mass = ?5, fall = ?6, year = ?7,
        reclat = ?8, reclong = ?9, geolocation = ?10, updated_at = ?11
    WHERE id = ?1";

const LANDING_DELETE_SQL: &str = "DELETE FROM meteorite_landings WHERE id = ?1";

const LANDING_SELECT_ALL_QUERY: &str = "SELECT id, external_id, name, name_type, rec_class,
        mass, fall, year, reclat, reclong, geolocation, created_at, updated_at
    FROM meteorite_landings
    ORDER BY external_id";

fn map_landing_row(row: &Row<'_>) -> rusqlite::Result<MeteoriteLanding> {
    Ok(MeteoriteLanding {
        id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        name_type: row.get(3)?,
        rec_class: row.get(4)?,
        mass: row.get(5)?,
        fall: row.get(6)?,
        year: row.get(7)?,
        reclat: row.get(8)?,
        reclong: row.get(9)?,
        geolocation: row.get(10)?,
        created_at: parse_timestamp(11, &row.get::<_, String>(11)?)?,
        updated_at: parse_timestamp(12, &row.get::<_, String>(12)?)?,
    })
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

fn parse_uuid(column: usize, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

fn map_join_error(err: task::JoinError) -> LandfallError {
    LandfallError::Internal(format!("blocking database task failed: {err}"))
}
