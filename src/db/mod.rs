//! SQLite-backed alarm store.
//!
//! The connection lives on a dedicated worker thread; callers hand it
//! closures over an mpsc channel and await the reply on a oneshot. This
//! keeps the blocking rusqlite work off the async runtime.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, Row};
use tokio::sync::oneshot;
use uuid::Uuid;

mod migrations;

use crate::models::{Alarm, AlarmDraft, MissionKind, RepeatDays};
use crate::store::{AlarmFlags, AlarmStore};
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("failed to send shutdown to alarm store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("failed to join alarm store thread: {join_err:?}");
            }
        }
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn row_to_alarm(row: &Row) -> Result<Alarm> {
    let scheduled_at: String = row.get("scheduled_at")?;
    let repeat_days: String = row.get("repeat_days")?;
    let mission: String = row.get("mission")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Alarm {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        scheduled_at: parse_datetime(&scheduled_at)?,
        repeat_days: serde_json::from_str::<RepeatDays>(&repeat_days)
            .with_context(|| format!("invalid repeat_days '{repeat_days}'"))?,
        mission: MissionKind::parse(&mission),
        label: row.get("label")?,
        enabled: row.get("enabled")?,
        triggered: row.get("triggered")?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

const ALARM_COLUMNS: &str =
    "id, owner_id, scheduled_at, repeat_days, mission, label, enabled, triggered, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("daybreak-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(
                            Err(anyhow::Error::new(err).context("failed to open SQLite database")),
                        );
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("alarm store thread shutting down");
            })
            .with_context(|| "failed to spawn alarm store worker thread")?;

        ready_rx
            .recv()
            .context("alarm store worker exited before signaling readiness")??;

        info!("alarm store initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("store caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to alarm store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("alarm store thread terminated unexpectedly"))?
    }

    /// Create an alarm from user-editable fields, assigning id and
    /// timestamps.
    pub async fn create_alarm(&self, draft: AlarmDraft) -> Result<Alarm> {
        let now = Utc::now();
        let alarm = Alarm {
            id: Uuid::new_v4().to_string(),
            owner_id: draft.owner_id,
            scheduled_at: draft.scheduled_at,
            repeat_days: draft.repeat_days,
            mission: draft.mission,
            label: draft.label,
            enabled: draft.enabled,
            triggered: false,
            created_at: now,
            updated_at: now,
        };

        let record = alarm.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO alarms (id, owner_id, scheduled_at, repeat_days, mission, label, enabled, triggered, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id,
                    record.owner_id,
                    record.scheduled_at.to_rfc3339(),
                    serde_json::to_string(&record.repeat_days)?,
                    record.mission.as_str(),
                    record.label,
                    record.enabled,
                    record.triggered,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert alarm")?;
            Ok(())
        })
        .await?;

        Ok(alarm)
    }

    /// Apply a user edit to the alarm's editable fields.
    pub async fn update_alarm(&self, alarm: &Alarm) -> Result<()> {
        let record = alarm.clone();
        let updated_at = Utc::now();
        self.execute(move |conn| {
            let rows = conn.execute(
                "UPDATE alarms
                 SET scheduled_at = ?1,
                     repeat_days = ?2,
                     mission = ?3,
                     label = ?4,
                     enabled = ?5,
                     updated_at = ?6
                 WHERE id = ?7",
                params![
                    record.scheduled_at.to_rfc3339(),
                    serde_json::to_string(&record.repeat_days)?,
                    record.mission.as_str(),
                    record.label,
                    record.enabled,
                    updated_at.to_rfc3339(),
                    record.id,
                ],
            )
            .with_context(|| "failed to update alarm")?;

            if rows == 0 {
                return Err(anyhow!("alarm {} not found", record.id));
            }
            Ok(())
        })
        .await
    }

    pub async fn set_alarm_enabled(&self, alarm_id: &str, enabled: bool) -> Result<()> {
        self.update_alarm_flags(alarm_id, AlarmFlags::enabled(enabled))
            .await
    }

    pub async fn delete_alarm(&self, alarm_id: &str) -> Result<()> {
        let alarm_id = alarm_id.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM alarms WHERE id = ?1", params![alarm_id])
                .with_context(|| "failed to delete alarm")?;
            Ok(())
        })
        .await
    }

    pub async fn get_alarm(&self, alarm_id: &str) -> Result<Option<Alarm>> {
        let alarm_id = alarm_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALARM_COLUMNS} FROM alarms WHERE id = ?1"
            ))?;

            let mut rows = stmt.query(params![alarm_id])?;
            let alarm = match rows.next()? {
                Some(row) => Some(row_to_alarm(row)?),
                None => None,
            };
            Ok(alarm)
        })
        .await
    }

    /// Every alarm owned by `owner_id`, enabled or not, for the host's list
    /// screen.
    pub async fn list_alarms(&self, owner_id: &str) -> Result<Vec<Alarm>> {
        let owner_id = owner_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALARM_COLUMNS} FROM alarms
                 WHERE owner_id = ?1
                 ORDER BY scheduled_at ASC"
            ))?;

            let mut rows = stmt.query(params![owner_id])?;
            let mut alarms = Vec::new();
            while let Some(row) = rows.next()? {
                alarms.push(row_to_alarm(row)?);
            }
            Ok(alarms)
        })
        .await
    }
}

#[async_trait]
impl AlarmStore for Database {
    async fn query_enabled_alarms(&self, owner_id: &str) -> Result<Vec<Alarm>> {
        let owner_id = owner_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALARM_COLUMNS} FROM alarms
                 WHERE owner_id = ?1 AND enabled = 1
                 ORDER BY scheduled_at ASC"
            ))?;

            let mut rows = stmt.query(params![owner_id])?;
            let mut alarms = Vec::new();
            while let Some(row) = rows.next()? {
                alarms.push(row_to_alarm(row)?);
            }
            Ok(alarms)
        })
        .await
    }

    async fn update_alarm_flags(&self, alarm_id: &str, flags: AlarmFlags) -> Result<()> {
        let alarm_id = alarm_id.to_string();
        let updated_at = Utc::now();
        self.execute(move |conn| {
            let rows = conn.execute(
                "UPDATE alarms
                 SET enabled = COALESCE(?1, enabled),
                     triggered = COALESCE(?2, triggered),
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    flags.enabled,
                    flags.triggered,
                    updated_at.to_rfc3339(),
                    alarm_id,
                ],
            )
            .with_context(|| "failed to update alarm flags")?;

            if rows == 0 {
                return Err(anyhow!("alarm {alarm_id} not found"));
            }
            Ok(())
        })
        .await
    }
}
