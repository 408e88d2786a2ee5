//! The alarm collection as the engine sees it.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Alarm;

/// Partial update applied to an alarm's boolean flags. Unset fields are left
/// untouched, so engine writes stay idempotent under concurrent user edits.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlarmFlags {
    pub enabled: Option<bool>,
    pub triggered: Option<bool>,
}

impl AlarmFlags {
    pub fn enabled(value: bool) -> Self {
        Self {
            enabled: Some(value),
            ..Default::default()
        }
    }

    pub fn triggered(value: bool) -> Self {
        Self {
            triggered: Some(value),
            ..Default::default()
        }
    }
}

/// Owner-scoped access to the alarm document collection.
///
/// The engine only ever reads alarms and flips flags; creation, editing and
/// deletion belong to the host's screens.
#[async_trait]
pub trait AlarmStore: Send + Sync {
    async fn query_enabled_alarms(&self, owner_id: &str) -> Result<Vec<Alarm>>;

    async fn update_alarm_flags(&self, alarm_id: &str, flags: AlarmFlags) -> Result<()>;
}
