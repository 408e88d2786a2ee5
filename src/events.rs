//! Engine-to-host notifications.
//!
//! Strictly one-way: the host subscribes and renders; the engine never
//! reaches back into host state.

use serde::Serialize;

use crate::models::{Alarm, MissionKind};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// An alarm fired; the host must show the dismissal screen and keep it
    /// up until the mission is solved. `silent` is set when the sound
    /// resource could not be acquired; the alarm still rings visually.
    AlarmTriggered {
        alarm: Alarm,
        mission: MissionKind,
        silent: bool,
    },
    /// The dismissal challenge was solved; the host may close the screen.
    MissionSatisfied { alarm_id: String },
}
