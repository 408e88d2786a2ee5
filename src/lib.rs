//! daybreak: an alarm-clock engine with mission-gated dismissal.
//!
//! The engine polls a user-scoped alarm store once a minute, rings the
//! first due alarm over an exclusive sound/vibration handle, and refuses to
//! go quiet until the user solves a small challenge (a math problem or a
//! typing test). Hosts wire in a store, an identity source and an alert
//! resource, then render off the engine's event stream.

pub mod alert;
pub mod challenge;
pub mod db;
pub mod engine;
pub mod events;
pub mod identity;
pub mod models;
pub mod schedule;
pub mod settings;
pub mod store;
mod utils;

pub use alert::{AlertHandle, AlertResource, ReleaseOutcome, ToneKind, VIBRATION_PATTERN_MS};
pub use challenge::{Challenge, ChallengeView, Submission};
pub use db::Database;
pub use engine::AlarmEngine;
pub use events::EngineEvent;
pub use identity::{Identity, IdentityProvider, SessionIdentity};
pub use models::{Alarm, AlarmDraft, MissionKind, RepeatDays};
pub use schedule::should_fire;
pub use settings::{AlertSettings, EngineSettings, SettingsStore};
pub use store::{AlarmFlags, AlarmStore};
