use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use log::{error, info, warn};
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    alert::AlertResource,
    challenge::{Challenge, ChallengeView, Submission},
    events::EngineEvent,
    identity::IdentityProvider,
    models::Alarm,
    schedule::should_fire,
    store::{AlarmFlags, AlarmStore},
};

use super::poller::poll_loop;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEBUG_POLL_INTERVAL: Duration = Duration::from_secs(2);
const EVENT_CAPACITY: usize = 16;

/// Runtime record of a ringing, not-yet-dismissed alarm.
pub(crate) struct ActiveTrigger {
    pub alarm: Alarm,
    pub challenge: Challenge,
    pub silent: bool,
}

struct PollerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// The trigger engine: polls the store for due alarms, owns the ringing
/// lifecycle, and gates dismissal behind the mission challenge.
///
/// The poll loop exits when an alarm triggers and is respawned on dismissal,
/// so at most one alarm is ever being handled; a foreground `check_now` is
/// additionally guarded against the active trigger, so racing evaluations
/// cannot stack a second one.
#[derive(Clone)]
pub struct AlarmEngine {
    store: Arc<dyn AlarmStore>,
    identity: Arc<dyn IdentityProvider>,
    alert: Arc<dyn AlertResource>,
    active: Arc<Mutex<Option<ActiveTrigger>>>,
    poller: Arc<Mutex<Option<PollerHandle>>>,
    watcher: Arc<Mutex<Option<JoinHandle<()>>>>,
    events: broadcast::Sender<EngineEvent>,
    wake: Arc<Notify>,
    poll_interval: Duration,
}

impl AlarmEngine {
    pub fn new(
        store: Arc<dyn AlarmStore>,
        identity: Arc<dyn IdentityProvider>,
        alert: Arc<dyn AlertResource>,
    ) -> Self {
        let debug_mode = std::env::var("DAYBREAK_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            store,
            identity,
            alert,
            active: Arc::new(Mutex::new(None)),
            poller: Arc::new(Mutex::new(None)),
            watcher: Arc::new(Mutex::new(None)),
            events,
            wake: Arc::new(Notify::new()),
            poll_interval: if debug_mode {
                DEBUG_POLL_INTERVAL
            } else {
                DEFAULT_POLL_INTERVAL
            },
        }
    }

    /// Override the poll cadence. Call before `start`.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Start following identity changes and, if someone is signed in, begin
    /// polling. An immediate first check mirrors the mobile app's check on
    /// mount.
    pub async fn start(&self) {
        self.spawn_identity_watcher().await;
        if self.identity.current_identity().is_some() {
            self.spawn_poller().await;
            self.wake.notify_one();
        }
    }

    /// Stop everything: poll loop, identity watcher, and any ringing alarm.
    /// Safe to call with a trigger in flight; no sound survives the engine.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.watcher.lock().await.take() {
            handle.abort();
        }
        self.cancel_poller().await;
        self.abort_active().await;
    }

    /// Force one evaluation pass outside the periodic cadence. The host
    /// calls this on app-foreground transitions to catch alarms due while
    /// the process was backgrounded. A no-op while an alarm is ringing.
    pub async fn check_now(&self) {
        if self.active.lock().await.is_some() {
            return;
        }
        self.wake.notify_one();
    }

    /// Whether an alarm is ringing and awaiting dismissal. The host uses
    /// this to block navigation away from the dismissal screen.
    pub async fn is_busy(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// What the dismissal screen should render, if an alarm is ringing.
    pub async fn active_challenge(&self) -> Option<ChallengeView> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|trigger| trigger.challenge.view())
    }

    /// The ringing alarm, if any, and whether it is ringing silently
    /// because the sound resource could not be acquired.
    pub async fn active_alarm(&self) -> Option<(Alarm, bool)> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|trigger| (trigger.alarm.clone(), trigger.silent))
    }

    /// Submit one answer to the active challenge. On success the dismissal
    /// procedure runs before this returns: sound released, one-time alarms
    /// disabled, polling restarted.
    pub async fn submit_answer(&self, answer: &str) -> Result<Submission> {
        let mut guard = self.active.lock().await;
        let outcome = match guard.as_mut() {
            Some(trigger) => trigger.challenge.submit(answer),
            None => return Err(anyhow!("no alarm is ringing")),
        };

        if outcome == Submission::Satisfied {
            // Taking the trigger out makes completion exactly-once even if
            // two submission paths race on the satisfied challenge.
            if let Some(trigger) = guard.take() {
                drop(guard);
                self.dismiss(trigger).await;
            }
        }

        Ok(outcome)
    }

    /// One evaluation pass: find the first due alarm and trigger it.
    /// Returns true when an alarm triggered, which ends the caller's loop.
    pub(crate) async fn evaluate_pass(&self, now: DateTime<Local>) -> bool {
        if self.active.lock().await.is_some() {
            // An alarm is already being handled; never stack a second one.
            return false;
        }

        let Some(identity) = self.identity.current_identity() else {
            info!("no signed-in identity, skipping alarm check");
            return false;
        };

        let alarms = match self.store.query_enabled_alarms(&identity.user_id).await {
            Ok(alarms) => alarms,
            Err(err) => {
                // Background failure: logged and retried on the next cycle.
                error!("failed to query alarms: {err:#}");
                return false;
            }
        };

        for alarm in alarms {
            if should_fire(&alarm, &now) {
                info!("alarm {} ({}) is due", alarm.id, alarm.label);
                self.trigger_alarm(alarm).await;
                // Only the first match triggers in a pass.
                return true;
            }
        }

        false
    }

    async fn trigger_alarm(&self, alarm: Alarm) {
        let silent = match self.alert.acquire() {
            Ok(()) => false,
            Err(err) => {
                // A failed sound must never block dismissal; the alarm rings
                // silently and the host is told via the event.
                error!("failed to start alarm sound: {err}");
                true
            }
        };

        let challenge = Challenge::generate(alarm.mission);
        let mission = alarm.mission;

        {
            let mut active = self.active.lock().await;
            *active = Some(ActiveTrigger {
                alarm: alarm.clone(),
                challenge,
                silent,
            });
        }

        if alarm.is_one_time() {
            if let Err(err) = self
                .store
                .update_alarm_flags(&alarm.id, AlarmFlags::triggered(true))
                .await
            {
                warn!("failed to mark alarm {} triggered: {err:#}", alarm.id);
            }
        }

        let _ = self.events.send(EngineEvent::AlarmTriggered {
            alarm,
            mission,
            silent,
        });
    }

    async fn dismiss(&self, trigger: ActiveTrigger) {
        if let Err(err) = self.alert.release() {
            // Logged, not fatal; the rest of dismissal still runs.
            error!("failed to stop alarm sound: {err}");
        }

        if trigger.alarm.is_one_time() {
            if let Err(err) = self
                .store
                .update_alarm_flags(&trigger.alarm.id, AlarmFlags::enabled(false))
                .await
            {
                warn!(
                    "failed to disable one-time alarm {}: {err:#}",
                    trigger.alarm.id
                );
            }
        }

        let _ = self.events.send(EngineEvent::MissionSatisfied {
            alarm_id: trigger.alarm.id.clone(),
        });

        if self.identity.current_identity().is_some() {
            self.spawn_poller().await;
        }
    }

    pub(crate) async fn spawn_poller(&self) {
        let mut guard = self.poller.lock().await;
        if let Some(handle) = guard.take() {
            handle.cancel.cancel();
            handle.task.abort();
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            self.clone(),
            self.wake.clone(),
            cancel.clone(),
        ));
        *guard = Some(PollerHandle { cancel, task });
    }

    async fn cancel_poller(&self) {
        if let Some(handle) = self.poller.lock().await.take() {
            handle.cancel.cancel();
            handle.task.abort();
        }
    }

    /// Drop any in-flight trigger and force the alert resource released.
    async fn abort_active(&self) {
        self.active.lock().await.take();
        if let Err(err) = self.alert.release() {
            error!("failed to release alert resource on teardown: {err}");
        }
    }

    #[cfg(test)]
    pub(crate) async fn active_expected_answer(&self) -> Option<String> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|trigger| trigger.challenge.expected_answer().to_string())
    }

    async fn spawn_identity_watcher(&self) {
        let mut guard = self.watcher.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }

        let engine = self.clone();
        let mut rx = self.identity.subscribe();
        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let signed_in = rx.borrow_and_update().is_some();
                if signed_in {
                    info!("identity signed in, starting alarm polling");
                    engine.spawn_poller().await;
                    engine.wake.notify_one();
                } else {
                    info!("identity signed out, stopping alarm polling");
                    engine.cancel_poller().await;
                    engine.abort_active().await;
                }
            }
        });
        *guard = Some(handle);
    }
}
