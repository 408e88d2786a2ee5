use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex as StdMutex,
};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc, Weekday};

use crate::{
    alert::{AlertResource, ReleaseOutcome},
    challenge::Submission,
    events::EngineEvent,
    identity::{Identity, SessionIdentity},
    models::{Alarm, MissionKind, RepeatDays},
    store::{AlarmFlags, AlarmStore},
};

use super::AlarmEngine;

struct MemoryStore {
    alarms: StdMutex<Vec<Alarm>>,
    queries: AtomicUsize,
    fail_queries: AtomicBool,
}

impl MemoryStore {
    fn new(alarms: Vec<Alarm>) -> Self {
        Self {
            alarms: StdMutex::new(alarms),
            queries: AtomicUsize::new(0),
            fail_queries: AtomicBool::new(false),
        }
    }

    fn get(&self, alarm_id: &str) -> Option<Alarm> {
        self.alarms
            .lock()
            .unwrap()
            .iter()
            .find(|alarm| alarm.id == alarm_id)
            .cloned()
    }
}

#[async_trait]
impl AlarmStore for MemoryStore {
    async fn query_enabled_alarms(&self, owner_id: &str) -> Result<Vec<Alarm>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(anyhow!("store unavailable"));
        }
        Ok(self
            .alarms
            .lock()
            .unwrap()
            .iter()
            .filter(|alarm| alarm.owner_id == owner_id && alarm.enabled)
            .cloned()
            .collect())
    }

    async fn update_alarm_flags(&self, alarm_id: &str, flags: AlarmFlags) -> Result<()> {
        let mut alarms = self.alarms.lock().unwrap();
        let alarm = alarms
            .iter_mut()
            .find(|alarm| alarm.id == alarm_id)
            .ok_or_else(|| anyhow!("alarm {alarm_id} not found"))?;
        if let Some(enabled) = flags.enabled {
            alarm.enabled = enabled;
        }
        if let Some(triggered) = flags.triggered {
            alarm.triggered = triggered;
        }
        Ok(())
    }
}

struct FakeAlert {
    acquires: AtomicUsize,
    releases: AtomicUsize,
    ringing: AtomicBool,
    fail_acquire: AtomicBool,
}

impl FakeAlert {
    fn new() -> Self {
        Self {
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            ringing: AtomicBool::new(false),
            fail_acquire: AtomicBool::new(false),
        }
    }

    fn failing() -> Self {
        let alert = Self::new();
        alert.fail_acquire.store(true, Ordering::SeqCst);
        alert
    }
}

impl AlertResource for FakeAlert {
    fn acquire(&self) -> std::result::Result<(), String> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err("no audio device".to_string());
        }
        self.ringing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) -> std::result::Result<ReleaseOutcome, String> {
        if self.ringing.swap(false, Ordering::SeqCst) {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(ReleaseOutcome::Released)
        } else {
            Ok(ReleaseOutcome::AlreadyIdle)
        }
    }

    fn is_ringing(&self) -> bool {
        self.ringing.load(Ordering::SeqCst)
    }
}

fn local_time(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("unambiguous local time")
}

fn alarm(
    id: &str,
    owner: &str,
    scheduled: DateTime<Local>,
    repeat_days: RepeatDays,
    mission: MissionKind,
) -> Alarm {
    let scheduled_at = scheduled.with_timezone(&Utc);
    Alarm {
        id: id.into(),
        owner_id: owner.into(),
        scheduled_at,
        repeat_days,
        mission,
        label: format!("alarm {id}"),
        enabled: true,
        triggered: false,
        created_at: scheduled_at,
        updated_at: scheduled_at,
    }
}

struct Harness {
    engine: AlarmEngine,
    store: Arc<MemoryStore>,
    alert: Arc<FakeAlert>,
}

fn harness(alarms: Vec<Alarm>, alert: FakeAlert) -> Harness {
    let store = Arc::new(MemoryStore::new(alarms));
    let alert = Arc::new(alert);
    let identity = Arc::new(SessionIdentity::signed_in(Identity::new("u1")));
    let engine = AlarmEngine::new(store.clone(), identity, alert.clone());
    Harness {
        engine,
        store,
        alert,
    }
}

#[tokio::test]
async fn one_time_alarm_rings_and_dismisses_after_retries() {
    // 2026-03-02 07:00 is a Monday.
    let now = local_time(2026, 3, 2, 7, 0);
    let h = harness(
        vec![alarm("a1", "u1", now, RepeatDays::none(), MissionKind::Math)],
        FakeAlert::new(),
    );
    let mut events = h.engine.subscribe();

    assert!(h.engine.evaluate_pass(now).await);
    assert!(h.engine.is_busy().await);
    assert!(h.alert.is_ringing());

    match events.recv().await.unwrap() {
        EngineEvent::AlarmTriggered {
            alarm,
            mission,
            silent,
        } => {
            assert_eq!(alarm.id, "a1");
            assert_eq!(mission, MissionKind::Math);
            assert!(!silent);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Firing marked the one-time alarm triggered right away.
    assert!(h.store.get("a1").unwrap().triggered);
    assert!(h.store.get("a1").unwrap().enabled);

    // Two wrong answers, then the right one.
    assert_eq!(
        h.engine.submit_answer("wrong").await.unwrap(),
        Submission::Incorrect {
            attempts_remaining: 2
        }
    );
    assert_eq!(
        h.engine.submit_answer("also wrong").await.unwrap(),
        Submission::Incorrect {
            attempts_remaining: 1
        }
    );

    let answer = h.engine.active_expected_answer().await.unwrap();
    assert_eq!(
        h.engine.submit_answer(&answer).await.unwrap(),
        Submission::Satisfied
    );

    match events.recv().await.unwrap() {
        EngineEvent::MissionSatisfied { alarm_id } => assert_eq!(alarm_id, "a1"),
        other => panic!("unexpected event: {other:?}"),
    }

    assert!(!h.engine.is_busy().await);
    let stored = h.store.get("a1").unwrap();
    assert!(!stored.enabled);
    assert!(stored.triggered);
    assert_eq!(h.alert.releases.load(Ordering::SeqCst), 1);
    assert!(!h.alert.is_ringing());

    h.engine.shutdown().await;
    // Teardown release is idempotent: the count does not move again.
    assert_eq!(h.alert.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeating_alarm_respects_weekday_set() {
    let monday = local_time(2026, 3, 2, 6, 30);
    let tuesday = local_time(2026, 3, 3, 6, 30);
    let days = RepeatDays::none()
        .with(Weekday::Mon)
        .with(Weekday::Wed)
        .with(Weekday::Fri);
    let h = harness(
        vec![alarm("b1", "u1", monday, days, MissionKind::Typing)],
        FakeAlert::new(),
    );

    assert!(!h.engine.evaluate_pass(tuesday).await);
    assert!(!h.engine.is_busy().await);

    assert!(h.engine.evaluate_pass(monday).await);
    assert!(h.engine.is_busy().await);

    // Dismiss; a repeating alarm stays enabled.
    let answer = h.engine.active_expected_answer().await.unwrap();
    assert_eq!(
        h.engine.submit_answer(&answer).await.unwrap(),
        Submission::Satisfied
    );
    let stored = h.store.get("b1").unwrap();
    assert!(stored.enabled);
    assert!(!stored.triggered);

    h.engine.shutdown().await;
}

#[tokio::test]
async fn silent_alarm_is_still_dismissible() {
    let now = local_time(2026, 3, 2, 7, 0);
    let h = harness(
        vec![alarm("a1", "u1", now, RepeatDays::none(), MissionKind::Typing)],
        FakeAlert::failing(),
    );
    let mut events = h.engine.subscribe();

    assert!(h.engine.evaluate_pass(now).await);
    match events.recv().await.unwrap() {
        EngineEvent::AlarmTriggered { silent, .. } => assert!(silent),
        other => panic!("unexpected event: {other:?}"),
    }

    let (ringing, silent) = h.engine.active_alarm().await.unwrap();
    assert_eq!(ringing.id, "a1");
    assert!(silent);

    // The challenge is presented and solvable despite the dead speaker.
    let view = h.engine.active_challenge().await.unwrap();
    assert_eq!(view.kind, MissionKind::Typing);
    assert_eq!(
        h.engine.submit_answer(&view.prompt).await.unwrap(),
        Submission::Satisfied
    );
    assert!(!h.engine.is_busy().await);

    h.engine.shutdown().await;
}

#[tokio::test]
async fn double_evaluation_does_not_double_trigger() {
    let now = local_time(2026, 3, 2, 7, 0);
    let h = harness(
        vec![alarm("a1", "u1", now, RepeatDays::none(), MissionKind::Math)],
        FakeAlert::new(),
    );

    assert!(h.engine.evaluate_pass(now).await);
    // A second pass in the same minute (tick racing a foreground resume)
    // must be a no-op while the first trigger is live.
    assert!(!h.engine.evaluate_pass(now).await);
    assert_eq!(h.alert.acquires.load(Ordering::SeqCst), 1);

    h.engine.shutdown().await;
}

#[tokio::test]
async fn signed_out_pass_skips_the_store() {
    let now = local_time(2026, 3, 2, 7, 0);
    let store = Arc::new(MemoryStore::new(vec![alarm(
        "a1",
        "u1",
        now,
        RepeatDays::none(),
        MissionKind::Math,
    )]));
    let alert = Arc::new(FakeAlert::new());
    let identity = Arc::new(SessionIdentity::new());
    let engine = AlarmEngine::new(store.clone(), identity, alert.clone());

    assert!(!engine.evaluate_pass(now).await);
    assert_eq!(store.queries.load(Ordering::SeqCst), 0);
    assert_eq!(alert.acquires.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn store_failure_is_swallowed_and_retried_next_cycle() {
    let now = local_time(2026, 3, 2, 7, 0);
    let h = harness(
        vec![alarm("a1", "u1", now, RepeatDays::none(), MissionKind::Math)],
        FakeAlert::new(),
    );
    h.store.fail_queries.store(true, Ordering::SeqCst);

    assert!(!h.engine.evaluate_pass(now).await);
    assert!(!h.engine.is_busy().await);

    // Store recovers; the next pass triggers normally.
    h.store.fail_queries.store(false, Ordering::SeqCst);
    assert!(h.engine.evaluate_pass(now).await);

    h.engine.shutdown().await;
}

#[tokio::test]
async fn only_first_match_triggers_per_pass() {
    let now = local_time(2026, 3, 2, 7, 0);
    let h = harness(
        vec![
            alarm("a1", "u1", now, RepeatDays::none(), MissionKind::Math),
            alarm("a2", "u1", now, RepeatDays::none(), MissionKind::Typing),
        ],
        FakeAlert::new(),
    );

    assert!(h.engine.evaluate_pass(now).await);
    assert_eq!(h.alert.acquires.load(Ordering::SeqCst), 1);
    // The second due alarm was left alone.
    assert!(!h.store.get("a2").unwrap().triggered);

    h.engine.shutdown().await;
}

#[tokio::test]
async fn sign_out_mid_ring_silences_and_stops() {
    let now = local_time(2026, 3, 2, 7, 0);
    let store = Arc::new(MemoryStore::new(vec![alarm(
        "a1",
        "u1",
        now,
        RepeatDays::none(),
        MissionKind::Math,
    )]));
    let alert = Arc::new(FakeAlert::new());
    let session = Arc::new(SessionIdentity::signed_in(Identity::new("u1")));
    let engine = AlarmEngine::new(store.clone(), session.clone(), alert.clone());

    engine.start().await;
    assert!(engine.evaluate_pass(now).await);
    assert!(alert.is_ringing());

    session.sign_out();
    // Give the identity watcher a chance to run.
    tokio::time::timeout(Duration::from_secs(2), async {
        while engine.is_busy().await || alert.is_ringing() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("sign-out should silence and clear the trigger");

    engine.shutdown().await;
}

#[tokio::test]
async fn started_engine_triggers_from_the_poll_loop() {
    // Keep clear of the minute boundary so the alarm created for "now"
    // still matches when the loop evaluates it.
    let mut now = Local::now();
    if now.second() >= 58 {
        tokio::time::sleep(Duration::from_secs(3)).await;
        now = Local::now();
    }

    let h = harness(
        vec![alarm("a1", "u1", now, RepeatDays::none(), MissionKind::Math)],
        FakeAlert::new(),
    );
    let engine = h.engine.clone().with_poll_interval(Duration::from_millis(50));
    let mut events = engine.subscribe();

    engine.start().await;

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("alarm should trigger from the poll loop")
        .unwrap();
    assert!(matches!(event, EngineEvent::AlarmTriggered { .. }));

    engine.shutdown().await;
}

#[tokio::test]
async fn check_now_is_ignored_while_ringing() {
    let now = local_time(2026, 3, 2, 7, 0);
    let h = harness(
        vec![alarm("a1", "u1", now, RepeatDays::none(), MissionKind::Math)],
        FakeAlert::new(),
    );

    assert!(h.engine.evaluate_pass(now).await);
    // Must not queue a wake permit that would re-evaluate right after
    // dismissal.
    h.engine.check_now().await;
    assert_eq!(h.alert.acquires.load(Ordering::SeqCst), 1);

    h.engine.shutdown().await;
}

#[test]
fn weekday_fixture_dates_are_what_the_tests_assume() {
    assert_eq!(local_time(2026, 3, 2, 7, 0).weekday(), Weekday::Mon);
    assert_eq!(local_time(2026, 3, 3, 6, 30).weekday(), Weekday::Tue);
}
