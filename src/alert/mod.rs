//! The ringing resources: looping alarm sound plus repeating vibration.
//!
//! One `AlertHandle` owns the process-wide sound state. The non-Send rodio
//! objects live on a dedicated audio thread and are driven over a channel;
//! acquire/release go through the handle so a sound can never be left
//! playing without an owner.

pub mod chime;
pub mod tone;

use chime::Chime;
use tone::BeepTone;

use rodio::{OutputStream, Sink};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

/// Vibration cycle carried over from the mobile app, in milliseconds.
pub const VIBRATION_PATTERN_MS: [u64; 3] = [1000, 2000, 3000];

/// Which synthesized tone plays when an alarm rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToneKind {
    Beep,
    Chime,
}

impl Default for ToneKind {
    fn default() -> Self {
        ToneKind::Beep
    }
}

/// What a release call found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// Nothing was held; the call was a no-op.
    AlreadyIdle,
}

/// Exclusive handle on the ringing resources.
///
/// `acquire` force-resets any previously loaded sound before starting, so
/// the handle is never left with a dangling half-loaded state; `release` is
/// idempotent.
pub trait AlertResource: Send + Sync {
    fn acquire(&self) -> Result<(), String>;
    fn release(&self) -> Result<ReleaseOutcome, String>;
    fn is_ringing(&self) -> bool;
}

enum AlertCommand {
    Ring {
        tone: ToneKind,
        volume: f32,
        ready: Sender<Result<(), String>>,
    },
    Silence,
}

pub struct AlertHandle {
    tx: Arc<Mutex<Option<Sender<AlertCommand>>>>,
    ringing: Arc<AtomicBool>,
    vibrating: Arc<AtomicBool>,
    tone: ToneKind,
    volume: f32,
}

impl AlertHandle {
    pub fn new(tone: ToneKind, volume: f32) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            ringing: Arc::new(AtomicBool::new(false)),
            vibrating: Arc::new(AtomicBool::new(false)),
            tone,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    /// Whether the repeating vibration pattern is currently active. A
    /// platform layer polls this together with [`VIBRATION_PATTERN_MS`].
    pub fn vibration_active(&self) -> bool {
        self.vibrating.load(Ordering::SeqCst)
    }

    fn ensure_thread(&self) -> Result<Sender<AlertCommand>, String> {
        if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AlertCommand>();

        // Dedicated thread holding the non-Send audio objects. It exits when
        // the last command sender is dropped.
        thread::Builder::new()
            .name("daybreak-alert".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AlertCommand::Ring { tone, volume, ready } => {
                            // Force-unload whatever was loaded before.
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            _stream = None;

                            let result = start_ringing(&mut _stream, &mut sink, tone, volume);
                            if result.is_err() {
                                // Leave no dangling handle behind a failure.
                                sink = None;
                                _stream = None;
                            }
                            let _ = ready.send(result);
                        }
                        AlertCommand::Silence => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            _stream = None;
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
        Ok(tx_clone)
    }
}

fn start_ringing(
    stream: &mut Option<OutputStream>,
    sink: &mut Option<Sink>,
    tone: ToneKind,
    volume: f32,
) -> Result<(), String> {
    let (s, handle) = OutputStream::try_default()
        .map_err(|e| format!("failed to open audio output stream: {}", e))?;
    let new_sink =
        Sink::try_new(&handle).map_err(|e| format!("failed to create audio sink: {}", e))?;

    match tone {
        ToneKind::Beep => new_sink.append(BeepTone::new()),
        ToneKind::Chime => new_sink.append(Chime::new()),
    }
    new_sink.set_volume(volume.clamp(0.0, 1.0));
    new_sink.play();

    *stream = Some(s);
    *sink = Some(new_sink);
    Ok(())
}

impl AlertResource for AlertHandle {
    fn acquire(&self) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        let (ready_tx, ready_rx) = mpsc::channel();
        tx.send(AlertCommand::Ring {
            tone: self.tone,
            volume: self.volume,
            ready: ready_tx,
        })
        .map_err(|e| e.to_string())?;

        match ready_rx.recv().map_err(|e| e.to_string())? {
            Ok(()) => {
                self.ringing.store(true, Ordering::SeqCst);
                self.vibrating.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(err) => {
                self.ringing.store(false, Ordering::SeqCst);
                self.vibrating.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn release(&self) -> Result<ReleaseOutcome, String> {
        self.vibrating.store(false, Ordering::SeqCst);
        if !self.ringing.swap(false, Ordering::SeqCst) {
            return Ok(ReleaseOutcome::AlreadyIdle);
        }
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AlertCommand::Silence);
        }
        Ok(ReleaseOutcome::Released)
    }

    fn is_ringing(&self) -> bool {
        self.ringing.load(Ordering::SeqCst)
    }
}

impl Drop for AlertHandle {
    fn drop(&mut self) {
        // Dropping the sender afterwards ends the audio thread.
        let _ = self.release();
    }
}
