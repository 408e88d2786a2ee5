//! Dismissal challenges: the puzzle a user must solve to silence an alarm.
//!
//! A challenge is a small state machine. It is generated when an alarm
//! triggers, evaluates submissions against its expected answer, and swaps in
//! a fresh prompt of the same kind after three cumulative failures so it can
//! never be brute-forced by elimination yet never locks the user out.

use log::warn;
use rand::Rng;
use serde::Serialize;

use crate::models::MissionKind;

/// Phrases presented by the typing mission.
const TYPING_PHRASES: &[&str] = &[
    "The quick brown fox jumps over the lazy dog",
    "A journey of a thousand miles begins with a single step",
    "Early to bed and early to rise makes a person healthy wealthy and wise",
    "All that glitters is not gold",
    "Actions speak louder than words",
];

/// Known-good prompts used when generation has nothing to draw from.
const MATH_FALLBACK: (&str, &str) = ("5 + 5", "10");
const TYPING_FALLBACK: &str = "Good morning";

const MAX_ATTEMPTS: u8 = 3;

/// Outcome of submitting one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Answer matched; the challenge is complete.
    Satisfied,
    /// Answer did not match; the same prompt stands.
    Incorrect { attempts_remaining: u8 },
    /// Third failure: a fresh prompt replaced the old one and the attempt
    /// counter was reset.
    Renewed,
}

/// Snapshot of the challenge for a dismissal screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeView {
    pub kind: MissionKind,
    pub prompt: String,
    pub attempts_remaining: u8,
}

#[derive(Debug, Clone)]
pub struct Challenge {
    kind: MissionKind,
    prompt: String,
    expected: String,
    attempts_used: u8,
    satisfied: bool,
}

impl Challenge {
    pub fn generate(kind: MissionKind) -> Self {
        Self::generate_with(kind, &mut rand::thread_rng(), TYPING_PHRASES)
    }

    fn generate_with<R: Rng>(kind: MissionKind, rng: &mut R, phrases: &[&str]) -> Self {
        let (prompt, expected) = match kind {
            MissionKind::Math => math_problem(rng),
            MissionKind::Typing => typing_prompt(rng, phrases),
        };
        Self {
            kind,
            prompt,
            expected,
            attempts_used: 0,
            satisfied: false,
        }
    }

    pub fn kind(&self) -> MissionKind {
        self.kind
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn attempts_used(&self) -> u8 {
        self.attempts_used
    }

    pub fn attempts_remaining(&self) -> u8 {
        MAX_ATTEMPTS - self.attempts_used
    }

    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    pub fn view(&self) -> ChallengeView {
        ChallengeView {
            kind: self.kind,
            prompt: self.prompt.clone(),
            attempts_remaining: self.attempts_remaining(),
        }
    }

    /// Evaluate one submission.
    ///
    /// Incorrect answers count toward the three-attempt limit; the third
    /// failure swaps in a fresh prompt of the same kind and resets the
    /// counter. Once satisfied, further submissions are accepted as
    /// satisfied without re-evaluation.
    pub fn submit(&mut self, answer: &str) -> Submission {
        if self.satisfied {
            return Submission::Satisfied;
        }

        if self.matches(answer) {
            self.satisfied = true;
            return Submission::Satisfied;
        }

        self.attempts_used += 1;
        if self.attempts_used >= MAX_ATTEMPTS {
            let fresh = Self::generate(self.kind);
            self.prompt = fresh.prompt;
            self.expected = fresh.expected;
            self.attempts_used = 0;
            return Submission::Renewed;
        }

        Submission::Incorrect {
            attempts_remaining: self.attempts_remaining(),
        }
    }

    fn matches(&self, answer: &str) -> bool {
        match self.kind {
            // Exact numeric string, surrounding whitespace ignored.
            MissionKind::Math => answer.trim() == self.expected.as_str(),
            // Case-insensitive, ends trimmed, internal whitespace verbatim.
            MissionKind::Typing => {
                answer.trim().to_lowercase() == self.expected.trim().to_lowercase()
            }
        }
    }

    /// A challenge that needs no randomness at all, kept so a generation
    /// problem can never leave an alarm without a solvable prompt.
    pub fn fallback(kind: MissionKind) -> Self {
        let (prompt, expected) = match kind {
            MissionKind::Math => (MATH_FALLBACK.0.to_string(), MATH_FALLBACK.1.to_string()),
            MissionKind::Typing => (TYPING_FALLBACK.to_string(), TYPING_FALLBACK.to_string()),
        };
        Self {
            kind,
            prompt,
            expected,
            attempts_used: 0,
            satisfied: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn expected_answer(&self) -> &str {
        &self.expected
    }
}

fn math_problem<R: Rng>(rng: &mut R) -> (String, String) {
    let a: i32 = rng.gen_range(10..30);
    let b: i32 = rng.gen_range(10..30);

    match rng.gen_range(0..3) {
        0 => (format!("{a} + {b}"), (a + b).to_string()),
        1 => {
            // Subtract the smaller from the larger so the answer is never
            // negative.
            let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
            (format!("{hi} - {lo}"), (hi - lo).to_string())
        }
        _ => (format!("{a} × {b}"), (a * b).to_string()),
    }
}

fn typing_prompt<R: Rng>(rng: &mut R, phrases: &[&str]) -> (String, String) {
    if phrases.is_empty() {
        warn!("typing phrase set is empty, falling back to fixed prompt");
        return (TYPING_FALLBACK.to_string(), TYPING_FALLBACK.to_string());
    }
    let phrase = phrases[rng.gen_range(0..phrases.len())];
    (phrase.to_string(), phrase.to_string())
}
