use crate::error::{Result, TapError};
use crate::session::Mode;

/// Characters per "word" when converting typed characters into WPM.
pub const CHARS_PER_WORD: f64 = 5.0;

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
    Pending,
}

/// One tag per passage character, recomputed from scratch on every update.
pub type CorrectnessVector = Vec<Outcome>;

/// Final metrics of a finished session.
#[derive(Clone, Debug, Copy, PartialEq)]
pub struct SessionResult {
    pub elapsed_secs: f64,
    pub wpm: f64,
    pub accuracy: f64,
    pub correct_chars: usize,
    pub typed_chars: usize,
    pub mode: Mode,
}

/// Tag every passage position against what has been typed so far.
///
/// Characters typed beyond the end of the passage have no position to be
/// tagged at; they are dropped here but still count against accuracy in
/// [`finalize`].
pub fn update(passage: &str, typed: &str) -> CorrectnessVector {
    let mut typed = typed.chars();
    passage
        .chars()
        .map(|expected| match typed.next() {
            Some(c) if c == expected => Outcome::Correct,
            Some(_) => Outcome::Incorrect,
            None => Outcome::Pending,
        })
        .collect()
}

/// Number of typed characters matching the passage at the same position.
pub fn correct_count(passage: &str, typed: &str) -> usize {
    passage
        .chars()
        .zip(typed.chars())
        .filter(|(expected, actual)| expected == actual)
        .count()
}

/// Words per minute from a count of correct characters. Zero elapsed time
/// yields zero rather than dividing by it.
pub fn wpm(correct_chars: usize, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    (correct_chars as f64 / CHARS_PER_WORD) / (elapsed_secs / 60.0)
}

pub fn accuracy(correct_chars: usize, typed_chars: usize) -> f64 {
    correct_chars as f64 / typed_chars.max(1) as f64 * 100.0
}

/// Compute the final result of a session.
pub fn finalize(passage: &str, typed: &str, elapsed_secs: f64, mode: Mode) -> Result<SessionResult> {
    if passage.is_empty() {
        return Err(TapError::InvalidInput("passage is empty".into()));
    }
    if !elapsed_secs.is_finite() || elapsed_secs < 0.0 {
        return Err(TapError::InvalidInput(format!(
            "elapsed time must be a non-negative number of seconds, got {elapsed_secs}"
        )));
    }

    let correct_chars = correct_count(passage, typed);
    let typed_chars = typed.chars().count();

    Ok(SessionResult {
        elapsed_secs,
        wpm: wpm(correct_chars, elapsed_secs),
        accuracy: accuracy(correct_chars, typed_chars),
        correct_chars,
        typed_chars,
        mode,
    })
}
