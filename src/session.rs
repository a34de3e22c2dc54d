use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TapError};
use crate::runtime::{CountdownTask, TaskState};
use crate::scoring::{self, CorrectnessVector, SessionResult};

pub const DEFAULT_COUNTDOWN_SECS: u64 = 60;

/// How a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Ends when the user submits or completes the passage.
    #[default]
    Stopwatch,
    /// Ends by itself once `duration_secs` have passed since the first keystroke.
    Countdown { duration_secs: u64 },
}

impl Mode {
    pub fn countdown() -> Self {
        Mode::Countdown {
            duration_secs: DEFAULT_COUNTDOWN_SECS,
        }
    }

    pub fn time_limit(&self) -> Option<Duration> {
        match self {
            Mode::Stopwatch => None,
            Mode::Countdown { duration_secs } => Some(Duration::from_secs(*duration_secs)),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Stopwatch => write!(f, "stopwatch"),
            Mode::Countdown { duration_secs } => write!(f, "countdown ({duration_secs}s)"),
        }
    }
}

/// A single typing test. Owned by the UI flow for the lifetime of one
/// passage; time is always passed in so callers control the clock.
#[derive(Debug)]
pub struct Session {
    passage: String,
    typed: String,
    mode: Mode,
    started_at: Option<Instant>,
    countdown: Option<CountdownTask>,
    result: Option<SessionResult>,
}

impl Session {
    pub fn new(passage: impl Into<String>, mode: Mode) -> Result<Self> {
        let passage = passage.into();
        if passage.is_empty() {
            return Err(TapError::InvalidInput("passage is empty".into()));
        }
        if mode.time_limit() == Some(Duration::ZERO) {
            return Err(TapError::InvalidInput(
                "countdown duration must be at least one second".into(),
            ));
        }
        debug!(%mode, passage_len = passage.chars().count(), "session created");

        Ok(Self {
            passage,
            typed: String::new(),
            mode,
            started_at: None,
            countdown: None,
            result: None,
        })
    }

    pub fn passage(&self) -> &str {
        &self.passage
    }

    pub fn typed(&self) -> &str {
        &self.typed
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn has_finished(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    pub fn correctness(&self) -> CorrectnessVector {
        scoring::update(&self.passage, &self.typed)
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.typed.chars().count()
    }

    fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
        if let Some(limit) = self.mode.time_limit() {
            self.countdown = Some(CountdownTask::start(now, limit));
        }
        info!(mode = %self.mode, "timer started");
    }

    /// Append a keystroke. Finishes the session when the passage is covered.
    pub fn write(&mut self, c: char, now: Instant) -> Result<Option<SessionResult>> {
        if self.has_finished() {
            return Ok(None);
        }
        if !self.has_started() {
            self.start(now);
        }
        // a keystroke may arrive after the deadline but before the next tick
        if let Some(result) = self.tick(now)? {
            return Ok(Some(result));
        }
        self.typed.push(c);

        if self.cursor() >= self.passage.chars().count() {
            return self.finish(now).map(Some);
        }
        Ok(None)
    }

    pub fn backspace(&mut self) {
        if !self.has_finished() {
            self.typed.pop();
        }
    }

    /// Explicit "done" from the user. Ignored before the first keystroke.
    pub fn submit(&mut self, now: Instant) -> Result<Option<SessionResult>> {
        if !self.has_started() || self.has_finished() {
            return Ok(None);
        }
        self.finish(now).map(Some)
    }

    /// Periodic timer check. Force-finalizes a countdown at its deadline
    /// with whatever has been typed.
    pub fn tick(&mut self, now: Instant) -> Result<Option<SessionResult>> {
        if self.has_finished() {
            return Ok(None);
        }
        let Some(task) = self.countdown.as_mut() else {
            return Ok(None);
        };
        match task.poll(now) {
            TaskState::Expired => {
                info!("countdown finished");
                self.finish(now).map(Some)
            }
            TaskState::Running { .. } | TaskState::Cancelled => Ok(None),
        }
    }

    /// The user navigated away: stop the countdown from rescheduling.
    pub fn leave(&mut self) {
        if let Some(task) = self.countdown.as_mut() {
            task.cancel();
            debug!("countdown cancelled");
        }
    }

    /// Whether the event loop still needs to deliver ticks.
    pub fn needs_tick(&self) -> bool {
        !self.has_finished()
            && match &self.countdown {
                Some(task) => task.is_scheduled(),
                // stopwatch display keeps running once started
                None => self.has_started(),
            }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let Some(start) = self.started_at else {
            return Duration::ZERO;
        };
        let elapsed = now.saturating_duration_since(start);
        match self.mode.time_limit() {
            Some(limit) => elapsed.min(limit),
            None => elapsed,
        }
    }

    /// Time left on the countdown, `None` in stopwatch mode.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let limit = self.mode.time_limit()?;
        Some(limit.saturating_sub(self.elapsed(now)))
    }

    pub fn live_wpm(&self, now: Instant) -> f64 {
        scoring::wpm(
            scoring::correct_count(&self.passage, &self.typed),
            self.elapsed(now).as_secs_f64(),
        )
    }

    /// Compute the result once; later calls return the stored value.
    pub fn finish(&mut self, now: Instant) -> Result<SessionResult> {
        if let Some(result) = self.result {
            return Ok(result);
        }
        let elapsed = self.elapsed(now).as_secs_f64();
        let result = scoring::finalize(&self.passage, &self.typed, elapsed, self.mode)?;
        info!(
            elapsed_secs = result.elapsed_secs,
            wpm = result.wpm,
            accuracy = result.accuracy,
            "session finished"
        );
        if let Some(task) = self.countdown.as_mut() {
            task.cancel();
        }
        self.result = Some(result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Outcome;
    use assert_matches::assert_matches;

    fn type_str(session: &mut Session, s: &str, now: Instant) {
        for c in s.chars() {
            session.write(c, now).unwrap();
        }
    }

    #[test]
    fn test_new_rejects_empty_passage() {
        assert_matches!(
            Session::new("", Mode::Stopwatch),
            Err(TapError::InvalidInput(_))
        );
    }

    #[test]
    fn test_new_rejects_zero_countdown() {
        assert_matches!(
            Session::new("abc", Mode::Countdown { duration_secs: 0 }),
            Err(TapError::InvalidInput(_))
        );
    }

    #[test]
    fn test_clock_starts_on_first_keystroke() {
        let t0 = Instant::now();
        let mut session = Session::new("hello", Mode::Stopwatch).unwrap();

        assert!(!session.has_started());
        assert_eq!(session.elapsed(t0 + Duration::from_secs(5)), Duration::ZERO);

        session.write('h', t0).unwrap();
        assert!(session.has_started());
        assert_eq!(
            session.elapsed(t0 + Duration::from_secs(5)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_correctness_tracks_buffer() {
        let t0 = Instant::now();
        let mut session = Session::new("cat", Mode::Stopwatch).unwrap();
        type_str(&mut session, "cx", t0);

        assert_eq!(
            session.correctness(),
            vec![Outcome::Correct, Outcome::Incorrect, Outcome::Pending]
        );

        session.backspace();
        assert_eq!(session.typed(), "c");
        assert_eq!(session.correctness()[1], Outcome::Pending);
    }

    #[test]
    fn test_stopwatch_submit_scenario() {
        let t0 = Instant::now();
        let mut session = Session::new("the cat sat", Mode::Stopwatch).unwrap();
        type_str(&mut session, "the cat sa", t0);
        session.write('d', t0 + Duration::from_secs(6)).unwrap();

        // completing the passage finishes the session
        let result = *session.result().unwrap();
        assert_eq!(result.correct_chars, 10);
        assert!((result.wpm - 20.0).abs() < 1e-9);
        assert!((result.accuracy - 90.909).abs() < 0.01);
    }

    #[test]
    fn test_submit_before_start_is_ignored() {
        let mut session = Session::new("abc", Mode::Stopwatch).unwrap();
        assert!(session.submit(Instant::now()).unwrap().is_none());
        assert!(!session.has_finished());
    }

    #[test]
    fn test_submit_finalizes_partial_buffer() {
        let t0 = Instant::now();
        let mut session = Session::new("abcdef", Mode::Stopwatch).unwrap();
        type_str(&mut session, "abc", t0);

        let result = session
            .submit(t0 + Duration::from_secs(12))
            .unwrap()
            .unwrap();
        assert_eq!(result.typed_chars, 3);
        assert_eq!(result.accuracy, 100.0);
        assert!((result.wpm - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_finish_runs_once() {
        let t0 = Instant::now();
        let mut session = Session::new("abcdef", Mode::Stopwatch).unwrap();
        type_str(&mut session, "ab", t0);

        let first = session.finish(t0 + Duration::from_secs(2)).unwrap();
        let second = session.finish(t0 + Duration::from_secs(30)).unwrap();
        assert_eq!(first, second);

        // input after the end is dropped
        assert!(session.write('c', t0).unwrap().is_none());
        assert_eq!(session.typed(), "ab");
        assert!(session.submit(t0).unwrap().is_none());
    }

    #[test]
    fn test_countdown_expiry_uses_partial_buffer() {
        let t0 = Instant::now();
        let mut session = Session::new("a much longer passage", Mode::countdown()).unwrap();
        type_str(&mut session, "a mu", t0);

        assert!(session.tick(t0 + Duration::from_secs(30)).unwrap().is_none());
        assert_eq!(
            session.remaining(t0 + Duration::from_secs(30)),
            Some(Duration::from_secs(30))
        );

        let result = session
            .tick(t0 + Duration::from_secs(61))
            .unwrap()
            .expect("countdown should force a result");
        assert_eq!(result.typed_chars, 4);
        assert_eq!(result.correct_chars, 4);
        assert_eq!(result.elapsed_secs, 60.0);
        assert!((result.wpm - 0.8).abs() < 1e-9);
        assert!(session.has_finished());
        assert!(!session.needs_tick());
    }

    #[test]
    fn test_countdown_does_not_tick_before_start() {
        let mut session = Session::new("abc", Mode::countdown()).unwrap();
        assert!(!session.needs_tick());
        assert!(session
            .tick(Instant::now() + Duration::from_secs(120))
            .unwrap()
            .is_none());
        assert_eq!(
            session.remaining(Instant::now()),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_leave_cancels_countdown() {
        let t0 = Instant::now();
        let mut session = Session::new("abcdef", Mode::countdown()).unwrap();
        session.write('a', t0).unwrap();
        assert!(session.needs_tick());

        session.leave();

        assert!(!session.needs_tick());
        assert!(session
            .tick(t0 + Duration::from_secs(90))
            .unwrap()
            .is_none());
        assert!(!session.has_finished());
    }

    #[test]
    fn test_keystroke_after_deadline_is_not_counted() {
        let t0 = Instant::now();
        let mut session = Session::new("abcdef", Mode::Countdown { duration_secs: 10 }).unwrap();
        type_str(&mut session, "ab", t0);

        let result = session
            .write('c', t0 + Duration::from_secs(11))
            .unwrap()
            .unwrap();
        assert_eq!(result.typed_chars, 2);
        assert_eq!(session.typed(), "ab");
    }

    #[test]
    fn test_live_wpm() {
        let t0 = Instant::now();
        let mut session = Session::new("hello world", Mode::Stopwatch).unwrap();
        type_str(&mut session, "hello", t0);

        assert_eq!(session.live_wpm(t0), 0.0);
        assert!((session.live_wpm(t0 + Duration::from_secs(60)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Stopwatch.to_string(), "stopwatch");
        assert_eq!(Mode::countdown().to_string(), "countdown (60s)");
    }
}
