//! crates/flashread_core/src/reader.rs
//!
//! The RSVP presentation engine: a word-sequence state machine that advances
//! at a computed cadence and reports every transition to an observer.
//!
//! The engine never sleeps. `play`, `step`, and the seek operations return
//! the `Duration` until the next word-advance is due (or `None` when no
//! advance should be scheduled); the owning task holds the single
//! outstanding timer and must cancel it before every state-changing call, so
//! no stale advance can fire after a seek or pause.

use std::time::Duration;

use crate::parser;

pub const MIN_WPM: u16 = 200;
pub const MAX_WPM: u16 = 1000;
pub const DEFAULT_WPM: u16 = 300;
pub const DEFAULT_PUNCTUATION_PAUSE_MS: u16 = 200;
pub const MAX_PUNCTUATION_PAUSE_MS: u16 = 500;

/// Transport states of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Index 0, not playing.
    Idle,
    Playing,
    Paused,
    /// The whole sequence has been presented.
    Completed,
}

/// Receives the engine's synchronous notifications, in order.
pub trait ReaderObserver: Send {
    /// A word is being presented.
    fn on_word(&mut self, word: &str, index: usize);
    /// Progress through the sequence; `percent` is `current / total * 100`.
    fn on_progress(&mut self, percent: f64, current: usize, total: usize);
    /// The sequence finished.
    fn on_complete(&mut self);
}

/// Cadence settings, clamped on construction and on live updates.
#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    pub wpm: u16,
    pub punctuation_pause_ms: u16,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            wpm: DEFAULT_WPM,
            punctuation_pause_ms: DEFAULT_PUNCTUATION_PAUSE_MS,
        }
    }
}

pub struct SpeedReader {
    words: Vec<String>,
    current_index: usize,
    state: ReaderState,
    wpm: u16,
    punctuation_pause_ms: u16,
    observer: Box<dyn ReaderObserver>,
}

impl SpeedReader {
    pub fn new(words: Vec<String>, options: ReaderOptions, observer: Box<dyn ReaderObserver>) -> Self {
        Self {
            words,
            current_index: 0,
            state: ReaderState::Idle,
            wpm: options.wpm.clamp(MIN_WPM, MAX_WPM),
            punctuation_pause_ms: options.punctuation_pause_ms.min(MAX_PUNCTUATION_PAUSE_MS),
            observer,
        }
    }

    /// Like [`SpeedReader::new`], but positioned at a saved bookmark.
    pub fn with_start_index(
        words: Vec<String>,
        options: ReaderOptions,
        observer: Box<dyn ReaderObserver>,
        start_index: usize,
    ) -> Self {
        let mut reader = Self::new(words, options, observer);
        reader.current_index = start_index.min(reader.words.len());
        reader
    }

    /// Delay before the next advance: the base cadence plus the punctuation
    /// bonus earned by the previously emitted word. A sentence ender (`.`,
    /// `!`, `?`) adds the full configured pause; a clause break (`,`, `;`,
    /// `:`) adds half of it.
    pub fn word_delay(&self) -> Duration {
        let base_ms = 60_000.0 / f64::from(self.wpm);
        let bonus_ms = match self
            .current_index
            .checked_sub(1)
            .and_then(|i| self.words.get(i))
            .and_then(|w| w.chars().last())
        {
            Some('.') | Some('!') | Some('?') => f64::from(self.punctuation_pause_ms),
            Some(',') | Some(';') | Some(':') => f64::from(self.punctuation_pause_ms) / 2.0,
            _ => 0.0,
        };
        Duration::from_secs_f64((base_ms + bonus_ms) / 1000.0)
    }

    /// Starts or resumes playback and presents the current word immediately.
    /// Calling while already playing is a no-op (no duplicate timer, no
    /// duplicate notifications). From `Completed`, rewinds to the beginning
    /// first.
    pub fn play(&mut self) -> Option<Duration> {
        if self.state == ReaderState::Playing {
            return None;
        }
        if self.state == ReaderState::Completed {
            self.reset();
        }
        self.state = ReaderState::Playing;
        self.step()
    }

    /// One word-advance. Emits the current word and progress, moves the
    /// index forward, and returns the delay until the next advance while
    /// still playing. Past the end of the sequence it transitions to
    /// `Completed` and fires the completion notification instead.
    pub fn step(&mut self) -> Option<Duration> {
        if self.state != ReaderState::Playing {
            return None;
        }
        let total = self.words.len();
        if self.current_index >= total {
            self.state = ReaderState::Completed;
            self.observer.on_complete();
            return None;
        }

        let index = self.current_index;
        self.observer.on_word(&self.words[index], index);
        let percent = (index + 1) as f64 / total as f64 * 100.0;
        self.observer.on_progress(percent, index + 1, total);
        self.current_index += 1;

        if self.state == ReaderState::Playing {
            Some(self.word_delay())
        } else {
            None
        }
    }

    /// Playing becomes Paused; the caller has already cancelled the pending
    /// timer.
    pub fn pause(&mut self) {
        if self.state == ReaderState::Playing {
            self.state = ReaderState::Paused;
        }
    }

    /// Back to Idle at index 0, notifying observers of the cleared position.
    pub fn reset(&mut self) {
        self.state = ReaderState::Idle;
        self.current_index = 0;
        self.observer.on_word("", 0);
        self.observer.on_progress(0.0, 0, self.words.len());
    }

    /// Seeks to `index`, clamped into `[0, total]`, notifying observers of
    /// the new position. If the engine was playing it resumes immediately
    /// and the returned delay schedules the next advance.
    pub fn jump_to_word(&mut self, index: usize) -> Option<Duration> {
        let was_playing = self.state == ReaderState::Playing;
        if was_playing {
            self.state = ReaderState::Paused;
        }
        let total = self.words.len();
        self.current_index = index.min(total);

        if self.current_index < total {
            self.observer
                .on_word(&self.words[self.current_index], self.current_index);
        }
        let percent = if total == 0 {
            0.0
        } else {
            self.current_index as f64 / total as f64 * 100.0
        };
        self.observer.on_progress(percent, self.current_index, total);

        if was_playing {
            self.play()
        } else {
            None
        }
    }

    /// Relative seek: `jump_to_word(current + delta)`.
    pub fn skip(&mut self, delta: i64) -> Option<Duration> {
        let target = (self.current_index as i64 + delta).max(0) as usize;
        self.jump_to_word(target)
    }

    pub fn set_speed(&mut self, wpm: u16) {
        self.wpm = wpm.clamp(MIN_WPM, MAX_WPM);
    }

    pub fn set_punctuation_pause(&mut self, ms: u16) {
        self.punctuation_pause_ms = ms.min(MAX_PUNCTUATION_PAUSE_MS);
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn total_words(&self) -> usize {
        self.words.len()
    }

    pub fn wpm(&self) -> u16 {
        self.wpm
    }

    pub fn progress_percent(&self) -> f64 {
        if self.words.is_empty() {
            0.0
        } else {
            self.current_index as f64 / self.words.len() as f64 * 100.0
        }
    }

    /// Estimated time to finish at the current speed, as `M:SS`.
    pub fn time_remaining(&self) -> String {
        parser::estimate_reading_time(self.words.len() - self.current_index, self.wpm)
    }

    /// Releases the word sequence. The engine is unusable afterward; the
    /// caller has already cancelled any pending timer.
    pub fn destroy(&mut self) {
        self.words = Vec::new();
        self.current_index = 0;
        self.state = ReaderState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Word(String, usize),
        Progress(f64, usize, usize),
        Complete,
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Event>>>);

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.0.lock().unwrap().clone()
        }
    }

    impl ReaderObserver for Recorder {
        fn on_word(&mut self, word: &str, index: usize) {
            self.0.lock().unwrap().push(Event::Word(word.to_string(), index));
        }
        fn on_progress(&mut self, percent: f64, current: usize, total: usize) {
            self.0.lock().unwrap().push(Event::Progress(percent, current, total));
        }
        fn on_complete(&mut self) {
            self.0.lock().unwrap().push(Event::Complete);
        }
    }

    fn reader_with(words: &[&str], wpm: u16, pause_ms: u16) -> (SpeedReader, Recorder) {
        let recorder = Recorder::default();
        let reader = SpeedReader::new(
            words.iter().map(|w| w.to_string()).collect(),
            ReaderOptions {
                wpm,
                punctuation_pause_ms: pause_ms,
            },
            Box::new(recorder.clone()),
        );
        (reader, recorder)
    }

    fn expected_delay(wpm: u16, bonus_ms: f64) -> Duration {
        Duration::from_secs_f64((60_000.0 / f64::from(wpm) + bonus_ms) / 1000.0)
    }

    #[test]
    fn cadence_includes_punctuation_bonus_of_the_emitted_word() {
        let (mut reader, _) = reader_with(&["stop.", "wait,", "plain", "why?"], 300, 200);

        // play() emits "stop." and schedules the pause after a sentence end.
        assert_eq!(reader.play(), Some(expected_delay(300, 200.0)));
        // "wait," earns half the pause.
        assert_eq!(reader.step(), Some(expected_delay(300, 100.0)));
        // "plain" earns nothing.
        assert_eq!(reader.step(), Some(expected_delay(300, 0.0)));
        // "why?" again a full pause, scheduled before the completion step.
        assert_eq!(reader.step(), Some(expected_delay(300, 200.0)));
        // Past the end: completion, nothing further scheduled.
        assert_eq!(reader.step(), None);
        assert_eq!(reader.state(), ReaderState::Completed);
    }

    #[test]
    fn speed_and_pause_are_clamped() {
        let (mut reader, _) = reader_with(&["a."], 50, 900);
        assert_eq!(reader.wpm(), MIN_WPM);
        reader.set_speed(5000);
        assert_eq!(reader.wpm(), MAX_WPM);
        reader.set_punctuation_pause(1000);
        reader.set_speed(300);
        reader.play();
        // Pause was clamped to the 500 ms ceiling.
        assert_eq!(reader.word_delay(), expected_delay(300, 500.0));
    }

    #[test]
    fn play_is_idempotent_while_playing() {
        let (mut reader, recorder) = reader_with(&["one", "two", "three"], 300, 200);
        assert!(reader.play().is_some());
        let seen = recorder.events().len();
        // A second play neither schedules nor re-notifies.
        assert_eq!(reader.play(), None);
        assert_eq!(recorder.events().len(), seen);
    }

    #[test]
    fn jump_clamps_and_reports_progress() {
        let (mut reader, recorder) = reader_with(&["a", "b", "c", "d"], 300, 200);
        reader.jump_to_word(999);
        assert_eq!(reader.current_index(), 4);
        assert_eq!(
            recorder.events().last().unwrap(),
            &Event::Progress(100.0, 4, 4)
        );

        reader.skip(-100);
        assert_eq!(reader.current_index(), 0);
        assert_eq!(
            recorder.events().last().unwrap(),
            &Event::Progress(0.0, 0, 4)
        );
    }

    #[test]
    fn jump_during_playback_resumes_playing() {
        let (mut reader, _) = reader_with(&["a", "b", "c", "d"], 300, 200);
        reader.play();
        let delay = reader.jump_to_word(2);
        assert!(delay.is_some());
        assert_eq!(reader.state(), ReaderState::Playing);
    }

    #[test]
    fn jump_while_paused_stays_paused() {
        let (mut reader, _) = reader_with(&["a", "b", "c"], 300, 200);
        reader.play();
        reader.pause();
        assert_eq!(reader.jump_to_word(1), None);
        assert_eq!(reader.state(), ReaderState::Paused);
        assert_eq!(reader.current_index(), 1);
    }

    #[test]
    fn completion_fires_once_and_play_restarts_from_zero() {
        let (mut reader, recorder) = reader_with(&["a", "b"], 1000, 0);
        reader.play();
        reader.step();
        assert_eq!(reader.step(), None);
        let completions = recorder
            .events()
            .iter()
            .filter(|e| **e == Event::Complete)
            .count();
        assert_eq!(completions, 1);
        assert_eq!(reader.state(), ReaderState::Completed);

        // Replaying rewinds and presents the first word again.
        assert!(reader.play().is_some());
        assert_eq!(reader.current_index(), 1);
        assert!(recorder
            .events()
            .iter()
            .any(|e| *e == Event::Word("a".to_string(), 0)));
    }

    #[test]
    fn reset_returns_to_idle_and_clears_the_display() {
        let (mut reader, recorder) = reader_with(&["a", "b", "c"], 300, 200);
        reader.play();
        reader.reset();
        assert_eq!(reader.state(), ReaderState::Idle);
        assert_eq!(reader.current_index(), 0);
        let events = recorder.events();
        assert_eq!(events[events.len() - 2], Event::Word(String::new(), 0));
        assert_eq!(events[events.len() - 1], Event::Progress(0.0, 0, 3));
    }

    #[test]
    fn progress_notifications_are_monotonic_while_playing() {
        let (mut reader, recorder) = reader_with(&["a", "b", "c", "d", "e"], 1000, 0);
        reader.play();
        while reader.step().is_some() {}
        let progress: Vec<usize> = recorder
            .events()
            .iter()
            .filter_map(|e| match e {
                Event::Progress(_, current, _) => Some(*current),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn starts_from_a_bookmark() {
        let recorder = Recorder::default();
        let mut reader = SpeedReader::with_start_index(
            vec!["a".into(), "b".into(), "c".into()],
            ReaderOptions::default(),
            Box::new(recorder.clone()),
            2,
        );
        reader.play();
        assert!(recorder
            .events()
            .iter()
            .any(|e| *e == Event::Word("c".to_string(), 2)));
    }

    #[test]
    fn time_remaining_formats_minutes_and_seconds() {
        let words: Vec<&str> = std::iter::repeat("w").take(600).collect();
        let (reader, _) = reader_with(&words, 300, 200);
        assert_eq!(reader.time_remaining(), "2:00");
    }
}
