//! Practice-session state machine.
//!
//! One session owns an ordered queue of cards, an optional countdown timer,
//! a running score and a retry-of-failures loop. Grading a card invokes the
//! scheduler exactly once and applies the result only after the store
//! persists it; a failed persist blocks advancement behind an explicit
//! retry. The controller performs no I/O of its own: the card store, clock
//! and best-score sink are injected.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;

use crate::models::{
    Candidate, CardMeta, CardRef, Direction, GradingMode, ReviewOutcome, SelectionPolicy,
    StoreError,
};
use crate::srs;
use crate::text;

/// Source of review candidates and destination of scheduler results.
/// Persist failures are retryable, never fatal.
pub trait CardStore {
    fn fetch_candidates(
        &self,
        direction: Direction,
        policy: SelectionPolicy,
        limit: usize,
    ) -> Result<Vec<Candidate>, StoreError>;

    fn persist(&self, card: CardRef, meta: &CardMeta) -> Result<(), StoreError>;
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Write-only collaborator for the cross-session best score. The session
/// records a final score here and never reads it back.
pub trait BestScoreSink {
    fn record_best(
        &self,
        policy: SelectionPolicy,
        direction: Direction,
        score: i64,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Normal operation: timer ticking, grading auto-advances the queue.
    Active,
    /// Timer reached zero with a card in flight; its grading is still
    /// honored, then a Finish control replaces auto-advance.
    TimeUpPendingCurrent,
    /// Decision point: failed cards start a retry pass, otherwise Done.
    Finalizing,
    /// Traversing previously failed cards. Timer inert, score untouched.
    RetryFailed,
    Done,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub direction: Direction,
    pub policy: SelectionPolicy,
    pub limit: usize,
    /// Countdown seconds. None runs the session without time pressure.
    pub timer: Option<i64>,
}

// A computed scheduler result waiting for a successful persist. Kept so a
// retry stores the identical meta without re-invoking the scheduler.
#[derive(Debug, Clone)]
struct PendingSave {
    card: CardRef,
    meta: CardMeta,
    was_correct: bool,
}

/// Per-step view model for the presentation layer.
#[derive(Debug)]
pub struct StepView<'a> {
    pub prompt: &'a str,
    /// Hidden until reveal/check.
    pub expected: Option<&'a str>,
    pub mode: GradingMode,
    pub phase: Phase,
    pub score: i64,
    pub time_remaining: Option<i64>,
    /// 1-based position within the current pass.
    pub position: usize,
    pub queue_len: usize,
    pub streak: i64,
    /// Result of the most recent graded answer, for feedback display.
    pub last_result: Option<bool>,
    /// True while a persist failure blocks grading and advancement.
    pub save_blocked: bool,
    pub save_error: Option<&'a str>,
    pub pass_number: usize,
}

/// End-of-session view model. Failed/successful reflect first-pass results
/// only, in first-pass queue order.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub score: i64,
    pub failed: Vec<Candidate>,
    pub successful: Vec<Candidate>,
}

pub struct Session<'a, S: CardStore, C: Clock, B: BestScoreSink> {
    store: &'a S,
    clock: &'a C,
    sink: &'a B,
    config: SessionConfig,

    /// All fetched cards; queues index into this.
    cards: Vec<Candidate>,
    /// Current pass, as indices into `cards`.
    queue: Vec<usize>,
    /// First-pass order, retained for the summary.
    first_pass_queue: Vec<usize>,
    position: usize,
    score: i64,
    time_remaining: Option<i64>,
    phase: Phase,
    /// At most one result per card per pass.
    pass_results: HashMap<CardRef, bool>,
    first_pass_results: HashMap<CardRef, bool>,
    pass_number: usize,

    revealed: bool,
    last_result: Option<bool>,
    pending_save: Option<PendingSave>,
    save_error: Option<String>,
}

impl<'a, S: CardStore, C: Clock, B: BestScoreSink> Session<'a, S, C, B> {
    /// Fetch candidates once via the selection policy, shuffle them so the
    /// selection order leaks no difficulty signal, arm the timer and enter
    /// `Active`. An empty fetch completes immediately.
    pub fn start(
        store: &'a S,
        clock: &'a C,
        sink: &'a B,
        config: SessionConfig,
    ) -> Result<Self, StoreError> {
        let mut cards = store.fetch_candidates(config.direction, config.policy, config.limit)?;
        cards.shuffle(&mut rand::thread_rng());

        let queue: Vec<usize> = (0..cards.len()).collect();
        let phase = if queue.is_empty() {
            Phase::Done
        } else {
            Phase::Active
        };

        let mut session = Self {
            store,
            clock,
            sink,
            time_remaining: config.timer,
            config,
            cards,
            first_pass_queue: queue.clone(),
            queue,
            position: 0,
            score: 0,
            phase,
            pass_results: HashMap::new(),
            first_pass_results: HashMap::new(),
            pass_number: 1,
            revealed: false,
            last_result: None,
            pending_save: None,
            save_error: None,
        };

        if session.phase == Phase::Done {
            session.record_best_score();
        }
        Ok(session)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn pass_number(&self) -> usize {
        self.pass_number
    }

    pub fn time_remaining(&self) -> Option<i64> {
        self.time_remaining
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn grading_mode(&self) -> GradingMode {
        self.config.direction.grading_mode()
    }

    pub fn current_card(&self) -> Option<CardRef> {
        self.current().map(|c| c.card)
    }

    fn current(&self) -> Option<&Candidate> {
        self.queue.get(self.position).map(|&idx| &self.cards[idx])
    }

    fn in_grading_phase(&self) -> bool {
        matches!(
            self.phase,
            Phase::Active | Phase::TimeUpPendingCurrent | Phase::RetryFailed
        )
    }

    // Grading controls are locked while a persist is outstanding, and a card
    // gets at most one recorded result per pass.
    fn can_grade(&self) -> bool {
        if !self.in_grading_phase() || self.pending_save.is_some() {
            return false;
        }
        match self.current() {
            Some(c) => !self.pass_results.contains_key(&c.card),
            None => false,
        }
    }

    /// Exact-match direction: reveal the expected text and grade the typed
    /// answer by normalized equality, automatically and immediately.
    pub fn check_answer(&mut self, typed: &str) {
        if self.grading_mode() != GradingMode::ExactMatch || !self.can_grade() || self.revealed {
            return;
        }
        self.revealed = true;
        let was_correct = match self.current() {
            Some(c) => text::answers_match(typed, &c.expected),
            None => return,
        };
        self.grade(was_correct);
    }

    /// Self-graded direction: show the expected text; grading waits for an
    /// explicit yes/no.
    pub fn reveal(&mut self) {
        if self.grading_mode() == GradingMode::SelfGraded && self.can_grade() {
            self.revealed = true;
        }
    }

    /// Self-graded direction: the learner's explicit verdict, only accepted
    /// after reveal.
    pub fn self_grade(&mut self, was_correct: bool) {
        if self.grading_mode() != GradingMode::SelfGraded || !self.can_grade() || !self.revealed {
            return;
        }
        self.grade(was_correct);
    }

    // Invokes the scheduler exactly once, then parks the result until the
    // store accepts it.
    fn grade(&mut self, was_correct: bool) {
        let now = self.clock.now();
        let (card, next_meta) = match self.current() {
            Some(c) => (
                c.card,
                srs::compute_next(
                    &c.meta,
                    ReviewOutcome {
                        was_correct,
                        graded_at: now,
                    },
                ),
            ),
            None => return,
        };

        self.pending_save = Some(PendingSave {
            card,
            meta: next_meta,
            was_correct,
        });
        self.try_persist();
    }

    /// Retry a failed persist with the identical computed meta. The
    /// scheduler is not re-invoked.
    pub fn retry_save(&mut self) {
        if self.pending_save.is_some() {
            self.try_persist();
        }
    }

    fn try_persist(&mut self) {
        let pending = match &self.pending_save {
            Some(p) => p.clone(),
            None => return,
        };

        match self.store.persist(pending.card, &pending.meta) {
            Ok(()) => {
                self.pending_save = None;
                self.save_error = None;
                self.apply_graded(pending);
            }
            Err(e) => {
                // No partial application: score and results stay untouched
                // until the save lands.
                self.save_error = Some(e.to_string());
            }
        }
    }

    // Runs only after a successful persist.
    fn apply_graded(&mut self, saved: PendingSave) {
        if let Some(&idx) = self.queue.get(self.position) {
            self.cards[idx].meta = saved.meta;
        }

        self.pass_results.insert(saved.card, saved.was_correct);
        if self.pass_number == 1 {
            self.first_pass_results.insert(saved.card, saved.was_correct);
            if saved.was_correct {
                self.score += 1;
            }
        }
        self.last_result = Some(saved.was_correct);

        match self.phase {
            Phase::Active | Phase::RetryFailed => self.advance(),
            // Time is up: hold the graded card and wait for Finish.
            Phase::TimeUpPendingCurrent => {}
            Phase::Finalizing | Phase::Done => {}
        }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.revealed = false;
        if self.position >= self.queue.len() {
            self.phase = Phase::Finalizing;
            self.resolve_finalize();
        }
    }

    /// True once the timer has expired and the in-flight card no longer
    /// accepts grading, so the only remaining control is Finish.
    pub fn awaiting_finish(&self) -> bool {
        self.phase == Phase::TimeUpPendingCurrent
            && self.pending_save.is_none()
            && match self.current() {
                Some(c) => self.pass_results.contains_key(&c.card),
                None => true,
            }
    }

    /// Finish control after the timer expired: proceed to the
    /// finalize-or-retry decision, whether or not the in-flight card was
    /// graded.
    pub fn finish(&mut self) {
        if self.phase == Phase::TimeUpPendingCurrent && self.pending_save.is_none() {
            self.phase = Phase::Finalizing;
            self.resolve_finalize();
        }
    }

    // Failed cards from the pass that just ended start a (shrinking) retry
    // pass; a clean pass ends the session.
    fn resolve_finalize(&mut self) {
        let failed: Vec<usize> = self
            .queue
            .iter()
            .copied()
            .filter(|&idx| self.pass_results.get(&self.cards[idx].card) == Some(&false))
            .collect();

        if failed.is_empty() {
            self.phase = Phase::Done;
            self.record_best_score();
        } else {
            self.queue = failed;
            self.position = 0;
            self.pass_results = HashMap::new();
            self.pass_number += 1;
            self.revealed = false;
            self.last_result = None;
            // Retries are not time-pressured; the timer stays frozen.
            self.time_remaining = self.time_remaining.map(|t| t.max(0));
            self.phase = Phase::RetryFailed;
        }
    }

    /// One elapsed second. Only an active first-pass timer counts down;
    /// ticks never advance the queue, touch the score, or interfere with an
    /// outstanding persist.
    pub fn tick(&mut self) {
        if self.phase != Phase::Active {
            return;
        }
        if let Some(t) = self.time_remaining {
            let next = (t - 1).max(0);
            self.time_remaining = Some(next);
            if next == 0 {
                self.phase = Phase::TimeUpPendingCurrent;
            }
        }
    }

    fn record_best_score(&mut self) {
        // Only timed first passes compete for a best score. The sink is
        // write-only and a failure here is not worth blocking Done over.
        if self.config.timer.is_some() {
            let _ = self
                .sink
                .record_best(self.config.policy, self.config.direction, self.score);
        }
    }

    pub fn step_view(&self) -> Option<StepView<'_>> {
        let current = self.current()?;
        Some(StepView {
            prompt: &current.prompt,
            expected: if self.revealed {
                Some(current.expected.as_str())
            } else {
                None
            },
            mode: self.grading_mode(),
            phase: self.phase,
            score: self.score,
            time_remaining: self.time_remaining,
            position: self.position + 1,
            queue_len: self.queue.len(),
            streak: current.meta.success_streak,
            last_result: self.last_result,
            save_blocked: self.pending_save.is_some(),
            save_error: self.save_error.as_deref(),
            pass_number: self.pass_number,
        })
    }

    pub fn summary(&self) -> SessionSummary {
        let mut failed = Vec::new();
        let mut successful = Vec::new();
        for &idx in &self.first_pass_queue {
            let card = &self.cards[idx];
            match self.first_pass_results.get(&card.card) {
                Some(false) => failed.push(card.clone()),
                Some(true) => successful.push(card.clone()),
                None => {}
            }
        }
        SessionSummary {
            score: self.score,
            failed,
            successful,
        }
    }
}
