//! Spaced-repetition scheduler.
//!
//! Pure function from (card meta, graded answer) to the next card meta.
//! Incorrect answers fully reset scheduling momentum; correct answers walk a
//! short learning ladder before switching to exponential interval growth.

use chrono::Duration;

use crate::models::{CardMeta, CardState, ReviewOutcome};

/// Fixed interval steps (days) while a card is still being learned.
const LEARNING_STEPS: [i64; 2] = [1, 3];

const MIN_EASE: f64 = 1.3;
const MAX_EASE: f64 = 2.5;

fn clamp_ease(value: f64) -> f64 {
    value.clamp(MIN_EASE, MAX_EASE)
}

/// Compute the card meta resulting from one graded answer.
///
/// Deterministic and total: every numeric path is defined for any valid
/// meta, and the returned ease factor is always within [1.3, 2.5]. The
/// returned meta carries `due_at = Some(graded_at + interval)`.
pub fn compute_next(meta: &CardMeta, outcome: ReviewOutcome) -> CardMeta {
    let ReviewOutcome {
        was_correct,
        graded_at,
    } = outcome;

    if !was_correct {
        return CardMeta {
            interval_days: 1,
            ease_factor: clamp_ease(meta.ease_factor - 0.2),
            reps: meta.reps,
            lapses: meta.lapses + 1,
            success_streak: 0,
            state: CardState::Relearning,
            due_at: Some(graded_at + Duration::days(1)),
        };
    }

    let next_streak = meta.success_streak + 1;
    let next_ease = clamp_ease(meta.ease_factor + 0.1);

    match meta.state {
        CardState::New | CardState::Learning | CardState::Relearning => {
            // Step index saturates at the last ladder entry, so arbitrarily
            // large streaks (e.g. after manual data edits) stay in bounds.
            let step = (next_streak - 1).min(LEARNING_STEPS.len() as i64 - 1) as usize;
            let interval = LEARNING_STEPS[step];
            let state = if next_streak >= LEARNING_STEPS.len() as i64 {
                CardState::Review
            } else {
                CardState::Learning
            };
            CardMeta {
                interval_days: interval,
                ease_factor: next_ease,
                reps: meta.reps + 1,
                lapses: meta.lapses,
                success_streak: next_streak,
                state,
                due_at: Some(graded_at + Duration::days(interval)),
            }
        }
        CardState::Review => {
            // Growth base is the pre-update interval floored at 1, so a
            // stale zero interval cannot stall growth permanently.
            let base = meta.interval_days.max(1) as f64;
            let interval = ((base * next_ease).round() as i64).max(1);
            CardMeta {
                interval_days: interval,
                ease_factor: next_ease,
                reps: meta.reps + 1,
                lapses: meta.lapses,
                success_streak: next_streak,
                state: CardState::Review,
                due_at: Some(graded_at + Duration::days(interval)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn graded(was_correct: bool) -> ReviewOutcome {
        ReviewOutcome {
            was_correct,
            graded_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    fn meta(state: CardState, interval_days: i64, ease: f64, streak: i64) -> CardMeta {
        CardMeta {
            interval_days,
            ease_factor: ease,
            reps: 4,
            lapses: 1,
            success_streak: streak,
            state,
            due_at: None,
        }
    }

    mod incorrect_tests {
        use super::*;

        #[test]
        fn lapse_resets_regardless_of_state() {
            for state in [
                CardState::New,
                CardState::Learning,
                CardState::Review,
                CardState::Relearning,
            ] {
                let before = meta(state, 30, 2.0, 7);
                let after = compute_next(&before, graded(false));

                assert_eq!(after.interval_days, 1);
                assert_eq!(after.success_streak, 0);
                assert_eq!(after.state, CardState::Relearning);
                assert_eq!(after.lapses, before.lapses + 1);
                assert_eq!(after.reps, before.reps);
                assert!((after.ease_factor - 1.8).abs() < 1e-9);
            }
        }

        #[test]
        fn lapse_schedules_one_day_out() {
            let before = meta(CardState::Review, 30, 2.0, 7);
            let after = compute_next(&before, graded(false));
            let due = after.due_at.expect("lapse must schedule a due date");
            assert_eq!(due, graded(false).graded_at + Duration::days(1));
        }

        #[test]
        fn ease_never_drops_below_floor() {
            let before = meta(CardState::Review, 10, 1.35, 3);
            let after = compute_next(&before, graded(false));
            assert_eq!(after.ease_factor, 1.3);
        }
    }

    mod ladder_tests {
        use super::*;

        #[test]
        fn first_correct_answer_schedules_one_day() {
            let before = CardMeta::default();
            let after = compute_next(&before, graded(true));

            assert_eq!(after.interval_days, 1);
            assert_eq!(after.success_streak, 1);
            assert_eq!(after.state, CardState::Learning);
            assert_eq!(after.reps, 1);
        }

        #[test]
        fn second_correct_answer_schedules_three_days_and_graduates() {
            let first = compute_next(&CardMeta::default(), graded(true));
            let second = compute_next(&first, graded(true));

            assert_eq!(second.interval_days, 3);
            assert_eq!(second.success_streak, 2);
            assert_eq!(second.state, CardState::Review);
        }

        #[test]
        fn relearning_reenters_ladder_at_step_zero() {
            let lapsed = compute_next(&meta(CardState::Review, 20, 2.0, 9), graded(false));
            let recovered = compute_next(&lapsed, graded(true));

            assert_eq!(recovered.interval_days, 1);
            assert_eq!(recovered.success_streak, 1);
            assert_eq!(recovered.state, CardState::Learning);
        }

        #[test]
        fn oversized_streak_saturates_at_last_step() {
            // A learning-state card with an inconsistent huge streak must not
            // index past the ladder.
            let before = meta(CardState::Learning, 1, 2.0, 500);
            let after = compute_next(&before, graded(true));

            assert_eq!(after.interval_days, 3);
            assert_eq!(after.state, CardState::Review);
        }

        #[test]
        fn correct_answer_bumps_ease() {
            let before = meta(CardState::New, 1, 2.0, 0);
            let after = compute_next(&before, graded(true));
            assert!((after.ease_factor - 2.1).abs() < 1e-9);
        }
    }

    mod review_growth_tests {
        use super::*;

        #[test]
        fn interval_grows_by_updated_ease() {
            let before = meta(CardState::Review, 10, 2.0, 2);
            let after = compute_next(&before, graded(true));

            assert!((after.ease_factor - 2.1).abs() < 1e-9);
            assert_eq!(after.interval_days, 21); // round(10 * 2.1)
            assert_eq!(after.state, CardState::Review);
            assert_eq!(after.reps, before.reps + 1);
            assert_eq!(after.success_streak, before.success_streak + 1);
        }

        #[test]
        fn stale_zero_interval_grows_from_one() {
            let before = meta(CardState::Review, 0, 2.0, 2);
            let after = compute_next(&before, graded(true));
            assert_eq!(after.interval_days, 2); // round(max(1, 0) * 2.1)
        }

        #[test]
        fn ease_caps_at_ceiling() {
            let before = meta(CardState::Review, 10, 2.45, 2);
            let after = compute_next(&before, graded(true));
            assert_eq!(after.ease_factor, 2.5);
        }

        #[test]
        fn due_date_matches_interval() {
            let before = meta(CardState::Review, 10, 2.0, 2);
            let after = compute_next(&before, graded(true));
            assert_eq!(
                after.due_at.unwrap(),
                graded(true).graded_at + Duration::days(21)
            );
        }
    }

    mod invariant_tests {
        use super::*;
        use rand::Rng;

        #[test]
        fn ease_stays_clamped_under_random_updates() {
            let mut rng = rand::thread_rng();
            let mut meta = CardMeta::default();

            for _ in 0..1000 {
                meta = compute_next(&meta, graded(rng.gen_bool(0.5)));
                assert!(
                    (1.3..=2.5).contains(&meta.ease_factor),
                    "ease {} escaped clamp",
                    meta.ease_factor
                );
                assert!(meta.interval_days >= 1);
                assert!(meta.success_streak >= 0);
                assert!(meta.due_at.is_some());
            }
        }

        #[test]
        fn counters_only_move_forward() {
            let mut rng = rand::thread_rng();
            let mut meta = CardMeta::default();

            for _ in 0..200 {
                let next = compute_next(&meta, graded(rng.gen_bool(0.5)));
                assert!(next.reps >= meta.reps);
                assert!(next.lapses >= meta.lapses);
                meta = next;
            }
        }
    }
}
