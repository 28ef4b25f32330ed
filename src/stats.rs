use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// All recorded marks for one goal: calendar day to done flag.
/// A day missing from the map counts the same as one marked `false`.
pub type MarkSet = BTreeMap<NaiveDate, bool>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalStats {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub completion_rate: f64,
}

pub fn goal_stats(marks: &MarkSet, today: NaiveDate, month: Option<(i32, u32)>) -> GoalStats {
    GoalStats {
        current_streak: current_streak(marks, today),
        longest_streak: longest_streak(marks),
        completion_rate: month
            .map(|(year, month)| completion_rate(marks, year, month))
            .unwrap_or(0.0),
    }
}

/// Consecutive done days ending at `today`, walking backward one calendar
/// day at a time. Stops at the first day that is unmarked or marked false,
/// so `today` itself not being done means a streak of 0.
pub fn current_streak(marks: &MarkSet, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut day = today;

    while marks.get(&day).copied().unwrap_or(false) {
        streak += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }

    streak
}

/// Longest run of consecutive done days anywhere in the goal's history,
/// not bounded by any reference date.
pub fn longest_streak(marks: &MarkSet) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for (&day, &done) in marks {
        if !done {
            continue;
        }

        // The run survives only if this day directly follows the previous
        // done day; a skipped or false-marked day in between resets it.
        run = match previous {
            Some(previous) if day - previous == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    longest
}

/// Share of days in the given month that carry a done mark, as a
/// percentage in [0, 100].
pub fn completion_rate(marks: &MarkSet, year: i32, month: u32) -> f64 {
    let last = days_in_month(year, month);
    if last == 0 {
        return 0.0;
    }

    let done = (1..=last)
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .filter(|day| marks.get(day).copied().unwrap_or(false))
        .count();

    done as f64 / f64::from(last) * 100.0
}

/// Number of days in a calendar month, 0 when (year, month) does not name
/// a valid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };

    next.map(|next| (next - first).num_days() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{GoalStats, MarkSet, completion_rate, current_streak, days_in_month, goal_stats, longest_streak};
    use chrono::NaiveDate;

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn marks(entries: &[(NaiveDate, bool)]) -> MarkSet {
        entries.iter().copied().collect()
    }

    #[test]
    fn empty_marks_yield_zero_stats() {
        let stats = goal_stats(&MarkSet::new(), day(2024, 3, 5), Some((2024, 3)));

        assert_eq!(
            stats,
            GoalStats {
                current_streak: 0,
                longest_streak: 0,
                completion_rate: 0.0,
            }
        );
    }

    #[test]
    fn unbroken_run_ending_today_counts_fully() {
        let marks = marks(&[
            (day(2024, 3, 1), true),
            (day(2024, 3, 2), true),
            (day(2024, 3, 3), true),
            (day(2024, 3, 4), true),
            (day(2024, 3, 5), true),
        ]);

        assert_eq!(current_streak(&marks, day(2024, 3, 5)), 5);
        assert_eq!(longest_streak(&marks), 5);
    }

    #[test]
    fn current_streak_is_zero_when_today_is_unmarked() {
        let marks = marks(&[(day(2024, 3, 4), true)]);

        assert_eq!(current_streak(&marks, day(2024, 3, 5)), 0);
    }

    #[test]
    fn current_streak_is_zero_when_today_is_marked_false() {
        let marks = marks(&[(day(2024, 3, 4), true), (day(2024, 3, 5), false)]);

        assert_eq!(current_streak(&marks, day(2024, 3, 5)), 0);
    }

    #[test]
    fn current_and_longest_streak_can_diverge() {
        // A finished five-day run earlier in the month does not help the
        // current streak once today is unmarked.
        let marks = marks(&[
            (day(2024, 1, 1), true),
            (day(2024, 1, 2), true),
            (day(2024, 1, 3), true),
            (day(2024, 1, 4), true),
            (day(2024, 1, 5), true),
        ]);

        assert_eq!(current_streak(&marks, day(2024, 1, 10)), 0);
        assert_eq!(longest_streak(&marks), 5);
    }

    #[test]
    fn false_mark_breaks_a_run_like_a_gap() {
        let marks = marks(&[
            (day(2024, 3, 1), true),
            (day(2024, 3, 2), true),
            (day(2024, 3, 3), true),
            (day(2024, 3, 4), false),
            (day(2024, 3, 5), true),
            (day(2024, 3, 6), true),
        ]);

        assert_eq!(longest_streak(&marks), 3);
        assert_eq!(current_streak(&marks, day(2024, 3, 6)), 2);
    }

    #[test]
    fn runs_do_not_bridge_month_boundaries_with_gaps() {
        let marks = marks(&[
            (day(2024, 2, 28), true),
            (day(2024, 2, 29), true),
            (day(2024, 3, 1), true),
            (day(2024, 3, 3), true),
        ]);

        // Leap-year February rolls into March without a break.
        assert_eq!(longest_streak(&marks), 3);
    }

    #[test]
    fn future_marks_count_for_longest_but_not_current() {
        let marks = marks(&[
            (day(2024, 3, 10), true),
            (day(2024, 3, 11), true),
            (day(2024, 3, 12), true),
        ]);

        assert_eq!(current_streak(&marks, day(2024, 3, 5)), 0);
        assert_eq!(longest_streak(&marks), 3);
    }

    #[test]
    fn completion_rate_counts_only_done_days_in_month() {
        let mut all = MarkSet::new();
        for d in 1..=15 {
            all.insert(day(2024, 4, d), true);
        }
        // False marks and marks outside April must not move the rate.
        all.insert(day(2024, 4, 20), false);
        all.insert(day(2024, 3, 31), true);
        all.insert(day(2024, 5, 1), true);

        assert_eq!(completion_rate(&all, 2024, 4), 50.0);
    }

    #[test]
    fn completion_rate_is_zero_for_invalid_month() {
        let marks = marks(&[(day(2024, 4, 1), true)]);

        assert_eq!(completion_rate(&marks, 2024, 13), 0.0);
    }

    #[test]
    fn stats_are_deterministic_for_unchanged_marks() {
        let marks = marks(&[
            (day(2024, 4, 1), true),
            (day(2024, 4, 2), true),
            (day(2024, 4, 4), true),
        ]);
        let today = day(2024, 4, 4);

        assert_eq!(
            goal_stats(&marks, today, Some((2024, 4))),
            goal_stats(&marks, today, Some((2024, 4)))
        );
    }

    #[test]
    fn stats_without_month_pair_report_zero_rate() {
        let marks = marks(&[(day(2024, 4, 1), true)]);
        let stats = goal_stats(&marks, day(2024, 4, 1), None);

        assert_eq!(stats.completion_rate, 0.0);
        assert_eq!(stats.current_streak, 1);
    }

    #[test]
    fn month_lengths_cover_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
        assert_eq!(days_in_month(2024, 0), 0);
    }
}
