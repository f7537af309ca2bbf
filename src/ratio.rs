//! The coverage ratio: the fraction of the evaluation window covered by valid activity.
//!
//! Each activity is assumed to cover the `validity_duration` days after it. Walking a prepared
//! timeline, the part of each gap between consecutive dates that exceeds the validity duration
//! is uncovered. The ratio is then
//!
//! ```text
//! ratio = (evaluation_length - total_uncovered) / evaluation_length
//! ```
//!
//! The ratio is never more than 1, and is not clamped at 0.
use chrono::NaiveDateTime;
use itertools::Itertools;
use std::collections::BTreeMap;

use crate::{prepare::Timeline, util::duration_to_days, PreparedTimelines};

/// The days between consecutive activity dates not covered by the earlier one.
///
/// Gaps shorter than the validity duration contribute nothing (no credit carries over).
pub fn uncovered_days(
    dates: impl Iterator<Item = NaiveDateTime>,
    validity_duration: f64,
) -> impl Iterator<Item = f64> {
    dates
        .tuple_windows()
        .map(move |(prev, next)| (duration_to_days(next - prev) - validity_duration).max(0.))
}

/// The total uncovered days for one patient's timeline.
pub fn total_uncovered(timeline: &Timeline, validity_duration: f64) -> f64 {
    uncovered_days(timeline.iter(), validity_duration).sum()
}

/// Score every patient in `prepared`.
///
/// Returns one ratio per patient with at least two dates (after preparation, that is every
/// patient).
pub fn score<P>(
    prepared: &PreparedTimelines<P>,
    validity_duration: f64,
    evaluation_length: u32,
) -> BTreeMap<P, f64>
where
    P: Ord + Clone,
{
    let length = f64::from(evaluation_length);
    prepared
        .iter()
        .filter(|(_, timeline)| timeline.len() >= 2)
        .map(|(patient_id, timeline)| {
            let uncovered = total_uncovered(timeline, validity_duration);
            (patient_id.clone(), (length - uncovered) / length)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::{score, uncovered_days};
    use crate::{prepare, EvaluationWindow};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn assert_close(left: f64, right: f64) {
        assert!(
            (left - right).abs() < 1e-9,
            "left: {}, right: {}",
            left,
            right
        );
    }

    fn score_one(dates: Vec<NaiveDateTime>, validity: f64, start: &str, length: u32) -> f64 {
        let window = EvaluationWindow::parse(start, length).unwrap();
        let prepared = prepare(dates.into_iter().map(|date| ("p", date)), validity, &window);
        let scores = score(&prepared, validity, length);
        assert_eq!(scores.len(), 1);
        scores["p"]
    }

    #[test]
    fn worked_example() {
        // gaps: 5 days (0 uncovered), 6 days (1 uncovered), 2 days (0 uncovered)
        let ratio = score_one(
            vec![dt(2020, 12, 29), dt(2021, 1, 3), dt(2021, 1, 9)],
            5.,
            "2021-01-01",
            10,
        );
        assert_eq!(ratio, 0.9);
    }

    #[test]
    fn uncovered_is_never_negative() {
        let start = dt(2021, 1, 1);
        for validity in [0., 0.5, 1., 7., 30., 365.] {
            let mut dates = vec![];
            let mut date = start;
            for step in 0..50i64 {
                date += Duration::hours((step * 37) % 500);
                dates.push(date);
            }
            let gaps = uncovered_days(dates.into_iter(), validity).collect::<Vec<_>>();
            assert_eq!(gaps.len(), 49);
            assert!(gaps.iter().all(|gap| *gap >= 0.));
            assert!(gaps.iter().sum::<f64>() >= 0.);
        }
    }

    #[test]
    fn clipped_anchor_scores_the_same() {
        let later = vec![dt(2021, 2, 1), dt(2021, 4, 15)];
        let with_prior = |days_before: i64| {
            let mut dates = later.clone();
            dates.push(dt(2021, 1, 1) - Duration::days(days_before));
            score_one(dates, 30., "2021-01-01", 180)
        };
        assert_eq!(with_prior(100), with_prior(1000));
        // no prior activity behaves like prior activity exactly on the dummy date.
        assert_eq!(score_one(later.clone(), 30., "2021-01-01", 180), with_prior(30));
    }

    #[test]
    fn perfect_coverage() {
        // every 10 days from before the window to past the end.
        let dates = (0..12)
            .map(|i| dt(2020, 12, 25) + Duration::days(i * 10))
            .collect::<Vec<_>>();
        assert_eq!(score_one(dates, 10., "2021-01-01", 100), 1.);

        // closer together than the validity duration.
        let dates = (0..40)
            .map(|i| dt(2020, 12, 30) + Duration::days(i * 3))
            .collect::<Vec<_>>();
        assert_eq!(score_one(dates, 10., "2021-01-01", 100), 1.);
    }

    #[test]
    fn single_gap() {
        // anchor exactly on the dummy date (10 days before the start), next activity 20 days
        // later, then the sentinel 20 days after that.
        let ratio = score_one(
            vec![dt(2020, 12, 22), dt(2021, 1, 11)],
            10.,
            "2021-01-01",
            30,
        );
        assert_eq!(ratio, (30. - 10. - 10.) / 30.);
    }

    #[test]
    fn no_activity_in_window() {
        // Only the gap from the dummy date to the sentinel: length + validity days, of which
        // `length` are uncovered.
        let ratio = score_one(vec![dt(2021, 6, 1)], 10., "2021-01-01", 30);
        assert_eq!(ratio, 0.);
    }

    #[test]
    fn lowest_ratio() {
        // The anchor is never before the dummy date, so the uncovered days can't exceed the
        // window length. One activity on the first day with no validity lands exactly on 0.
        let window = EvaluationWindow::parse("2021-01-01", 10).unwrap();
        let prepared = prepare(vec![("p", dt(2021, 1, 1))], 0., &window);
        let scores = score(&prepared, 0., 10);
        assert_close(scores["p"], 0.);
    }

    #[test]
    fn fractional_days() {
        let gaps = uncovered_days(
            vec![dt(2021, 1, 1), dt(2021, 1, 3) + Duration::hours(12)].into_iter(),
            2.,
        )
        .collect::<Vec<_>>();
        assert_eq!(gaps, vec![0.5]);
    }
}
