//! Turning raw activity dates into per-patient timelines that can be scanned for gaps.
//!
//! For each patient we keep
//!
//!  1. one *anchor* before the evaluation window. This is the most recent activity before the
//!     window, unless there is none or it is so old that its validity ran out before the
//!     window started, in which case we use the *dummy date* `start - validity_duration`
//!     instead. The anchor never adds covered days inside the window by itself; it only stops
//!     the first gap from being measured against nothing.
//!  2. all activity inside the window (inclusive at both ends).
//!  3. a *sentinel* one day after the window ends, so the coverage of the last activity through
//!     the end of the window is measured as an ordinary gap.
//!
//! Everything else is dropped.
use chrono::NaiveDateTime;
use std::{
    collections::{btree_map, btree_set, BTreeMap, BTreeSet},
    iter,
};

use crate::EvaluationWindow;

/// The prepared timelines of all patients for a single indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTimelines<P> {
    timelines: BTreeMap<P, Timeline>,
}

/// The ordered, de-duplicated dates for one patient.
///
/// Always contains at least the anchor and the sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    dates: BTreeSet<NaiveDateTime>,
}

impl Timeline {
    /// The dates in ascending order.
    pub fn iter(&self) -> iter::Copied<btree_set::Iter<'_, NaiveDateTime>> {
        self.dates.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first(&self) -> Option<NaiveDateTime> {
        self.dates.iter().next().copied()
    }
}

impl<P: Ord> PreparedTimelines<P> {
    /// Look up a single patient's timeline.
    pub fn get(&self, patient_id: &P) -> Option<&Timeline> {
        self.timelines.get(patient_id)
    }

    /// Iterate over patients and their timelines, ordered by patient.
    pub fn iter(&self) -> btree_map::Iter<'_, P, Timeline> {
        self.timelines.iter()
    }

    /// Iterate over `(patient, date)` rows, sorted by patient then date.
    pub fn rows(&self) -> impl Iterator<Item = (&P, NaiveDateTime)> + '_ {
        self.timelines
            .iter()
            .flat_map(|(patient_id, timeline)| timeline.iter().map(move |date| (patient_id, date)))
    }

    /// The number of patients.
    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }
}

/// Prepare raw `(patient, date)` activity for a single indicator.
///
/// Every patient that appears in `records` gets a timeline, even if none of their activity is
/// usable.
pub fn prepare<P, I>(
    records: I,
    validity_duration: f64,
    window: &EvaluationWindow,
) -> PreparedTimelines<P>
where
    P: Ord + Clone,
    I: IntoIterator<Item = (P, NaiveDateTime)>,
{
    prepare_for_patients(iter::empty(), records, validity_duration, window)
}

/// Like `prepare`, but every patient in `patients` also gets a timeline.
///
/// Patients with no dated activity get only the dummy date and the sentinel, so they score 0.
pub fn prepare_for_patients<P, Q, I>(
    patients: Q,
    records: I,
    validity_duration: f64,
    window: &EvaluationWindow,
) -> PreparedTimelines<P>
where
    P: Ord + Clone,
    Q: IntoIterator<Item = P>,
    I: IntoIterator<Item = (P, NaiveDateTime)>,
{
    let start = window.start();
    let dummy_date = window.dummy_date(validity_duration);
    let sentinel_date = window.sentinel_date();

    // The most recent activity before the window, if any.
    let mut last_before: BTreeMap<P, Option<NaiveDateTime>> =
        patients.into_iter().map(|patient_id| (patient_id, None)).collect();
    let mut in_window: Vec<(P, NaiveDateTime)> = vec![];
    for (patient_id, date) in records {
        let entry = last_before.entry(patient_id.clone()).or_insert(None);
        if date < start {
            if entry.map_or(true, |prev| prev < date) {
                *entry = Some(date);
            }
        } else if window.contains(date) {
            in_window.push((patient_id, date));
        }
    }

    let mut timelines: BTreeMap<P, Timeline> = last_before
        .into_iter()
        .map(|(patient_id, last)| {
            // clip old (or missing) activity to the dummy date.
            let anchor = match last {
                Some(date) if date >= dummy_date => date,
                _ => dummy_date,
            };
            let dates = BTreeSet::from([anchor, sentinel_date]);
            (patient_id, Timeline { dates })
        })
        .collect();

    for (patient_id, date) in in_window {
        // Every patient got an entry above.
        if let Some(timeline) = timelines.get_mut(&patient_id) {
            timeline.dates.insert(date);
        }
    }

    PreparedTimelines { timelines }
}

#[cfg(test)]
mod test {
    use super::{prepare, prepare_for_patients};
    use crate::EvaluationWindow;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn window() -> EvaluationWindow {
        EvaluationWindow::parse("2021-01-01", 10).unwrap()
    }

    #[test]
    fn anchor_and_sentinel() {
        let prepared = prepare(
            vec![
                ("x", dt(2020, 12, 29)),
                ("x", dt(2021, 1, 3)),
                ("x", dt(2020, 12, 28)),
                ("x", dt(2021, 1, 9)),
            ],
            5.,
            &window(),
        );
        let dates = prepared.get(&"x").unwrap().iter().collect::<Vec<_>>();
        assert_eq!(
            dates,
            vec![
                dt(2020, 12, 29),
                dt(2021, 1, 3),
                dt(2021, 1, 9),
                dt(2021, 1, 11)
            ]
        );
    }

    #[test]
    fn old_activity_is_clipped() {
        let prepared = prepare(
            vec![("old", dt(2019, 6, 1)), ("none", dt(2021, 5, 1))],
            5.,
            &window(),
        );
        // activity older than the dummy date is moved up to it.
        assert_eq!(prepared.get(&"old").unwrap().first(), Some(dt(2020, 12, 27)));
        // no activity before the window at all also gets the dummy date.
        let none = prepared.get(&"none").unwrap();
        assert_eq!(
            none.iter().collect::<Vec<_>>(),
            vec![dt(2020, 12, 27), dt(2021, 1, 11)]
        );
    }

    #[test]
    fn window_edges_and_duplicates() {
        let prepared = prepare(
            vec![
                (1, dt(2021, 1, 1)),
                (1, dt(2021, 1, 1)),
                (1, dt(2021, 1, 10)),
                (1, dt(2021, 1, 11)),
                (1, dt(2021, 1, 10) + Duration::hours(1)),
            ],
            0.,
            &window(),
        );
        // with a validity of 0 the dummy date is the start date, which collapses with the
        // activity on the start date.
        let dates = prepared.get(&1).unwrap().iter().collect::<Vec<_>>();
        assert_eq!(dates, vec![dt(2021, 1, 1), dt(2021, 1, 10), dt(2021, 1, 11)]);
    }

    #[test]
    fn rows_are_sorted() {
        let prepared = prepare(
            vec![("b", dt(2021, 1, 5)), ("a", dt(2021, 1, 7)), ("a", dt(2021, 1, 2))],
            2.,
            &window(),
        );
        assert_eq!(prepared.len(), 2);
        let rows = prepared.rows().map(|(p, d)| (*p, d)).collect::<Vec<_>>();
        assert_eq!(
            rows,
            vec![
                ("a", dt(2020, 12, 30)),
                ("a", dt(2021, 1, 2)),
                ("a", dt(2021, 1, 7)),
                ("a", dt(2021, 1, 11)),
                ("b", dt(2020, 12, 30)),
                ("b", dt(2021, 1, 5)),
                ("b", dt(2021, 1, 11)),
            ]
        );
    }

    #[test]
    fn patients_without_dates() {
        let prepared = prepare_for_patients(
            vec!["undated", "dated"],
            vec![("dated", dt(2021, 1, 5))],
            5.,
            &window(),
        );
        assert_eq!(prepared.len(), 2);
        let undated = prepared.get(&"undated").unwrap();
        assert!(!undated.is_empty());
        assert_eq!(
            undated.iter().collect::<Vec<_>>(),
            vec![dt(2020, 12, 27), dt(2021, 1, 11)]
        );
        assert_eq!(prepared.get(&"dated").unwrap().len(), 3);
    }

    #[test]
    fn empty() {
        let prepared = prepare(Vec::<(u64, NaiveDateTime)>::new(), 5., &window());
        assert!(prepared.is_empty());
    }
}
