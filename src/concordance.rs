//! Concordance with the ratio model, over one or more indicators.
//!
//! For a single indicator
//!
//! ```text
//! concordance = [number of concordant days in evaluation period] / [number of days in evaluation period]
//! ```
//!
//! and with more than one indicator the total is the mean of the per-indicator scores each
//! patient has.
use itertools::Itertools;
use qu::ick_use::*;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    prepare_for_patients, score, ActivityTable, ArcStr, ConcordanceScores, EvaluationWindow,
    PatientId, ValidityPeriods,
};

/// What to calculate: the evaluation period and the indicators to score.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcordanceRequest {
    pub window: EvaluationWindow,
    pub indicators: Vec<ArcStr>,
}

impl ConcordanceRequest {
    pub fn new(
        window: EvaluationWindow,
        indicators: impl IntoIterator<Item = impl Into<ArcStr>>,
    ) -> Self {
        ConcordanceRequest {
            window,
            indicators: indicators.into_iter().map(Into::into).collect(),
        }
    }

    /// A request for a single indicator.
    pub fn single(window: EvaluationWindow, indicator: impl Into<ArcStr>) -> Self {
        ConcordanceRequest {
            window,
            indicators: vec![indicator.into()],
        }
    }

    /// Check the request against the input and the validity periods.
    ///
    /// Everything is checked before any scores are calculated, so a bad request never produces
    /// partial output.
    pub fn validate(&self, table: &ActivityTable, validity_periods: &ValidityPeriods) -> Result {
        ensure!(
            !table.is_empty(),
            "the activity table is empty, please provide some activity records"
        );
        ensure!(
            !self.indicators.is_empty(),
            "no indicators were requested, provide at least one indicator"
        );
        let duplicates = self.indicators.iter().duplicates().collect::<Vec<_>>();
        ensure!(
            duplicates.is_empty(),
            "the following indicators were requested more than once: {}",
            duplicates.iter().map(|ind| format!("\"{}\"", ind)).join(", ")
        );
        let missing_columns = self
            .indicators
            .iter()
            .filter(|ind| table.indicator_index(ind).is_none())
            .map(|ind| format!("\"{}\"", ind))
            .collect::<Vec<_>>();
        ensure!(
            missing_columns.is_empty(),
            "the following required columns are missing: {}",
            missing_columns.join(", ")
        );
        let missing_periods = validity_periods.missing(self.indicators.iter().map(|ind| &**ind));
        ensure!(
            missing_periods.is_empty(),
            "the following indicators do not have a validity period: {}",
            missing_periods
                .iter()
                .map(|ind| format!("\"{}\"", ind))
                .join(", ")
        );
        Ok(())
    }
}

/// Calculate concordance scores with the ratio model.
///
/// Every patient in `table` gets a row. Patients with no flagged activity for an indicator get no
/// score for that indicator.
pub fn calc_concordance_with_ratio(
    table: &ActivityTable,
    request: &ConcordanceRequest,
    validity_periods: &ValidityPeriods,
) -> Result<ConcordanceScores> {
    request.validate(table, validity_periods)?;
    event!(
        Level::INFO,
        "calculating concordance for {} over {}",
        request.indicators.iter().join(", "),
        request.window
    );

    // indicators are independent, so score them in parallel.
    let per_indicator = request
        .indicators
        .par_iter()
        .map(|indicator| -> Result<_> {
            let validity_duration = validity_periods
                .get(indicator)
                .with_context(|| format!("no validity period for \"{}\"", indicator))?;
            let (scores, missing) =
                calc_ratio_of_concordant_period(table, indicator, &request.window, validity_duration)?;
            Ok((indicator.clone(), scores, missing))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ConcordanceScores::merge(table.patient_ids(), per_indicator))
}

/// Score a single indicator.
///
/// Returns the ratio for every patient with at least one flagged activity, and the number of
/// flagged activities that were left out because they had no date. A patient whose flagged
/// activity is all undated scores 0.
pub fn calc_ratio_of_concordant_period(
    table: &ActivityTable,
    indicator: &str,
    window: &EvaluationWindow,
    validity_duration: f64,
) -> Result<(BTreeMap<PatientId, f64>, usize)> {
    let flagged = table
        .flagged(indicator)
        .with_context(|| format!("the column \"{}\" is missing", indicator))?;

    // undated activity still puts the patient in the scores for this indicator.
    let mut patients = BTreeSet::new();
    let mut missing_dates = 0;
    let mut records = vec![];
    for row in flagged {
        patients.insert(row.patient_id.clone());
        match row.date {
            Some(date) => records.push((row.patient_id.clone(), date)),
            None => missing_dates += 1,
        }
    }
    if missing_dates > 0 {
        event!(
            Level::WARN,
            "the indicator \"{}\" has {} activities without a date; they are not included in \
             the concordance score",
            indicator,
            missing_dates
        );
    }

    event!(
        Level::DEBUG,
        "\"{}\": {} dated activities for {} patients, validity {} days",
        indicator,
        records.len(),
        patients.len(),
        validity_duration
    );

    let prepared = prepare_for_patients(patients, records, validity_duration, window);
    Ok((score(&prepared, validity_duration, window.length()), missing_dates))
}
