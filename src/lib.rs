//! Concordance scores from clinical activity records.
//!
//! For each patient and indicator, the score is the fraction of an evaluation period during which
//! the patient was covered by a qualifying activity, where each activity stays valid for a fixed
//! number of days.
mod activities;
mod bands;
mod concordance;
mod prepare;
mod ratio;
mod scores;
mod util;
mod validity;
mod window;

pub use anyhow::{Context, Error};
use std::sync::Arc;

pub use crate::{
    activities::{ActivityRow, ActivityTable, Columns},
    bands::{Band, BandCounts, ScoreBands},
    concordance::{calc_concordance_with_ratio, calc_ratio_of_concordant_period, ConcordanceRequest},
    prepare::{prepare, prepare_for_patients, PreparedTimelines, Timeline},
    ratio::{score, total_uncovered, uncovered_days},
    scores::{ConcordanceScores, PatientScores, SCORE_COLUMN_PREFIX, TOTAL_COLUMN},
    util::header,
    validity::{ValidityPeriods, DEFAULT_VALIDITY_PERIODS_FILE},
    window::EvaluationWindow,
};

pub type ArcStr = Arc<str>;
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
pub type PatientId = ArcStr;
