//! The result of a concordance calculation: one row per patient, one column per indicator.
use qu::ick_use::*;
use std::{
    collections::{btree_map, BTreeMap},
    fs, io,
    path::Path,
};
use term_data_table::{Cell, Row, Table};

use crate::{util, ArcStr, BandCounts, PatientId, ScoreBands};

/// The prefix of every score column.
pub const SCORE_COLUMN_PREFIX: &str = "concordance_";
/// The name of the averaged column.
pub const TOTAL_COLUMN: &str = "concordance_total";

/// The scores of a single patient.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientScores {
    /// One entry per requested indicator. `None` if the patient had no activity for it.
    scores: Vec<Option<f64>>,
    total: Option<f64>,
}

impl PatientScores {
    /// The per-indicator scores, in the order of `ConcordanceScores::indicators`.
    pub fn scores(&self) -> &[Option<f64>] {
        &self.scores
    }

    /// The mean of the scores present, if there is more than one indicator.
    pub fn total(&self) -> Option<f64> {
        self.total
    }
}

/// Concordance scores for all patients in the input.
#[derive(Debug, Clone)]
pub struct ConcordanceScores {
    indicators: Vec<ArcStr>,
    with_total: bool,
    patients: BTreeMap<PatientId, PatientScores>,
    missing_dates: Vec<usize>,
}

impl ConcordanceScores {
    /// Merge per-indicator scores into one table.
    ///
    /// `patients` are all patients that should get a row. A patient absent from an indicator's
    /// scores gets no score for it (not 0). When there is more than one indicator, a total is
    /// calculated as the mean of the scores present.
    pub(crate) fn merge(
        patients: impl IntoIterator<Item = PatientId>,
        per_indicator: Vec<(ArcStr, BTreeMap<PatientId, f64>, usize)>,
    ) -> Self {
        let width = per_indicator.len();
        let with_total = width > 1;
        let mut indicators = Vec::with_capacity(per_indicator.len());
        let mut missing_dates = Vec::with_capacity(per_indicator.len());
        let mut patients: BTreeMap<PatientId, PatientScores> = patients
            .into_iter()
            .map(|patient_id| {
                let scores = PatientScores {
                    scores: vec![None; width],
                    total: None,
                };
                (patient_id, scores)
            })
            .collect();

        for (idx, (indicator, scores, missing)) in per_indicator.into_iter().enumerate() {
            indicators.push(indicator);
            missing_dates.push(missing);
            for (patient_id, score) in scores {
                // outer join: the patient list should already contain everyone.
                let row = patients.entry(patient_id).or_insert_with(|| PatientScores {
                    scores: vec![None; width],
                    total: None,
                });
                row.scores[idx] = Some(score);
            }
        }

        if with_total {
            for row in patients.values_mut() {
                row.total = mean(row.scores.iter().flatten().copied());
            }
        }

        ConcordanceScores {
            indicators,
            with_total,
            patients,
            missing_dates,
        }
    }

    /// The indicators, in the order they were requested.
    pub fn indicators(&self) -> &[ArcStr] {
        &self.indicators
    }

    /// Whether there is a `concordance_total` column.
    pub fn has_total(&self) -> bool {
        self.with_total
    }

    /// The output column names, excluding the patient column.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = self
            .indicators
            .iter()
            .map(|indicator| format!("{}{}", SCORE_COLUMN_PREFIX, indicator))
            .collect::<Vec<_>>();
        if self.with_total {
            names.push(TOTAL_COLUMN.to_string());
        }
        names
    }

    /// The scores of one patient.
    pub fn patient(&self, patient_id: &str) -> Option<&PatientScores> {
        self.patients.get(patient_id)
    }

    /// The score for a patient and indicator.
    pub fn get(&self, patient_id: &str, indicator: &str) -> Option<f64> {
        let idx = self.indicator_index(indicator)?;
        self.patient(patient_id)?.scores[idx]
    }

    /// The averaged score for a patient.
    pub fn total(&self, patient_id: &str) -> Option<f64> {
        self.patient(patient_id)?.total
    }

    /// How many flagged activities without a date were left out for an indicator.
    pub fn missing_dates(&self, indicator: &str) -> Option<usize> {
        let idx = self.indicator_index(indicator)?;
        self.missing_dates.get(idx).copied()
    }

    /// Iterate over patients and their scores, ordered by patient.
    pub fn iter(&self) -> btree_map::Iter<'_, PatientId, PatientScores> {
        self.patients.iter()
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    /// Bucket the scores of one indicator. Patients without a score count as missing.
    pub fn bands<'a>(&self, indicator: &str, bands: &'a ScoreBands) -> Option<BandCounts<'a>> {
        let idx = self.indicator_index(indicator)?;
        Some(bands.bucket(self.patients.values().map(|row| row.scores[idx])))
    }

    /// Bucket the averaged scores. `None` if there is no total column.
    pub fn total_bands<'a>(&self, bands: &'a ScoreBands) -> Option<BandCounts<'a>> {
        if !self.with_total {
            return None;
        }
        Some(bands.bucket(self.patients.values().map(|row| row.total)))
    }

    /// A table for printing on the terminal.
    pub fn term_table(&self, patient_column: &str) -> Table<'_> {
        let mut header = Row::new().with_cell(Cell::from(patient_column.to_string()));
        for name in self.column_names() {
            header = header.with_cell(Cell::from(name));
        }
        let mut table = Table::new().with_row(header);
        for (patient_id, row) in self.iter() {
            let mut cells = Row::new().with_cell(Cell::from(patient_id.to_string()));
            for score in row.cells(self.with_total) {
                cells = cells.with_cell(Cell::from(format_score(score, 3)));
            }
            table.add_row(cells);
        }
        table
    }

    /// Write the scores as CSV, with empty cells for missing scores.
    pub fn write_csv(&self, writer: impl io::Write, patient_column: &str) -> Result {
        let mut writer = csv::Writer::from_writer(writer);
        let mut header = vec![patient_column.to_string()];
        header.extend(self.column_names());
        writer.write_record(&header)?;
        for (patient_id, row) in self.iter() {
            let mut record = vec![patient_id.to_string()];
            record.extend(row.cells(self.with_total).map(|score| {
                score.map(|score| score.to_string()).unwrap_or_default()
            }));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Save the scores to a CSV file.
    pub fn save_csv(&self, path: impl AsRef<Path>, patient_column: &str) -> Result {
        fn inner(this: &ConcordanceScores, path: &Path, patient_column: &str) -> Result {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("could not create parent")?;
            }
            if util::path_exists(path)? {
                event!(
                    Level::WARN,
                    "overwriting existing file at \"{}\"",
                    path.display()
                );
            }
            let out = io::BufWriter::new(fs::File::create(path)?);
            this.write_csv(out, patient_column)
        }
        let path = path.as_ref();
        inner(self, path, patient_column)
            .with_context(|| format!("unable to save scores to \"{}\"", path.display()))
    }

    fn indicator_index(&self, indicator: &str) -> Option<usize> {
        self.indicators.iter().position(|name| &**name == indicator)
    }
}

impl PatientScores {
    /// The output cells after the patient column.
    fn cells(&self, with_total: bool) -> impl Iterator<Item = Option<f64>> + '_ {
        let total = if with_total { Some(self.total) } else { None };
        self.scores.iter().copied().chain(total)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0., 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn format_score(score: Option<f64>, precision: usize) -> String {
    match score {
        Some(score) => format!("{:.*}", precision, score),
        None => String::new(),
    }
}
