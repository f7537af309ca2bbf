//! The input table: one row per recorded clinical activity.
use chrono::NaiveDateTime;
use itertools::Itertools;
use qu::ick_use::*;
use std::{collections::BTreeSet, fs, io, path::Path};

use crate::{
    util::{parse_date_time, parse_flag},
    ArcStr, PatientId,
};

/// Which columns of the input hold the patient identifier and the activity date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    pub patient: ArcStr,
    pub date: ArcStr,
}

impl Columns {
    pub fn new(patient: impl Into<ArcStr>, date: impl Into<ArcStr>) -> Self {
        Columns {
            patient: patient.into(),
            date: date.into(),
        }
    }
}

/// A row in the activity table.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRow {
    pub patient_id: PatientId,
    /// `None` if the date was not recorded.
    pub date: Option<NaiveDateTime>,
    /// One flag per indicator column, in the order of `ActivityTable::indicators`.
    flags: Vec<bool>,
}

impl ActivityRow {
    /// Whether the activity qualifies for the indicator at `idx`.
    pub fn flag(&self, idx: usize) -> bool {
        self.flags.get(idx).copied().unwrap_or(false)
    }
}

/// Activity records with a set of binary indicator columns.
#[derive(Debug, Clone, Default)]
pub struct ActivityTable {
    indicators: Vec<ArcStr>,
    rows: Vec<ActivityRow>,
}

impl ActivityTable {
    /// An empty table with the given indicator columns.
    pub fn new(indicators: impl IntoIterator<Item = impl Into<ArcStr>>) -> Self {
        ActivityTable {
            indicators: indicators.into_iter().map(Into::into).collect(),
            rows: vec![],
        }
    }

    /// Add a row. There must be exactly one flag per indicator column.
    pub fn push(
        &mut self,
        patient_id: impl Into<PatientId>,
        date: Option<NaiveDateTime>,
        flags: &[bool],
    ) -> Result {
        ensure!(
            flags.len() == self.indicators.len(),
            "expected {} indicator flags, found {}",
            self.indicators.len(),
            flags.len()
        );
        self.rows.push(ActivityRow {
            patient_id: patient_id.into(),
            date,
            flags: flags.to_vec(),
        });
        Ok(())
    }

    /// Load activity from a CSV file with headers.
    ///
    /// Only the patient and date columns and the columns for `indicators` are read; other columns
    /// are ignored.
    pub fn load_csv(
        path: impl AsRef<Path>,
        columns: &Columns,
        indicators: &[ArcStr],
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path)
            .with_context(|| format!("the file \"{}\" could not be opened", path.display()))?;
        Self::from_reader(io::BufReader::new(file), columns, indicators)
            .with_context(|| format!("while loading \"{}\"", path.display()))
    }

    /// Like `load_csv`, but reading from anything implementing `io::Read`.
    pub fn from_reader(
        reader: impl io::Read,
        columns: &Columns,
        indicators: &[ArcStr],
    ) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let position = |name: &str| headers.iter().position(|header| header == name);

        let required = [&columns.patient, &columns.date]
            .into_iter()
            .chain(indicators.iter());
        let missing = required
            .clone()
            .filter(|name| position(name).is_none())
            .map(|name| format!("\"{}\"", name))
            .collect::<Vec<_>>();
        ensure!(
            missing.is_empty(),
            "the following required columns are missing: {}",
            missing.iter().join(", ")
        );
        let mut positions = required.filter_map(|name| position(name));
        let (patient_idx, date_idx) = match (positions.next(), positions.next()) {
            (Some(patient_idx), Some(date_idx)) => (patient_idx, date_idx),
            _ => bail!("patient and date columns must be present"),
        };
        let flag_idxs = positions.collect::<Vec<_>>();

        let mut table = ActivityTable::new(indicators.iter().cloned());
        for (row_idx, record) in reader.records().enumerate() {
            // 1 for the header row, 1 to count from 1.
            let line = row_idx + 2;
            let record = record?;
            let field = |idx: usize| record.get(idx).unwrap_or("");

            let patient_id = field(patient_idx);
            ensure!(
                !patient_id.is_empty(),
                "row {}: the `{}` column is empty",
                line,
                columns.patient
            );
            let date = parse_date_time(field(date_idx))
                .with_context(|| format!("row {}: invalid date in `{}`", line, columns.date))?;
            let flags = flag_idxs
                .iter()
                .zip(indicators)
                .map(|(idx, name)| {
                    parse_flag(field(*idx))
                        .with_context(|| format!("row {}: invalid flag in `{}`", line, name))
                })
                .collect::<Result<Vec<_>>>()?;
            table.rows.push(ActivityRow {
                patient_id: patient_id.into(),
                date,
                flags,
            });
        }
        Ok(table)
    }

    /// The names of the indicator columns.
    pub fn indicators(&self) -> &[ArcStr] {
        &self.indicators
    }

    /// The position of an indicator column. Column names are matched exactly.
    pub fn indicator_index(&self, indicator: &str) -> Option<usize> {
        self.indicators.iter().position(|name| &**name == indicator)
    }

    /// Rows flagged for an indicator, or `None` if there is no such column.
    pub fn flagged<'a>(
        &'a self,
        indicator: &str,
    ) -> Option<impl Iterator<Item = &'a ActivityRow> + 'a> {
        let idx = self.indicator_index(indicator)?;
        Some(self.rows.iter().filter(move |row| row.flag(idx)))
    }

    /// All distinct patients, whether or not they have any flagged activity.
    pub fn patient_ids(&self) -> BTreeSet<PatientId> {
        self.rows.iter().map(|row| row.patient_id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityRow> + '_ {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
