use clap::Parser;
use concordance_ratio::{
    calc_concordance_with_ratio, header, ActivityTable, ArcStr, Columns, ConcordanceRequest,
    ConcordanceScores, EvaluationWindow, ScoreBands, ValidityPeriods,
    DEFAULT_VALIDITY_PERIODS_FILE,
};
use qu::ick_use::*;
use std::path::PathBuf;
use term_data_table::{Cell, Row, Table};

#[derive(Parser)]
struct Opt {
    /// A CSV file with one row per activity
    input: PathBuf,
    /// The indicator columns to score. Can be given more than once
    #[clap(short, long, required = true)]
    indicator: Vec<String>,
    /// The first day of the evaluation period, as `YYYY-MM-DD`
    #[clap(short, long)]
    start: String,
    /// The length of the evaluation period in days
    #[clap(short, long)]
    length: u32,
    /// The column holding the patient identifier
    #[clap(long, default_value = "patient_id")]
    patient_column: String,
    /// The column holding the activity date
    #[clap(long, default_value = "date")]
    date_column: String,
    /// Validity periods, as a YAML, TOML or JSON mapping from indicator to days
    #[clap(long, default_value = DEFAULT_VALIDITY_PERIODS_FILE)]
    validity_periods: PathBuf,
    /// Save the scores as CSV to the given path
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// Don't print the scores of every patient, only the summaries
    #[clap(long)]
    summary_only: bool,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let validity_periods = ValidityPeriods::load(&opt.validity_periods)?;
    let window = EvaluationWindow::parse(&opt.start, opt.length)?;
    let indicators = opt
        .indicator
        .iter()
        .map(|name| ArcStr::from(name.as_str()))
        .collect::<Vec<_>>();
    let columns = Columns::new(opt.patient_column.as_str(), opt.date_column.as_str());

    let table = ActivityTable::load_csv(&opt.input, &columns, &indicators)?;
    event!(
        Level::INFO,
        "loaded {} activities for {} patients",
        table.len(),
        table.patient_ids().len()
    );

    let request = ConcordanceRequest::new(window, indicators);
    let scores = calc_concordance_with_ratio(&table, &request, &validity_periods)?;

    if !opt.summary_only {
        header("Concordance");
        println!("{}", scores.term_table(&opt.patient_column));
    }
    summary(&scores, &request);

    if let Some(path) = &opt.output {
        scores.save_csv(path, &opt.patient_column)?;
        event!(Level::INFO, "scores saved to \"{}\"", path.display());
    }
    Ok(())
}

fn summary(scores: &ConcordanceScores, request: &ConcordanceRequest) {
    let bands = ScoreBands::default();

    header("Evaluation period");
    println!("{}", request.window);
    println!("patients: {}", scores.len());

    for indicator in scores.indicators() {
        if let Some(counts) = scores.bands(indicator, &bands) {
            header(&format!("Concordance for {}", indicator));
            println!("{}", bands_table(counts.for_display()));
        }
        match scores.missing_dates(indicator) {
            Some(count) if count > 0 => {
                println!("activities without a date (not scored): {}", count)
            }
            _ => (),
        }
    }
    if let Some(counts) = scores.total_bands(&bands) {
        header("Total concordance");
        println!("{}", bands_table(counts.for_display()));
    }
}

fn bands_table(rows: impl Iterator<Item = (String, usize)>) -> Table<'static> {
    let mut table = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from("Score"))
            .with_cell(Cell::from("Patients")),
    );
    for (label, count) in rows {
        table.add_row(
            Row::new()
                .with_cell(Cell::from(label))
                .with_cell(Cell::from(count.to_string())),
        );
    }
    table
}
