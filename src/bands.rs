//! Bucketing scores into bands, for summaries.
use noisy_float::prelude::*;
use std::fmt;

/// A band of scores. The lower bound is inclusive, the upper bound exclusive; either may be
/// unbounded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Band {
    from: Option<R64>,
    to: Option<R64>,
}

impl Band {
    /// # Panics
    ///
    /// Panics if both bounds are given and `from >= to`, or if a bound is NaN.
    pub fn new(from: Option<f64>, to: Option<f64>) -> Self {
        let from = from.map(r64);
        let to = to.map(r64);
        if let (Some(from), Some(to)) = (from, to) {
            if from >= to {
                panic!("bands must go from low to high")
            }
        }
        Band { from, to }
    }

    pub fn contains(&self, score: R64) -> bool {
        self.from.map_or(true, |from| score >= from) && self.to.map_or(true, |to| score < to)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.from, self.to) {
            (Some(from), Some(to)) => write!(f, "{:.2} - {:.2}", from.raw(), to.raw()),
            (Some(from), None) => write!(f, "{:.2}+", from.raw()),
            (None, Some(to)) => write!(f, "below {:.2}", to.raw()),
            (None, None) => f.write_str("any"),
        }
    }
}

/// An ordered list of bands.
#[derive(Debug, Clone)]
pub struct ScoreBands {
    bands: Vec<Band>,
}

impl Default for ScoreBands {
    /// Below 0, quarters between 0 and 1, and exactly 1 (scores can't go higher).
    fn default() -> Self {
        ScoreBands::new(vec![
            Band::new(None, Some(0.)),
            Band::new(Some(0.), Some(0.25)),
            Band::new(Some(0.25), Some(0.5)),
            Band::new(Some(0.5), Some(0.75)),
            Band::new(Some(0.75), Some(1.)),
            Band::new(Some(1.), None),
        ])
    }
}

impl ScoreBands {
    pub fn new(bands: Vec<Band>) -> Self {
        ScoreBands { bands }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Band> + '_ {
        self.bands.iter()
    }

    /// Count scores per band. `None` and NaN scores are counted as missing.
    pub fn bucket(&self, scores: impl IntoIterator<Item = Option<f64>>) -> BandCounts<'_> {
        let mut counts = vec![0usize; self.bands.len()];
        let mut missing = 0;
        for score in scores {
            match score.and_then(R64::try_new) {
                Some(score) => {
                    for (idx, band) in self.bands.iter().enumerate() {
                        if band.contains(score) {
                            counts[idx] += 1;
                        }
                    }
                }
                None => missing += 1,
            }
        }
        BandCounts {
            bands: self,
            counts,
            missing,
        }
    }
}

/// Scores bucketed into bands, with the number of missing scores.
pub struct BandCounts<'a> {
    bands: &'a ScoreBands,
    counts: Vec<usize>,
    missing: usize,
}

impl<'a> BandCounts<'a> {
    pub fn iter(&self) -> impl Iterator<Item = (&Band, usize)> + '_ {
        self.bands.iter().zip(self.counts.iter().copied())
    }

    pub fn missing(&self) -> usize {
        self.missing
    }

    /// All scores seen, including missing ones.
    pub fn total(&self) -> usize {
        self.counts.iter().sum::<usize>() + self.missing
    }

    /// Rows of `(label, count)`, with missing scores last.
    pub fn for_display(&self) -> impl Iterator<Item = (String, usize)> + '_ {
        self.iter()
            .map(|(band, count)| (band.to_string(), count))
            .chain(std::iter::once(("missing".to_string(), self.missing)))
    }
}
