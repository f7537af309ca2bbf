//! How long a single qualifying activity stays valid, per indicator.
//!
//! Indicator names are matched case-insensitively. Names are normalised once, when the mapping is
//! built, so lookups during the computation are plain map accesses.
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

use crate::util;

/// The file validity periods are loaded from when no mapping is supplied.
pub const DEFAULT_VALIDITY_PERIODS_FILE: &str = "validity_periods.yml";

/// An immutable mapping from (lower case) indicator name to validity duration in days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct ValidityPeriods {
    periods: BTreeMap<String, f64>,
}

impl ValidityPeriods {
    /// Build the mapping from `(indicator, days)` pairs.
    ///
    /// Fails if a duration is negative or not finite, or if two indicators only differ by case.
    pub fn new<K: AsRef<str>>(periods: impl IntoIterator<Item = (K, f64)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (indicator, days) in periods {
            let indicator = indicator.as_ref();
            ensure!(
                days.is_finite() && days >= 0.,
                "the validity period for \"{}\" must be a non-negative number of days, found {}",
                indicator,
                days
            );
            let key = indicator.to_lowercase();
            if map.insert(key, days).is_some() {
                bail!(
                    "the indicator \"{}\" has more than one validity period (names are not case sensitive)",
                    indicator
                );
            }
        }
        Ok(ValidityPeriods { periods: map })
    }

    /// Load validity periods from a file, with the format picked by the extension.
    ///
    /// Supported are YAML (`.yml`, `.yaml`), TOML (`.toml`) and JSON (`.json`). In each case the
    /// document is a flat mapping from indicator name to days.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        fn inner(path: &Path) -> Result<ValidityPeriods> {
            ensure!(
                util::path_exists(path)?,
                "the file \"{}\" could not be found",
                path.display()
            );
            let text = fs::read_to_string(path)?;
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("yml" | "yaml") => ValidityPeriods::from_yaml(&text),
                Some("toml") => ValidityPeriods::from_toml(&text),
                Some("json") => ValidityPeriods::from_json(&text),
                _ => bail!("unrecognised extension, expected one of `.yml`, `.yaml`, `.toml`, `.json`"),
            }
        }

        let path = path.as_ref();
        inner(path)
            .with_context(|| format!("loading validity periods from \"{}\"", path.display()))
    }

    /// Load from `DEFAULT_VALIDITY_PERIODS_FILE` in the working directory.
    pub fn load_default() -> Result<Self> {
        Self::load(DEFAULT_VALIDITY_PERIODS_FILE)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing YAML")
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing TOML")
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing JSON")
    }

    /// The validity duration for an indicator, in days.
    pub fn get(&self, indicator: &str) -> Option<f64> {
        self.periods.get(&indicator.to_lowercase()).copied()
    }

    pub fn contains(&self, indicator: &str) -> bool {
        self.get(indicator).is_some()
    }

    /// The indicators from `indicators` that don't have a validity period.
    pub fn missing<'a>(&self, indicators: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        indicators
            .into_iter()
            .filter(|indicator| !self.contains(indicator))
            .collect()
    }

    /// Iterate over `(indicator, days)` pairs. Indicator names are lower case.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.periods.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

impl TryFrom<BTreeMap<String, f64>> for ValidityPeriods {
    type Error = Error;
    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        Self::new(map)
    }
}

impl From<ValidityPeriods> for BTreeMap<String, f64> {
    fn from(periods: ValidityPeriods) -> Self {
        periods.periods
    }
}

#[cfg(test)]
mod test {
    use super::ValidityPeriods;
    use std::{env, fs};

    #[test]
    fn case_insensitive() {
        let periods = ValidityPeriods::new([("eGFR", 365.), ("HbA1c", 182.5)]).unwrap();
        assert_eq!(periods.get("EGFR"), Some(365.));
        assert_eq!(periods.get("hba1c"), Some(182.5));
        assert_eq!(periods.get("ldl"), None);
        assert_eq!(periods.missing(["egfr", "LDL", "bp"]), vec!["LDL", "bp"]);
    }

    #[test]
    fn invalid_periods() {
        assert!(ValidityPeriods::new([("egfr", -1.)]).is_err());
        assert!(ValidityPeriods::new([("egfr", f64::NAN)]).is_err());
        let err = ValidityPeriods::new([("egfr", 365.), ("EGFR", 180.)]).unwrap_err();
        assert!(err.to_string().contains("EGFR"));
    }

    #[test]
    fn formats() {
        let yaml = ValidityPeriods::from_yaml("eGFR: 365\nHbA1c: 182.5\n").unwrap();
        let toml = ValidityPeriods::from_toml("eGFR = 365\nHbA1c = 182.5\n").unwrap();
        let json = ValidityPeriods::from_json(r#"{"eGFR": 365, "HbA1c": 182.5}"#).unwrap();
        assert_eq!(yaml, toml);
        assert_eq!(yaml, json);
        assert_eq!(yaml.len(), 2);
        assert!(ValidityPeriods::from_yaml("- 1\n- 2\n").is_err());
        assert!(ValidityPeriods::from_yaml("egfr: soon\n").is_err());
        assert!(ValidityPeriods::from_yaml("egfr: -3\n").is_err());
    }

    #[test]
    fn load_file() {
        let dir = env::temp_dir().join(format!("concordance-validity-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("periods.yaml");
        fs::write(&path, "egfr: 365\n").unwrap();
        let periods = ValidityPeriods::load(&path).unwrap();
        assert_eq!(periods.get("eGFR"), Some(365.));

        let missing = dir.join("missing.yml");
        let err = ValidityPeriods::load(&missing).unwrap_err();
        assert!(format!("{:#}", err).contains("could not be found"));

        let wrong = dir.join("periods.txt");
        fs::write(&wrong, "egfr: 365\n").unwrap();
        assert!(ValidityPeriods::load(&wrong).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
