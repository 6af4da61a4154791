//! Engine configuration.
//!
//! All knobs are plain serde types with defaults matching the shipped
//! behavior, loadable from TOML:
//!
//! ```toml
//! magnitude_types = ["MLv", "Ms"]
//! minimum_arrival_weight = 0.5
//! cache_expiry_secs = 3600
//!
//! [average_methods]
//! MLv = "trimmed mean(25)"
//! Ms = "median"
//!
//! [summary]
//! enabled = true
//! magnitude_type = "M"
//! min_station_count = 1
//!
//! [summary.coefficients."Mw(mB)"]
//! a = 0.4
//! b = -1.0
//! ```

use anyhow::Context;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How station magnitudes of one type are combined into the network value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AverageMethod {
    /// Trimmed mean at 25% for more than three stations, plain mean below.
    Default,
    Mean,
    TrimmedMean(f64),
    Median,
    TrimmedMedian(f64),
}

impl fmt::Display for AverageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AverageMethod::Default => write!(f, "default"),
            AverageMethod::Mean => write!(f, "mean"),
            AverageMethod::TrimmedMean(p) => write!(f, "trimmed mean({p})"),
            AverageMethod::Median => write!(f, "median"),
            AverageMethod::TrimmedMedian(p) => write!(f, "trimmed median({p})"),
        }
    }
}

impl FromStr for AverageMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "default" => return Ok(AverageMethod::Default),
            "mean" => return Ok(AverageMethod::Mean),
            "median" => return Ok(AverageMethod::Median),
            _ => {}
        }

        let parse_parameter = |prefix: &str| -> Option<Result<f64, String>> {
            s.strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('('))
                .and_then(|rest| rest.strip_suffix(')'))
                .map(|p| {
                    p.trim()
                        .parse::<f64>()
                        .map_err(|_| format!("invalid trim percentage in '{s}'"))
                })
        };

        for prefix in ["trimmed mean", "trimmedMean"] {
            if let Some(p) = parse_parameter(prefix) {
                return p.map(AverageMethod::TrimmedMean);
            }
        }
        for prefix in ["trimmed median", "trimmedMedian"] {
            if let Some(p) = parse_parameter(prefix) {
                return p.map(AverageMethod::TrimmedMedian);
            }
        }

        Err(format!("unknown average method '{s}'"))
    }
}

impl TryFrom<String> for AverageMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AverageMethod> for String {
    fn from(value: AverageMethod) -> Self {
        value.to_string()
    }
}

/// Linear weight coefficients `w = a·n + b`. Unset fields fall back to the
/// effective defaults when the weight for a type is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub a: Option<f64>,
    pub b: Option<f64>,
}

impl Coefficients {
    pub fn new(a: impl Into<Option<f64>>, b: impl Into<Option<f64>>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }
}

/// How the summary magnitude's station count is derived from its
/// contributors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationCountPolicy {
    /// The largest station count among contributing network magnitudes.
    #[default]
    #[serde(rename = "largest-contributor")]
    LargestContributor,

    /// The sum of contributing station counts.
    #[serde(rename = "contributing-total")]
    ContributingTotal,
}

/// Summary magnitude configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub enabled: bool,
    pub magnitude_type: String,
    pub min_station_count: usize,
    pub whitelist: BTreeSet<String>,
    pub blacklist: BTreeSet<String>,
    /// Overlays the built-in defaults `a = 0, b = 1` field by field.
    pub default_coefficients: Coefficients,
    /// Per-type overrides. Configuring this replaces the preset table.
    pub coefficients: BTreeMap<String, Coefficients>,
    pub station_count_policy: StationCountPolicy,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        let mut coefficients = BTreeMap::new();
        coefficients.insert("MLv".to_string(), Coefficients::new(None, 2.0));
        coefficients.insert("Mw(mB)".to_string(), Coefficients::new(0.4, -1.0));
        coefficients.insert("Mw(Mwp)".to_string(), Coefficients::new(0.4, -1.0));

        Self {
            enabled: true,
            magnitude_type: "M".to_string(),
            min_station_count: 1,
            whitelist: BTreeSet::new(),
            blacklist: BTreeSet::new(),
            default_coefficients: Coefficients::default(),
            coefficients,
            station_count_policy: StationCountPolicy::default(),
        }
    }
}

impl SummaryConfig {
    /// Whitelist/blacklist gate: an empty whitelist accepts every type.
    pub fn accepts_type(&self, magnitude_type: &str) -> bool {
        (self.whitelist.is_empty() || self.whitelist.contains(magnitude_type))
            && !self.blacklist.contains(magnitude_type)
    }

    /// The default coefficients with the configured overlay applied.
    pub fn effective_defaults(&self) -> (f64, f64) {
        (
            self.default_coefficients.a.unwrap_or(0.0),
            self.default_coefficients.b.unwrap_or(1.0),
        )
    }

    /// Resolve `(a, b)` for one magnitude type: per-type override fields
    /// that are set win over the effective defaults.
    pub fn coefficients_for(&self, magnitude_type: &str) -> (f64, f64) {
        let (mut a, mut b) = self.effective_defaults();
        if let Some(c) = self.coefficients.get(magnitude_type) {
            if let Some(ca) = c.a {
                a = ca;
            }
            if let Some(cb) = c.b {
                b = cb;
            }
        }
        (a, b)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Agency id stamped on created magnitudes.
    pub agency_id: String,
    /// Author stamped on created magnitudes.
    pub author: String,
    /// Module name used for per-station setup lookups.
    pub module_name: String,
    /// Objects from these agencies are rejected at ingress.
    pub blocked_agencies: BTreeSet<String>,
    /// Enabled magnitude types; unknown tags are dropped with a warning.
    pub magnitude_types: Vec<String>,
    /// Per-type averaging method; unlisted types use `Default`.
    pub average_methods: BTreeMap<String, AverageMethod>,
    pub minimum_arrival_weight: f64,
    /// Lifetime of cached objects, in seconds.
    pub cache_expiry_secs: i64,
    /// Generate random public ids instead of the deterministic
    /// `<origin>#netMag.<type>` scheme.
    pub custom_public_ids: bool,
    pub summary: SummaryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agency_id: "seismag".to_string(),
            author: "seismag".to_string(),
            module_name: "seismag".to_string(),
            blocked_agencies: BTreeSet::new(),
            magnitude_types: vec!["MLv".to_string(), "Ms".to_string()],
            average_methods: BTreeMap::new(),
            minimum_arrival_weight: 0.5,
            cache_expiry_secs: 3600,
            custom_public_ids: false,
            summary: SummaryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn cache_expiry(&self) -> Duration {
        Duration::seconds(self.cache_expiry_secs.max(0))
    }

    pub fn average_method_for(&self, magnitude_type: &str) -> AverageMethod {
        self.average_methods
            .get(magnitude_type)
            .copied()
            .unwrap_or(AverageMethod::Default)
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("parsing engine configuration")
    }

    pub fn from_toml_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_method_parsing() {
        assert_eq!("mean".parse::<AverageMethod>().unwrap(), AverageMethod::Mean);
        assert_eq!(
            "trimmed mean(25)".parse::<AverageMethod>().unwrap(),
            AverageMethod::TrimmedMean(25.0)
        );
        assert_eq!(
            "trimmedMedian(12.5)".parse::<AverageMethod>().unwrap(),
            AverageMethod::TrimmedMedian(12.5)
        );
        assert!("trimmed mean(x)".parse::<AverageMethod>().is_err());
        assert!("geometric mean".parse::<AverageMethod>().is_err());
    }

    #[test]
    fn test_average_method_display_roundtrip() {
        for method in [
            AverageMethod::Default,
            AverageMethod::Mean,
            AverageMethod::TrimmedMean(25.0),
            AverageMethod::Median,
            AverageMethod::TrimmedMedian(12.5),
        ] {
            let parsed: AverageMethod = method.to_string().parse().unwrap();
            assert_eq!(parsed, method);
        }
        assert_eq!(AverageMethod::TrimmedMean(25.0).to_string(), "trimmed mean(25)");
    }

    #[test]
    fn test_summary_coefficient_overlay() {
        let summary = SummaryConfig::default();
        assert_eq!(summary.effective_defaults(), (0.0, 1.0));
        // Preset: MLv overrides b only.
        assert_eq!(summary.coefficients_for("MLv"), (0.0, 2.0));
        assert_eq!(summary.coefficients_for("Mw(mB)"), (0.4, -1.0));
        assert_eq!(summary.coefficients_for("mB"), (0.0, 1.0));

        let mut summary = summary;
        summary.default_coefficients = Coefficients::new(0.1, None);
        assert_eq!(summary.effective_defaults(), (0.1, 1.0));
        assert_eq!(summary.coefficients_for("MLv"), (0.1, 2.0));
    }

    #[test]
    fn test_summary_type_gating() {
        let mut summary = SummaryConfig::default();
        assert!(summary.accepts_type("MLv"));

        summary.blacklist.insert("mB".to_string());
        assert!(!summary.accepts_type("mB"));

        summary.whitelist.insert("MLv".to_string());
        assert!(summary.accepts_type("MLv"));
        assert!(!summary.accepts_type("Ms"));
    }

    #[test]
    fn test_toml_loading() {
        let config = EngineConfig::from_toml_str(
            r#"
            agency_id = "GFZ"
            magnitude_types = ["MLv"]
            cache_expiry_secs = 600

            [average_methods]
            MLv = "median"

            [summary]
            enabled = false
            magnitude_type = "M"

            [summary.coefficients."Mw(mB)"]
            a = 0.4
            b = -1.0
            "#,
        )
        .unwrap();

        assert_eq!(config.agency_id, "GFZ");
        assert_eq!(config.average_method_for("MLv"), AverageMethod::Median);
        assert_eq!(config.average_method_for("Ms"), AverageMethod::Default);
        assert_eq!(config.cache_expiry(), Duration::seconds(600));
        assert!(!config.summary.enabled);
        // An explicit coefficients table replaces the presets.
        assert_eq!(config.summary.coefficients_for("MLv"), (0.0, 1.0));
        assert_eq!(config.summary.coefficients_for("Mw(mB)"), (0.4, -1.0));
    }
}
