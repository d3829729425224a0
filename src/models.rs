//! Data models for the evidence synthesis pipeline.
//!
//! This module contains the typed input rows read from the extraction
//! tables, the work-level records produced by aggregation, and the corpus
//! statistics snapshot consumed by every renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Bucket label used for works with no value for a counted field.
pub const MISSING_BUCKET: &str = "(missing)";

/// Identifies one of the three tabular input streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputStream {
    /// Outcome-level evidence table.
    Evidence,
    /// Per-work risk-of-bias assessments.
    RiskOfBias,
    /// Full-text processing manifest (eligibility metadata).
    Manifest,
}

impl fmt::Display for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputStream::Evidence => write!(f, "evidence table"),
            InputStream::RiskOfBias => write!(f, "risk-of-bias table"),
            InputStream::Manifest => write!(f, "manifest"),
        }
    }
}

/// Outcome domain of a single extracted measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutcomeDomain {
    Vigilance,
    Sleepiness,
    Fatigue,
    Other,
}

impl OutcomeDomain {
    /// Parse a domain label. Blank labels have no domain.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "vigilance" => Some(OutcomeDomain::Vigilance),
            "sleepiness" => Some(OutcomeDomain::Sleepiness),
            "fatigue" => Some(OutcomeDomain::Fatigue),
            "" => None,
            _ => Some(OutcomeDomain::Other),
        }
    }
}

/// Direction of effect reported for one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectDirection {
    Improves,
    Worsens,
    Mixed,
    Null,
    Unclear,
}

impl EffectDirection {
    /// Parse a direction label; unrecognized labels return `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "improves" => Some(EffectDirection::Improves),
            "worsens" => Some(EffectDirection::Worsens),
            "mixed" => Some(EffectDirection::Mixed),
            "null" => Some(EffectDirection::Null),
            "unclear" => Some(EffectDirection::Unclear),
            _ => None,
        }
    }
}

/// Work-level summary of vigilance evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VigilanceSummary {
    Improves,
    Worsens,
    Mixed,
    Null,
    Unclear,
    NoVigilance,
}

impl VigilanceSummary {
    /// Axis order used by the durability map, bottom to top.
    pub const DURABILITY_AXIS: [VigilanceSummary; 5] = [
        VigilanceSummary::Worsens,
        VigilanceSummary::Null,
        VigilanceSummary::Unclear,
        VigilanceSummary::Mixed,
        VigilanceSummary::Improves,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VigilanceSummary::Improves => "improves",
            VigilanceSummary::Worsens => "worsens",
            VigilanceSummary::Mixed => "mixed",
            VigilanceSummary::Null => "null",
            VigilanceSummary::Unclear => "unclear",
            VigilanceSummary::NoVigilance => "no_vigilance",
        }
    }
}

impl fmt::Display for VigilanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Eligibility tier assigned in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EligibilityTier {
    /// `T1_core`: directly answers the research question.
    Core,
    /// `T2_context`: supporting or mechanistic evidence.
    Context,
}

impl EligibilityTier {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "T1_core" => Some(EligibilityTier::Core),
            "T2_context" => Some(EligibilityTier::Context),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EligibilityTier::Core => "T1_core",
            EligibilityTier::Context => "T2_context",
        }
    }
}

impl fmt::Display for EligibilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall risk-of-bias rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RobRating {
    Low,
    SomeConcerns,
    High,
    Unclear,
}

impl RobRating {
    pub const ALL: [RobRating; 4] = [
        RobRating::Low,
        RobRating::SomeConcerns,
        RobRating::High,
        RobRating::Unclear,
    ];

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "low" => Some(RobRating::Low),
            "some_concerns" => Some(RobRating::SomeConcerns),
            "high" => Some(RobRating::High),
            "unclear" => Some(RobRating::Unclear),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RobRating::Low => "low",
            RobRating::SomeConcerns => "some_concerns",
            RobRating::High => "high",
            RobRating::Unclear => "unclear",
        }
    }
}

/// One extracted study-outcome measurement.
///
/// Every column is optional; absent columns and cells read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeRow {
    pub short_id: String,
    pub citation: String,
    pub publication_year: String,
    pub study_design: String,
    pub population_description: String,
    pub low_arousal_proxy_definition: String,
    pub intervention_category: String,
    pub intervention_protocol: String,
    pub comparator: String,
    pub setting: String,
    pub n_total: String,
    pub exposure_duration_days: String,
    pub outcome_domain: String,
    pub outcome_measure: String,
    pub outcome_timepoint: String,
    pub effect_direction: String,
    pub effect_size_reported: String,
    pub habituation_or_tolerance_signal: String,
}

impl OutcomeRow {
    pub fn domain(&self) -> Option<OutcomeDomain> {
        OutcomeDomain::from_label(&self.outcome_domain)
    }

    pub fn is_vigilance(&self) -> bool {
        self.domain() == Some(OutcomeDomain::Vigilance)
    }

    /// Whether the row flags habituation or tolerance (case-insensitive "yes").
    pub fn signals_habituation(&self) -> bool {
        self.habituation_or_tolerance_signal
            .trim()
            .eq_ignore_ascii_case("yes")
    }
}

/// Eligibility metadata for one work from the processing manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestRow {
    pub short_id: String,
    pub eligibility_tier: String,
    pub publication_year: String,
    pub low_baseline_arousal_class: String,
    pub repeated_use_class: String,
    pub habituation_class: String,
    pub doi: String,
    pub notes: String,
    /// Structured abstract-only marker (yes/no). Overrides the text heuristic when set.
    pub abstract_only: String,
}

/// Risk-of-bias assessment for one work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskOfBiasRow {
    pub short_id: String,
    pub rob_overall: String,
    pub rob_tool: String,
}

/// The three record streams consumed by aggregation.
#[derive(Debug, Clone, Default)]
pub struct SynthesisInput {
    pub outcomes: Vec<OutcomeRow>,
    pub risk_of_bias: Vec<RiskOfBiasRow>,
    pub manifest: Vec<ManifestRow>,
}

/// Serde adapter writing booleans as `yes` / `no`.
pub mod yes_no {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(label(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.trim().eq_ignore_ascii_case("yes"))
    }

    pub fn label(value: bool) -> &'static str {
        if value {
            "yes"
        } else {
            "no"
        }
    }
}

/// Serde adapter writing durations with [`format_days`] (`28`, not `28.0`).
pub mod days {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(days) => serializer.serialize_str(&super::format_days(*days)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(D::Error::custom)
    }
}

/// Canonical work-level record: one per distinct study identifier.
///
/// Field order is the column order of the work-level evidence map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRecord {
    pub short_id: String,
    pub eligibility_tier: String,
    pub publication_year: String,
    pub citation: String,
    pub doi: String,
    pub primary_intervention_category: String,
    pub intervention_categories: String,
    pub primary_setting: String,
    pub settings: String,
    pub n_total: String,
    #[serde(with = "days")]
    pub exposure_days_min: Option<f64>,
    #[serde(with = "days")]
    pub exposure_days_max: Option<f64>,
    pub outcome_domains: String,
    #[serde(with = "yes_no")]
    pub has_vigilance_outcome: bool,
    pub vigilance_effect_summary: VigilanceSummary,
    #[serde(with = "yes_no")]
    pub habituation_signal_any: bool,
    pub low_baseline_arousal_class: String,
    pub repeated_use_class: String,
    pub habituation_class: String,
    pub rob_overall: String,
    pub rob_tool: String,
    /// Heuristic: see `analysis::aggregator::detect_abstract_only`.
    #[serde(with = "yes_no")]
    pub abstract_only_flag: bool,
    pub notes: String,
}

impl WorkRecord {
    pub fn tier(&self) -> Option<EligibilityTier> {
        EligibilityTier::from_label(&self.eligibility_tier)
    }

    pub fn is_core(&self) -> bool {
        self.tier() == Some(EligibilityTier::Core)
    }

    pub fn is_context(&self) -> bool {
        self.tier() == Some(EligibilityTier::Context)
    }

    /// Tier label, or the missing bucket when unset.
    pub fn tier_label(&self) -> &str {
        or_missing(&self.eligibility_tier)
    }

    /// Primary intervention category, or the missing bucket when unset.
    pub fn category_label(&self) -> &str {
        or_missing(&self.primary_intervention_category)
    }

    /// Publication year as an integer; unparseable years sort as 0.
    pub fn year_value(&self) -> i64 {
        self.publication_year.trim().parse().unwrap_or(0)
    }

    /// Maximum exposure duration formatted for prose ("" when unknown).
    pub fn duration_max_label(&self) -> String {
        self.exposure_days_max.map(format_days).unwrap_or_default()
    }
}

/// Format a duration in days, dropping a zero fractional part.
pub fn format_days(days: f64) -> String {
    if days.fract() == 0.0 {
        format!("{}", days as i64)
    } else {
        format!("{}", days)
    }
}

/// Return `value`, or the missing bucket label when it is blank.
pub fn or_missing(value: &str) -> &str {
    if value.trim().is_empty() {
        MISSING_BUCKET
    } else {
        value
    }
}

/// Vigilance-domain outcome row enriched with work-level fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VigilanceOutcomeRow {
    pub short_id: String,
    pub eligibility_tier: String,
    pub citation: String,
    pub publication_year: String,
    pub primary_intervention_category: String,
    pub exposure_duration_days: String,
    pub outcome_measure: String,
    pub outcome_timepoint: String,
    pub effect_direction: String,
    pub effect_size_reported: String,
    pub habituation_or_tolerance_signal: String,
    pub rob_overall: String,
    #[serde(with = "yes_no")]
    pub abstract_only_flag: bool,
}

/// Point-in-time counts over the work-level records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStatistics {
    pub generated_utc: DateTime<Utc>,
    pub locked_question: String,
    pub n_unique_works: usize,
    pub n_outcome_rows: usize,
    pub works_by_tier: BTreeMap<String, usize>,
    pub works_by_primary_intervention_category: BTreeMap<String, usize>,
    pub works_with_vigilance_outcomes: usize,
    pub vigilance_effect_summary_counts: BTreeMap<String, usize>,
    pub habituation_signal_any_counts: BTreeMap<String, usize>,
    pub risk_of_bias_overall_counts: BTreeMap<String, usize>,
}

impl CorpusStatistics {
    /// Primary intervention categories by descending work count, ties by name.
    pub fn categories_by_count(&self) -> Vec<(&str, usize)> {
        ranked(&self.works_by_primary_intervention_category)
    }

    /// Inline `{key: n, ...}` rendering of a count map for prose.
    pub fn inline_counts(counts: &BTreeMap<String, usize>) -> String {
        let parts: Vec<String> = counts.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        format!("{{{}}}", parts.join(", "))
    }
}

/// Sort a count map by descending count, then ascending key.
pub fn ranked(counts: &BTreeMap<String, usize>) -> Vec<(&str, usize)> {
    let mut entries: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries
}
