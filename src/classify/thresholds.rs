//! Editable threshold ruleset for the Köppen decision tree.
//!
//! The wire form is `category -> parameter -> {value, unit, range}` so an
//! authoring layer can render and edit it generically. Before classifying,
//! the named thresholds are resolved once into a fixed array indexed by
//! [`ThresholdKey`]; anything missing or invalid falls back to its default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

/// One editable numeric threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdParam {
    /// `None` while the user is mid-edit
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
}

impl ThresholdParam {
    pub fn new(value: f64, unit: &str, range: [f64; 2]) -> Self {
        Self {
            value: Some(value),
            unit: unit.to_string(),
            range: Some(range),
        }
    }
}

/// Category -> parameter -> threshold. Replaced wholesale on every edit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdRuleset {
    pub categories: BTreeMap<String, BTreeMap<String, ThresholdParam>>,
}

impl ThresholdRuleset {
    /// The standard Köppen–Geiger thresholds
    pub fn koppen_default() -> Self {
        let mut ruleset = Self::default();
        for key in ThresholdKey::ALL {
            let spec = key.spec();
            ruleset
                .categories
                .entry(spec.category.to_string())
                .or_default()
                .insert(
                    spec.parameter.to_string(),
                    ThresholdParam::new(spec.default, spec.unit, spec.range),
                );
        }
        ruleset
    }

    pub fn get(&self, category: &str, parameter: &str) -> Option<&ThresholdParam> {
        self.categories.get(category)?.get(parameter)
    }

    /// Sets a value, creating the entry from the known defaults if needed
    pub fn set(&mut self, category: &str, parameter: &str, value: f64) {
        let entry = self
            .categories
            .entry(category.to_string())
            .or_default()
            .entry(parameter.to_string())
            .or_insert_with(|| match ThresholdKey::lookup(category, parameter) {
                Some(key) => {
                    let spec = key.spec();
                    ThresholdParam::new(spec.default, spec.unit, spec.range)
                }
                None => ThresholdParam {
                    value: None,
                    unit: String::new(),
                    range: None,
                },
            });
        entry.value = Some(value);
    }

    /// Builder form of [`ThresholdRuleset::set`]
    pub fn with(mut self, category: &str, parameter: &str, value: f64) -> Self {
        self.set(category, parameter, value);
        self
    }

    /// Lists everything that would be replaced by a default when classifying
    pub fn validate(&self) -> Vec<RulesetIssue> {
        KoppenThresholds::resolve(self).1
    }
}

/// A problem found in a ruleset; never fatal for classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesetIssue {
    pub location: String,
    pub message: String,
}

impl RulesetIssue {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RulesetIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Documented default and bounds of a named threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSpec {
    pub category: &'static str,
    pub parameter: &'static str,
    pub default: f64,
    pub unit: &'static str,
    pub range: [f64; 2],
}

/// The fixed, ordered set of thresholds the decision tree reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdKey {
    TropicalMinTemp,
    RainforestMinPrecip,
    MonsoonBase,
    MonsoonDivisor,
    AridityTempFactor,
    AriditySummerOffset,
    AridityMixedOffset,
    SeasonalShare,
    DesertRatio,
    HotAridMeanTemp,
    TemperateMinTemp,
    HotSummerTemp,
    WarmMonthTemp,
    WarmMonthCount,
    DrySummerMaxPrecip,
    DrySummerRatio,
    DryWinterRatio,
    SevereWinterTemp,
    PolarMaxTemp,
    IceCapMaxTemp,
}

pub const THRESHOLD_COUNT: usize = 20;

impl ThresholdKey {
    pub const ALL: [ThresholdKey; THRESHOLD_COUNT] = [
        ThresholdKey::TropicalMinTemp,
        ThresholdKey::RainforestMinPrecip,
        ThresholdKey::MonsoonBase,
        ThresholdKey::MonsoonDivisor,
        ThresholdKey::AridityTempFactor,
        ThresholdKey::AriditySummerOffset,
        ThresholdKey::AridityMixedOffset,
        ThresholdKey::SeasonalShare,
        ThresholdKey::DesertRatio,
        ThresholdKey::HotAridMeanTemp,
        ThresholdKey::TemperateMinTemp,
        ThresholdKey::HotSummerTemp,
        ThresholdKey::WarmMonthTemp,
        ThresholdKey::WarmMonthCount,
        ThresholdKey::DrySummerMaxPrecip,
        ThresholdKey::DrySummerRatio,
        ThresholdKey::DryWinterRatio,
        ThresholdKey::SevereWinterTemp,
        ThresholdKey::PolarMaxTemp,
        ThresholdKey::IceCapMaxTemp,
    ];

    pub fn spec(self) -> ThresholdSpec {
        use ThresholdKey::*;
        let (category, parameter, default, unit, range) = match self {
            TropicalMinTemp => ("tropical", "min_temperature", 18.0, "°C", [-10.0, 30.0]),
            RainforestMinPrecip => ("tropical", "dry_month_precipitation", 60.0, "mm", [0.0, 300.0]),
            MonsoonBase => ("tropical", "monsoon_base", 100.0, "mm", [0.0, 300.0]),
            MonsoonDivisor => ("tropical", "monsoon_divisor", 25.0, "ratio", [1.0, 100.0]),
            AridityTempFactor => ("arid", "temperature_factor", 20.0, "mm/°C", [0.0, 50.0]),
            AriditySummerOffset => ("arid", "summer_offset", 280.0, "mm", [0.0, 1000.0]),
            AridityMixedOffset => ("arid", "mixed_offset", 140.0, "mm", [0.0, 1000.0]),
            SeasonalShare => ("arid", "seasonal_share", 0.7, "fraction", [0.5, 1.0]),
            DesertRatio => ("arid", "desert_ratio", 0.5, "fraction", [0.0, 1.0]),
            HotAridMeanTemp => ("arid", "hot_mean_temperature", 18.0, "°C", [-10.0, 40.0]),
            TemperateMinTemp => ("temperate", "min_temperature", 0.0, "°C", [-10.0, 18.0]),
            HotSummerTemp => ("temperate", "hot_summer_temperature", 22.0, "°C", [10.0, 40.0]),
            WarmMonthTemp => ("temperate", "warm_month_temperature", 10.0, "°C", [0.0, 30.0]),
            WarmMonthCount => ("temperate", "warm_month_count", 4.0, "months", [1.0, 12.0]),
            DrySummerMaxPrecip => ("temperate", "dry_summer_precipitation", 40.0, "mm", [0.0, 200.0]),
            DrySummerRatio => ("temperate", "dry_summer_ratio", 3.0, "ratio", [1.0, 20.0]),
            DryWinterRatio => ("temperate", "dry_winter_ratio", 10.0, "ratio", [1.0, 50.0]),
            SevereWinterTemp => ("continental", "severe_winter_temperature", -38.0, "°C", [-60.0, 0.0]),
            PolarMaxTemp => ("polar", "max_temperature", 10.0, "°C", [0.0, 20.0]),
            IceCapMaxTemp => ("polar", "ice_cap_temperature", 0.0, "°C", [-20.0, 10.0]),
        };
        ThresholdSpec {
            category,
            parameter,
            default,
            unit,
            range,
        }
    }

    pub fn lookup(category: &str, parameter: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| {
            let spec = key.spec();
            spec.category == category && spec.parameter == parameter
        })
    }
}

/// Thresholds resolved for one classification pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KoppenThresholds([f64; THRESHOLD_COUNT]);

impl KoppenThresholds {
    pub fn defaults() -> Self {
        let mut values = [0.0; THRESHOLD_COUNT];
        for key in ThresholdKey::ALL {
            values[key as usize] = key.spec().default;
        }
        Self(values)
    }

    /// Reads every named threshold, substituting the default for anything
    /// missing, non-finite or outside its valid range.
    pub fn resolve(ruleset: &ThresholdRuleset) -> (Self, Vec<RulesetIssue>) {
        let mut values = Self::defaults();
        let mut issues = Vec::new();

        for key in ThresholdKey::ALL {
            let spec = key.spec();
            let location = format!("{}.{}", spec.category, spec.parameter);

            let Some(param) = ruleset.get(spec.category, spec.parameter) else {
                issues.push(RulesetIssue::new(location, format!("missing, using {}", spec.default)));
                continue;
            };
            let Some(value) = param.value.filter(|v| v.is_finite()) else {
                issues.push(RulesetIssue::new(location, format!("no usable value, using {}", spec.default)));
                continue;
            };

            let [low, high] = narrowed_range(param.range, spec.range);
            if value < low || value > high {
                issues.push(RulesetIssue::new(
                    location,
                    format!("{} outside [{}, {}], using {}", value, low, high, spec.default),
                ));
                continue;
            }

            values.0[key as usize] = value;
        }

        (values, issues)
    }
}

/// A declared range can narrow the built-in one but never widen it; an
/// empty or inverted result falls back to the built-in range.
fn narrowed_range(declared: Option<[f64; 2]>, builtin: [f64; 2]) -> [f64; 2] {
    let Some([low, high]) = declared else {
        return builtin;
    };
    let low = low.max(builtin[0]);
    let high = high.min(builtin[1]);
    if low <= high {
        [low, high]
    } else {
        builtin
    }
}

impl Default for KoppenThresholds {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Index<ThresholdKey> for KoppenThresholds {
    type Output = f64;

    fn index(&self, key: ThresholdKey) -> &f64 {
        &self.0[key as usize]
    }
}
