//! Köppen–Geiger decision tree over derived climate parameters

use super::thresholds::{KoppenThresholds, ThresholdKey};
use super::CategoryInfo;
use crate::data::cell::{ClimateSummary, RawCell};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The closed set of codes the threshold tree can produce
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KoppenCode {
    Af,
    Am,
    As,
    Aw,
    BWh,
    BWk,
    BSh,
    BSk,
    Csa,
    Csb,
    Csc,
    Cwa,
    Cwb,
    Cwc,
    Cfa,
    Cfb,
    Cfc,
    Dsa,
    Dsb,
    Dsc,
    Dsd,
    Dwa,
    Dwb,
    Dwc,
    Dwd,
    Dfa,
    Dfb,
    Dfc,
    Dfd,
    ET,
    EF,
}

impl KoppenCode {
    pub const ALL: [KoppenCode; 31] = [
        KoppenCode::Af,
        KoppenCode::Am,
        KoppenCode::As,
        KoppenCode::Aw,
        KoppenCode::BWh,
        KoppenCode::BWk,
        KoppenCode::BSh,
        KoppenCode::BSk,
        KoppenCode::Csa,
        KoppenCode::Csb,
        KoppenCode::Csc,
        KoppenCode::Cwa,
        KoppenCode::Cwb,
        KoppenCode::Cwc,
        KoppenCode::Cfa,
        KoppenCode::Cfb,
        KoppenCode::Cfc,
        KoppenCode::Dsa,
        KoppenCode::Dsb,
        KoppenCode::Dsc,
        KoppenCode::Dsd,
        KoppenCode::Dwa,
        KoppenCode::Dwb,
        KoppenCode::Dwc,
        KoppenCode::Dwd,
        KoppenCode::Dfa,
        KoppenCode::Dfb,
        KoppenCode::Dfc,
        KoppenCode::Dfd,
        KoppenCode::ET,
        KoppenCode::EF,
    ];

    /// Position in [`KoppenCode::ALL`] and in [`categories`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn code(self) -> &'static str {
        self.describe().0
    }

    pub fn name(self) -> &'static str {
        self.describe().1
    }

    pub fn color(self) -> &'static str {
        self.describe().2
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    fn describe(self) -> (&'static str, &'static str, &'static str) {
        use KoppenCode::*;
        match self {
            Af => ("Af", "Tropical rainforest", "#0000FF"),
            Am => ("Am", "Tropical monsoon", "#0078FF"),
            As => ("As", "Tropical savanna, dry summer", "#78BEFA"),
            Aw => ("Aw", "Tropical savanna, dry winter", "#46AAFA"),
            BWh => ("BWh", "Hot desert", "#FF0000"),
            BWk => ("BWk", "Cold desert", "#FF9696"),
            BSh => ("BSh", "Hot semi-arid", "#F5A500"),
            BSk => ("BSk", "Cold semi-arid", "#FFDC64"),
            Csa => ("Csa", "Hot-summer Mediterranean", "#FFFF00"),
            Csb => ("Csb", "Warm-summer Mediterranean", "#C8C800"),
            Csc => ("Csc", "Cold-summer Mediterranean", "#969600"),
            Cwa => ("Cwa", "Monsoon-influenced humid subtropical", "#96FF96"),
            Cwb => ("Cwb", "Subtropical highland, dry winter", "#64C864"),
            Cwc => ("Cwc", "Cold subtropical highland, dry winter", "#329632"),
            Cfa => ("Cfa", "Humid subtropical", "#C8FF50"),
            Cfb => ("Cfb", "Temperate oceanic", "#64FF50"),
            Cfc => ("Cfc", "Subpolar oceanic", "#32C800"),
            Dsa => ("Dsa", "Hot-summer continental, dry summer", "#FF00FF"),
            Dsb => ("Dsb", "Warm-summer continental, dry summer", "#C800C8"),
            Dsc => ("Dsc", "Subarctic, dry summer", "#963296"),
            Dsd => ("Dsd", "Extremely cold subarctic, dry summer", "#966496"),
            Dwa => ("Dwa", "Hot-summer continental, dry winter", "#AAAFFF"),
            Dwb => ("Dwb", "Warm-summer continental, dry winter", "#5A78DC"),
            Dwc => ("Dwc", "Subarctic, dry winter", "#4B50B4"),
            Dwd => ("Dwd", "Extremely cold subarctic, dry winter", "#320087"),
            Dfa => ("Dfa", "Hot-summer humid continental", "#00FFFF"),
            Dfb => ("Dfb", "Warm-summer humid continental", "#37C8FF"),
            Dfc => ("Dfc", "Subarctic", "#007D7D"),
            Dfd => ("Dfd", "Extremely cold subarctic", "#00465F"),
            ET => ("ET", "Tundra", "#B2B2B2"),
            EF => ("EF", "Ice cap", "#666666"),
        }
    }
}

impl fmt::Display for KoppenCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

static CATEGORIES: Lazy<Vec<Arc<CategoryInfo>>> = Lazy::new(|| {
    KoppenCode::ALL
        .iter()
        .map(|code| Arc::new(CategoryInfo::new(code.code(), code.name(), code.color())))
        .collect()
});

/// Shared category records, indexed by [`KoppenCode::index`]
pub fn categories() -> &'static [Arc<CategoryInfo>] {
    &CATEGORIES
}

pub fn category(code: KoppenCode) -> Arc<CategoryInfo> {
    Arc::clone(&CATEGORIES[code.index()])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrySeason {
    Summer,
    Winter,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Summer {
    Hot,
    Warm,
    Cold,
    VeryColdWinter,
}

/// The threshold tree with its thresholds already resolved
#[derive(Debug, Clone, Copy, Default)]
pub struct KoppenTree {
    thresholds: KoppenThresholds,
}

impl KoppenTree {
    pub fn new(thresholds: KoppenThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &KoppenThresholds {
        &self.thresholds
    }

    /// Assigns exactly one code; every input reaches a leaf
    pub fn evaluate(&self, cell: &RawCell, s: &ClimateSummary) -> KoppenCode {
        use KoppenCode::*;
        let t = &self.thresholds;

        if s.t_hot < t[ThresholdKey::PolarMaxTemp] {
            return if s.t_hot < t[ThresholdKey::IceCapMaxTemp] { EF } else { ET };
        }

        let aridity = self.aridity_threshold(s);
        if s.map < aridity {
            let desert = s.map < t[ThresholdKey::DesertRatio] * aridity;
            let hot = s.mat >= t[ThresholdKey::HotAridMeanTemp];
            return match (desert, hot) {
                (true, true) => BWh,
                (true, false) => BWk,
                (false, true) => BSh,
                (false, false) => BSk,
            };
        }

        if s.t_cold >= t[ThresholdKey::TropicalMinTemp] {
            if s.p_dry >= t[ThresholdKey::RainforestMinPrecip] {
                return Af;
            }
            let monsoon =
                t[ThresholdKey::MonsoonBase] - s.map / t[ThresholdKey::MonsoonDivisor];
            if s.p_dry >= monsoon {
                return Am;
            }
            return if s.driest_in_summer { As } else { Aw };
        }

        let dry = self.dry_season(s);
        let summer = self.summer(cell, s);

        if s.t_cold >= t[ThresholdKey::TemperateMinTemp] {
            temperate(dry, summer)
        } else {
            continental(dry, summer)
        }
    }

    /// Annual precipitation (mm) below which a climate is arid
    fn aridity_threshold(&self, s: &ClimateSummary) -> f64 {
        let t = &self.thresholds;
        let share = t[ThresholdKey::SeasonalShare];
        let offset = if s.map > 0.0 && s.p_summer >= share * s.map {
            t[ThresholdKey::AriditySummerOffset]
        } else if s.map > 0.0 && s.p_winter >= share * s.map {
            0.0
        } else {
            t[ThresholdKey::AridityMixedOffset]
        };
        t[ThresholdKey::AridityTempFactor] * s.mat + offset
    }

    fn dry_season(&self, s: &ClimateSummary) -> DrySeason {
        let t = &self.thresholds;
        let dry_summer = s.ps_dry < t[ThresholdKey::DrySummerMaxPrecip]
            && s.ps_dry < s.pw_wet / t[ThresholdKey::DrySummerRatio];
        let dry_winter = s.pw_dry < s.ps_wet / t[ThresholdKey::DryWinterRatio];

        match (dry_summer, dry_winter) {
            (true, false) => DrySeason::Summer,
            (false, true) => DrySeason::Winter,
            // Both criteria hold: the half-year holding the driest month decides
            (true, true) if s.driest_in_summer => DrySeason::Summer,
            (true, true) => DrySeason::Winter,
            (false, false) => DrySeason::None,
        }
    }

    fn summer(&self, cell: &RawCell, s: &ClimateSummary) -> Summer {
        let t = &self.thresholds;
        if s.t_hot >= t[ThresholdKey::HotSummerTemp] {
            return Summer::Hot;
        }

        let warm_temp = t[ThresholdKey::WarmMonthTemp];
        let warm_months = cell.temperature.iter().filter(|&&v| v >= warm_temp).count();
        if warm_months as f64 >= t[ThresholdKey::WarmMonthCount] {
            Summer::Warm
        } else if s.t_cold < t[ThresholdKey::SevereWinterTemp] {
            Summer::VeryColdWinter
        } else {
            Summer::Cold
        }
    }
}

fn temperate(dry: DrySeason, summer: Summer) -> KoppenCode {
    use KoppenCode::*;
    match (dry, summer) {
        (DrySeason::Summer, Summer::Hot) => Csa,
        (DrySeason::Summer, Summer::Warm) => Csb,
        (DrySeason::Summer, _) => Csc,
        (DrySeason::Winter, Summer::Hot) => Cwa,
        (DrySeason::Winter, Summer::Warm) => Cwb,
        (DrySeason::Winter, _) => Cwc,
        (DrySeason::None, Summer::Hot) => Cfa,
        (DrySeason::None, Summer::Warm) => Cfb,
        (DrySeason::None, _) => Cfc,
    }
}

fn continental(dry: DrySeason, summer: Summer) -> KoppenCode {
    use KoppenCode::*;
    match (dry, summer) {
        (DrySeason::Summer, Summer::Hot) => Dsa,
        (DrySeason::Summer, Summer::Warm) => Dsb,
        (DrySeason::Summer, Summer::Cold) => Dsc,
        (DrySeason::Summer, Summer::VeryColdWinter) => Dsd,
        (DrySeason::Winter, Summer::Hot) => Dwa,
        (DrySeason::Winter, Summer::Warm) => Dwb,
        (DrySeason::Winter, Summer::Cold) => Dwc,
        (DrySeason::Winter, Summer::VeryColdWinter) => Dwd,
        (DrySeason::None, Summer::Hot) => Dfa,
        (DrySeason::None, Summer::Warm) => Dfb,
        (DrySeason::None, Summer::Cold) => Dfc,
        (DrySeason::None, Summer::VeryColdWinter) => Dfd,
    }
}
