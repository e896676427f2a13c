//! Classification engine
//!
//! [`classify`] turns raw cells into classified cells plus per-category
//! counts under either ruleset kind. It never mutates its input and never
//! fails: ruleset problems are logged and worked around.

pub mod koppen;
pub mod rules;
pub mod thresholds;

use crate::core::constants::{UNCLASSIFIED_COLOR, UNCLASSIFIED_NAME};
use crate::data::cell::{ClimateSummary, RawCell};
use crate::{Error, Result};
use koppen::KoppenTree;
use rules::{CompiledGraph, RuleGraph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thresholds::{KoppenThresholds, RulesetIssue, ThresholdRuleset};

/// Display record of a category; shared by every cell assigned to it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub code: String,
    pub name: String,
    pub color: String,
}

impl CategoryInfo {
    pub fn new(code: &str, name: &str, color: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            color: color.to_string(),
        }
    }
}

/// A raw cell paired with its category under one ruleset
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedCell {
    raw: Arc<RawCell>,
    category: Option<Arc<CategoryInfo>>,
}

impl ClassifiedCell {
    pub fn new(raw: Arc<RawCell>, category: Option<Arc<CategoryInfo>>) -> Self {
        Self { raw, category }
    }

    pub fn raw(&self) -> &Arc<RawCell> {
        &self.raw
    }

    pub fn category(&self) -> Option<&Arc<CategoryInfo>> {
        self.category.as_ref()
    }

    pub fn is_classified(&self) -> bool {
        self.category.is_some()
    }

    pub fn code(&self) -> Option<&str> {
        self.category.as_deref().map(|c| c.code.as_str())
    }

    pub fn name(&self) -> &str {
        self.category
            .as_deref()
            .map(|c| c.name.as_str())
            .unwrap_or(UNCLASSIFIED_NAME)
    }

    pub fn color(&self) -> &str {
        self.category
            .as_deref()
            .map(|c| c.color.as_str())
            .unwrap_or(UNCLASSIFIED_COLOR)
    }
}

/// Anything that can hand out the raw cell it was built from
pub trait AsRawCell {
    fn raw_cell(&self) -> &Arc<RawCell>;
}

impl AsRawCell for Arc<RawCell> {
    fn raw_cell(&self) -> &Arc<RawCell> {
        self
    }
}

impl AsRawCell for ClassifiedCell {
    fn raw_cell(&self) -> &Arc<RawCell> {
        &self.raw
    }
}

/// Per-category cell counts. Categories with no cells are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryStats {
    pub counts: BTreeMap<String, usize>,
    pub unclassified: usize,
}

impl CategoryStats {
    pub fn get(&self, code: &str) -> usize {
        self.counts.get(code).copied().unwrap_or(0)
    }

    pub fn classified(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn total(&self) -> usize {
        self.classified() + self.unclassified
    }

    pub fn merge(&mut self, other: &CategoryStats) {
        for (code, count) in &other.counts {
            *self.counts.entry(code.clone()).or_insert(0) += count;
        }
        self.unclassified += other.unclassified;
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Classification {
    pub cells: Vec<ClassifiedCell>,
    pub stats: CategoryStats,
}

/// Either kind of ruleset. Replaced wholesale on every edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ruleset {
    Threshold(ThresholdRuleset),
    Custom(RuleGraph),
}

impl Default for Ruleset {
    fn default() -> Self {
        Ruleset::Threshold(ThresholdRuleset::koppen_default())
    }
}

impl From<ThresholdRuleset> for Ruleset {
    fn from(ruleset: ThresholdRuleset) -> Self {
        Ruleset::Threshold(ruleset)
    }
}

impl From<RuleGraph> for Ruleset {
    fn from(graph: RuleGraph) -> Self {
        Ruleset::Custom(graph)
    }
}

impl Ruleset {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Ruleset(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Ruleset(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Ruleset::Threshold(_) => "threshold",
            Ruleset::Custom(_) => "custom",
        }
    }

    /// Everything classification would have to work around
    pub fn validate(&self) -> Vec<RulesetIssue> {
        match self {
            Ruleset::Threshold(ruleset) => ruleset.validate(),
            Ruleset::Custom(graph) => graph.validate(),
        }
    }
}

enum Engine {
    Threshold(KoppenTree),
    Custom(CompiledGraph),
}

/// A ruleset resolved once for a classification pass
struct CompiledRuleset {
    engine: Engine,
    categories: Vec<Arc<CategoryInfo>>,
}

impl CompiledRuleset {
    fn compile(ruleset: &Ruleset) -> Self {
        let (compiled, issues) = match ruleset {
            Ruleset::Threshold(ruleset) => {
                let (thresholds, issues) = KoppenThresholds::resolve(ruleset);
                let compiled = Self {
                    engine: Engine::Threshold(KoppenTree::new(thresholds)),
                    categories: koppen::categories().to_vec(),
                };
                (compiled, issues)
            }
            Ruleset::Custom(graph) => {
                let (graph, issues) = CompiledGraph::compile(graph);
                let compiled = Self {
                    categories: graph.categories(),
                    engine: Engine::Custom(graph),
                };
                (compiled, issues)
            }
        };

        for issue in &issues {
            log::warn!("{} ruleset: {}", ruleset.kind(), issue);
        }
        compiled
    }

    fn evaluate(&self, cell: &RawCell, summary: &ClimateSummary) -> Option<usize> {
        match &self.engine {
            Engine::Threshold(tree) => Some(tree.evaluate(cell, summary).index()),
            Engine::Custom(graph) => graph.evaluate(summary),
        }
    }
}

/// Classifies every cell under `ruleset`, preserving input order
pub fn classify<C: AsRawCell>(cells: &[C], ruleset: &Ruleset) -> Classification {
    let compiled = CompiledRuleset::compile(ruleset);
    let mut counts = vec![0usize; compiled.categories.len()];
    let mut unclassified = 0usize;

    let classified = cells
        .iter()
        .map(|cell| {
            let raw = cell.raw_cell();
            let summary = ClimateSummary::from_cell(raw);
            let category = match compiled.evaluate(raw, &summary) {
                Some(index) => {
                    counts[index] += 1;
                    Some(Arc::clone(&compiled.categories[index]))
                }
                None => {
                    unclassified += 1;
                    None
                }
            };
            ClassifiedCell::new(Arc::clone(raw), category)
        })
        .collect();

    let mut stats = CategoryStats {
        unclassified,
        ..CategoryStats::default()
    };
    for (info, count) in compiled.categories.iter().zip(counts) {
        if count > 0 {
            *stats.counts.entry(info.code.clone()).or_insert(0) += count;
        }
    }

    Classification {
        cells: classified,
        stats,
    }
}
