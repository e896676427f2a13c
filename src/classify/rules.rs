//! User-authored rule graphs.
//!
//! A graph is an ordered list of category nodes, each with a priority, an
//! enabled flag, an optional parent and a conjunction of simple comparisons
//! against the derived climate parameters. Before classifying, the graph is
//! compiled into an index-based arena: parents resolved to indices, cycles
//! broken, effective enabled state propagated from the roots down, and an
//! evaluation order fixed by priority then declaration.
//!
//! A rule that cannot be evaluated, such as one still being edited with no
//! value, counts as false. Its node therefore never matches until the rule is
//! completed or removed; a node with no rules at all never matches either.

use super::thresholds::RulesetIssue;
use super::CategoryInfo;
use crate::data::cell::ClimateSummary;
use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Tolerance used by `==` and `!=`
const EQUALITY_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Mat,
    Map,
    TCold,
    THot,
    PDry,
    PWet,
    PsDry,
    PsWet,
    PwDry,
    PwWet,
    PSummer,
    PWinter,
    #[serde(rename = "months_above_10")]
    MonthsAbove10,
    #[serde(other)]
    Unknown,
}

impl Parameter {
    /// Value of this parameter for one cell; `None` for unknown parameters
    pub fn value(self, s: &ClimateSummary) -> Option<f64> {
        let value = match self {
            Parameter::Mat => s.mat,
            Parameter::Map => s.map,
            Parameter::TCold => s.t_cold,
            Parameter::THot => s.t_hot,
            Parameter::PDry => s.p_dry,
            Parameter::PWet => s.p_wet,
            Parameter::PsDry => s.ps_dry,
            Parameter::PsWet => s.ps_wet,
            Parameter::PwDry => s.pw_dry,
            Parameter::PwWet => s.pw_wet,
            Parameter::PSummer => s.p_summer,
            Parameter::PWinter => s.p_winter,
            Parameter::MonthsAbove10 => f64::from(s.months_above_10),
            Parameter::Unknown => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(other)]
    Unknown,
}

impl Operator {
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Lt => lhs < rhs,
            Operator::Le => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Eq => (lhs - rhs).abs() <= EQUALITY_EPSILON,
            Operator::Ne => (lhs - rhs).abs() > EQUALITY_EPSILON,
            Operator::Unknown => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Unknown => "?",
        };
        f.write_str(symbol)
    }
}

/// `parameter operator value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub parameter: Parameter,
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<f64>,
}

impl Rule {
    pub fn new(parameter: Parameter, operator: Operator, value: f64) -> Self {
        Self {
            parameter,
            operator,
            value: Some(value),
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl CategoryNode {
    pub fn new(id: &str, name: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            priority: 0,
            enabled: true,
            parent: None,
            rules: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn with_rule(mut self, parameter: Parameter, operator: Operator, value: f64) -> Self {
        self.rules.push(Rule::new(parameter, operator, value));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Ordered category nodes; declaration order breaks priority ties
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleGraph {
    pub categories: Vec<CategoryNode>,
}

impl RuleGraph {
    pub fn new(categories: Vec<CategoryNode>) -> Self {
        Self { categories }
    }

    pub fn push(&mut self, node: CategoryNode) {
        self.categories.push(node);
    }

    pub fn compile(&self) -> (CompiledGraph, Vec<RulesetIssue>) {
        CompiledGraph::compile(self)
    }

    pub fn validate(&self) -> Vec<RulesetIssue> {
        self.compile().1
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CompiledRule {
    parameter: Parameter,
    operator: Operator,
    value: f64,
}

impl CompiledRule {
    fn matches(&self, s: &ClimateSummary) -> bool {
        self.parameter
            .value(s)
            .map(|v| self.operator.apply(v, self.value))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
struct CompiledNode {
    info: Arc<CategoryInfo>,
    priority: i32,
    own_enabled: bool,
    enabled: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    rules: Vec<CompiledRule>,
}

/// Arena form of a [`RuleGraph`], valid for one classification pass
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    nodes: Vec<CompiledNode>,
    order: Vec<usize>,
}

impl CompiledGraph {
    pub fn compile(graph: &RuleGraph) -> (Self, Vec<RulesetIssue>) {
        let mut issues = Vec::new();

        let mut ids: FxHashMap<&str, usize> = FxHashMap::default();
        for (index, node) in graph.categories.iter().enumerate() {
            if ids.contains_key(node.id.as_str()) {
                issues.push(RulesetIssue::new(
                    format!("category {}", node.id),
                    "duplicate id; children attach to the first occurrence",
                ));
            } else {
                ids.insert(node.id.as_str(), index);
            }
        }

        let mut nodes: Vec<CompiledNode> = graph
            .categories
            .iter()
            .map(|node| CompiledNode {
                info: Arc::new(CategoryInfo::new(&node.id, &node.name, &node.color)),
                priority: node.priority,
                own_enabled: node.enabled,
                enabled: false,
                parent: None,
                children: Vec::new(),
                rules: compile_rules(node, &mut issues),
            })
            .collect();

        for (index, node) in graph.categories.iter().enumerate() {
            let Some(parent_id) = node.parent.as_deref() else {
                continue;
            };
            match ids.get(parent_id) {
                Some(&parent) if parent != index => nodes[index].parent = Some(parent),
                Some(_) => issues.push(RulesetIssue::new(
                    format!("category {}", node.id),
                    "is its own parent; treated as a root",
                )),
                None => issues.push(RulesetIssue::new(
                    format!("category {}", node.id),
                    format!("unknown parent {}; treated as a root", parent_id),
                )),
            }
        }

        break_cycles(&mut nodes, &mut issues);

        let mut roots = Vec::new();
        for index in 0..nodes.len() {
            match nodes[index].parent {
                Some(parent) => nodes[parent].children.push(index),
                None => roots.push(index),
            }
        }

        // A node is enabled only if every ancestor is
        let mut stack: Vec<(usize, bool)> = roots.into_iter().map(|root| (root, true)).collect();
        while let Some((index, parent_enabled)) = stack.pop() {
            let enabled = parent_enabled && nodes[index].own_enabled;
            nodes[index].enabled = enabled;
            for &child in &nodes[index].children {
                stack.push((child, enabled));
            }
        }

        let mut order: Vec<usize> = (0..nodes.len())
            .filter(|&i| nodes[i].enabled && !nodes[i].rules.is_empty())
            .collect();
        order.sort_by_key(|&i| (nodes[i].priority, i));

        (Self { nodes, order }, issues)
    }

    /// Index of the first enabled category whose rules all hold
    pub fn evaluate(&self, s: &ClimateSummary) -> Option<usize> {
        self.order
            .iter()
            .copied()
            .find(|&i| self.nodes[i].rules.iter().all(|rule| rule.matches(s)))
    }

    /// Category records in declaration order
    pub fn categories(&self) -> Vec<Arc<CategoryInfo>> {
        self.nodes.iter().map(|node| Arc::clone(&node.info)).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.nodes.get(index).and_then(|node| node.parent)
    }

    pub fn children(&self, index: usize) -> &[usize] {
        self.nodes
            .get(index)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_enabled(&self, index: usize) -> bool {
        self.nodes.get(index).map(|node| node.enabled).unwrap_or(false)
    }

    /// Indices in the order they are tried
    pub fn evaluation_order(&self) -> &[usize] {
        &self.order
    }
}

/// Rules of one node. A rule that cannot be evaluated (unknown parameter or
/// operator, missing value) is false for every cell, so a node holding one is
/// compiled with no rules and never matches.
fn compile_rules(node: &CategoryNode, issues: &mut Vec<RulesetIssue>) -> Vec<CompiledRule> {
    let mut compiled = Vec::with_capacity(node.rules.len());
    let mut unusable = false;
    for (position, rule) in node.rules.iter().enumerate() {
        let location = format!("category {} rule {}", node.id, position);
        let value = rule.value.filter(|v| v.is_finite());
        let problem = match value {
            _ if rule.parameter == Parameter::Unknown => "unknown parameter",
            _ if rule.operator == Operator::Unknown => "unknown operator",
            None => "no usable value",
            Some(value) => {
                compiled.push(CompiledRule {
                    parameter: rule.parameter,
                    operator: rule.operator,
                    value,
                });
                continue;
            }
        };
        issues.push(RulesetIssue::new(location, problem));
        unusable = true;
    }

    if unusable || compiled.is_empty() {
        if node.enabled {
            issues.push(RulesetIssue::new(
                format!("category {}", node.id),
                "has no usable rules and never matches",
            ));
        }
        return Vec::new();
    }
    compiled
}

/// Detaches the node that closes each parent cycle, making it a root
fn break_cycles(nodes: &mut [CompiledNode], issues: &mut Vec<RulesetIssue>) {
    for start in 0..nodes.len() {
        let mut seen = FxHashSet::default();
        let mut current = nodes[start].parent;
        while let Some(index) = current {
            if index == start || !seen.insert(index) {
                issues.push(RulesetIssue::new(
                    format!("category {}", nodes[start].info.code),
                    "parent chain forms a cycle; treated as a root",
                ));
                nodes[start].parent = None;
                break;
            }
            current = nodes[index].parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cell::RawCell;

    fn summary(temp: f64, precip: f64) -> ClimateSummary {
        RawCell::square(10.0, 10.0, 1.0, [temp; 12], [precip; 12]).summary()
    }

    #[test]
    fn test_wire_format() {
        let graph: RuleGraph = serde_json::from_str(
            r##"{"categories":[
                {"id":"wet","name":"Wet","color":"#00f","priority":1,
                 "rules":[{"parameter":"map","operator":">=","value":1000},
                          {"parameter":"months_above_10","operator":">","value":3}]},
                {"id":"odd","name":"Odd","color":"#f00","parent":"wet",
                 "rules":[{"parameter":"humidity","operator":"~","value":null}]}
            ]}"##,
        )
        .unwrap();

        assert_eq!(graph.categories[0].rules[1].parameter, Parameter::MonthsAbove10);
        assert_eq!(graph.categories[1].rules[0].parameter, Parameter::Unknown);
        assert_eq!(graph.categories[1].rules[0].operator, Operator::Unknown);
        assert!(graph.categories[1].enabled);

        // The bad rule, plus the node it blocks
        let issues = graph.validate();
        assert_eq!(issues.len(), 2, "{:?}", issues);
    }

    #[test]
    fn test_priority_then_declaration_order() {
        let graph = RuleGraph::new(vec![
            CategoryNode::new("late", "Late", "#111111")
                .with_priority(5)
                .with_rule(Parameter::Mat, Operator::Gt, 0.0),
            CategoryNode::new("first", "First", "#222222")
                .with_priority(1)
                .with_rule(Parameter::Mat, Operator::Gt, 0.0),
            CategoryNode::new("tie", "Tie", "#333333")
                .with_priority(1)
                .with_rule(Parameter::Mat, Operator::Gt, 0.0),
        ]);
        let (compiled, issues) = graph.compile();
        assert!(issues.is_empty());
        assert_eq!(compiled.evaluation_order(), &[1, 2, 0]);
        assert_eq!(compiled.evaluate(&summary(20.0, 50.0)), Some(1));
        assert_eq!(compiled.evaluate(&summary(-5.0, 50.0)), None);
    }

    #[test]
    fn test_all_rules_must_hold() {
        let graph = RuleGraph::new(vec![CategoryNode::new("warm_wet", "Warm wet", "#00ff00")
            .with_rule(Parameter::Mat, Operator::Ge, 20.0)
            .with_rule(Parameter::Map, Operator::Ge, 1200.0)]);
        let (compiled, _) = graph.compile();

        assert_eq!(compiled.evaluate(&summary(25.0, 100.0)), Some(0));
        assert_eq!(compiled.evaluate(&summary(25.0, 50.0)), None);
        assert_eq!(compiled.evaluate(&summary(15.0, 100.0)), None);
    }

    #[test]
    fn test_disabled_ancestor_disables_descendants() {
        let graph = RuleGraph::new(vec![
            CategoryNode::new("root", "Root", "#000000")
                .disabled()
                .with_rule(Parameter::Mat, Operator::Gt, 100.0),
            CategoryNode::new("child", "Child", "#111111")
                .with_parent("root")
                .with_rule(Parameter::Mat, Operator::Gt, 0.0),
            CategoryNode::new("grandchild", "Grandchild", "#222222")
                .with_parent("child")
                .with_rule(Parameter::Mat, Operator::Gt, 0.0),
            CategoryNode::new("other", "Other", "#333333")
                .with_priority(10)
                .with_rule(Parameter::Mat, Operator::Gt, 0.0),
        ]);
        let (compiled, _) = graph.compile();

        assert!(!compiled.is_enabled(1));
        assert!(!compiled.is_enabled(2));
        assert_eq!(compiled.children(0), &[1]);
        assert_eq!(compiled.parent(2), Some(1));
        assert_eq!(compiled.evaluate(&summary(20.0, 50.0)), Some(3));
    }

    #[test]
    fn test_child_does_not_inherit_parent_rules() {
        let graph = RuleGraph::new(vec![
            CategoryNode::new("cold", "Cold", "#0000ff")
                .with_priority(2)
                .with_rule(Parameter::Mat, Operator::Lt, 0.0),
            CategoryNode::new("wet", "Wet", "#00ffff")
                .with_parent("cold")
                .with_priority(1)
                .with_rule(Parameter::Map, Operator::Gt, 500.0),
        ]);
        let (compiled, _) = graph.compile();
        assert_eq!(compiled.evaluate(&summary(25.0, 100.0)), Some(1));
    }

    #[test]
    fn test_unknown_parent_and_cycles_become_roots() {
        let graph = RuleGraph::new(vec![
            CategoryNode::new("a", "A", "#aaaaaa")
                .with_parent("b")
                .with_rule(Parameter::THot, Operator::Gt, 0.0),
            CategoryNode::new("b", "B", "#bbbbbb")
                .with_parent("a")
                .with_rule(Parameter::THot, Operator::Gt, 0.0),
            CategoryNode::new("c", "C", "#cccccc")
                .with_parent("missing")
                .with_rule(Parameter::THot, Operator::Gt, 0.0),
        ]);
        let (compiled, issues) = graph.compile();

        assert_eq!(compiled.parent(0), None);
        assert_eq!(compiled.parent(1), Some(0));
        assert_eq!(compiled.parent(2), None);
        assert_eq!(issues.len(), 2);
        assert!((0..3).all(|i| compiled.is_enabled(i)));
    }

    #[test]
    fn test_node_without_rules_never_matches() {
        let graph = RuleGraph::new(vec![
            CategoryNode::new("empty", "Empty", "#000000"),
            CategoryNode::new("any", "Any", "#ffffff")
                .with_priority(3)
                .with_rule(Parameter::Map, Operator::Ge, 0.0),
        ]);
        let (compiled, issues) = graph.compile();
        assert_eq!(issues.len(), 1);
        assert_eq!(compiled.evaluate(&summary(10.0, 10.0)), Some(1));
    }

    #[test]
    fn test_unfinished_rule_blocks_its_node() {
        let mut hot_wet = CategoryNode::new("hot_wet", "Hot wet", "#ff0000")
            .with_rule(Parameter::Mat, Operator::Ge, 20.0);
        hot_wet.rules.push(Rule {
            parameter: Parameter::Map,
            operator: Operator::Ge,
            value: None,
        });
        let graph = RuleGraph::new(vec![
            hot_wet,
            CategoryNode::new("fallback", "Fallback", "#00ff00")
                .with_priority(9)
                .with_rule(Parameter::Mat, Operator::Gt, -100.0),
        ]);
        let (compiled, issues) = graph.compile();

        assert_eq!(issues.len(), 2, "{:?}", issues);
        assert!(!compiled.evaluation_order().contains(&0));
        assert_eq!(compiled.evaluate(&summary(25.0, 1.0)), Some(1));
    }

    #[test]
    fn test_equality_operators() {
        assert!(Operator::Eq.apply(10.0, 10.0 + 1e-9));
        assert!(!Operator::Ne.apply(10.0, 10.0));
        assert!(Operator::Ne.apply(10.0, 10.5));
        assert!(!Operator::Unknown.apply(1.0, 1.0));
    }
}
