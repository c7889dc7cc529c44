//! Emissions aggregation engine.
//!
//! Pure functions that derive dashboard figures from the three scope
//! collections. Nothing here caches or mutates its inputs; callers recompute
//! whenever an entry changes.

use std::collections::HashMap;

use serde::Serialize;

use crate::entry::EmissionEntry;
use crate::report::{ReportState, Scope};

/// Label for entries that have no sub-category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Number of sources shown in the by-source breakdown by default.
pub const DEFAULT_TOP_N: usize = 10;

/// Label of the closing bar in the waterfall series.
pub const WATERFALL_TOTAL: &str = "Total";

/// Emissions of a single entry: quantity × emission factor.
///
/// Unparseable or missing inputs count as 0 and the result is always finite.
#[must_use]
pub fn emissions_of(entry: &EmissionEntry) -> f64 {
    let emissions = entry.quantity_value() * entry.emission_factor_value();
    if emissions.is_finite() {
        emissions
    } else {
        0.0
    }
}

/// Sum of emissions over one scope collection.
#[must_use]
pub fn scope_total(entries: &[EmissionEntry]) -> f64 {
    entries.iter().map(emissions_of).sum()
}

/// Sum of the three scope totals.
#[must_use]
pub fn overall_total(
    scope1: &[EmissionEntry],
    scope2: &[EmissionEntry],
    scope3: &[EmissionEntry],
) -> f64 {
    scope_total(scope1) + scope_total(scope2) + scope_total(scope3)
}

/// Emissions attributed to one source (sub-category).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceEmissions {
    /// Sub-category name, or [`UNCATEGORIZED`].
    pub name: String,
    /// Summed emissions.
    pub emissions: f64,
}

/// A named value in a simple chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    /// Series label.
    pub name: String,
    /// Plotted value.
    pub value: f64,
}

/// Emissions falling in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyEmissions {
    /// Month key, `YYYY-MM`.
    pub month: String,
    /// Summed emissions.
    pub emissions: f64,
}

fn source_name(entry: &EmissionEntry) -> &str {
    if entry.sub_category.is_empty() {
        UNCATEGORIZED
    } else {
        &entry.sub_category
    }
}

/// Sum `value` per key, preserving the order keys are first seen.
fn group_in_order<'a, I>(items: I) -> Vec<(String, f64)>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<(String, f64)> = Vec::new();
    for (key, value) in items {
        match index.get(key) {
            Some(&i) => groups[i].1 += value,
            None => {
                index.insert(key, groups.len());
                groups.push((key.to_string(), value));
            }
        }
    }
    groups
}

/// Top `top_n` sources across all scopes, largest first.
///
/// Sources with equal sums keep the order in which they were first seen.
#[must_use]
pub fn by_source(
    scope1: &[EmissionEntry],
    scope2: &[EmissionEntry],
    scope3: &[EmissionEntry],
    top_n: usize,
) -> Vec<SourceEmissions> {
    let all = scope1.iter().chain(scope2).chain(scope3);
    let mut groups = group_in_order(all.map(|e| (source_name(e), emissions_of(e))));
    // sort_by is stable, which keeps first-seen order among ties
    groups.sort_by(|a, b| b.1.total_cmp(&a.1));
    groups.truncate(top_n);
    groups
        .into_iter()
        .map(|(name, emissions)| SourceEmissions { name, emissions })
        .collect()
}

/// Per-scope totals for the pie chart; scopes totalling zero are left out.
#[must_use]
pub fn by_scope_chart(
    scope1: &[EmissionEntry],
    scope2: &[EmissionEntry],
    scope3: &[EmissionEntry],
) -> Vec<ChartPoint> {
    Scope::ALL
        .into_iter()
        .zip([scope1, scope2, scope3])
        .map(|(scope, entries)| ChartPoint {
            name: scope.label().to_string(),
            value: scope_total(entries),
        })
        .filter(|point| point.value.abs() > 0.0)
        .collect()
}

/// Emissions per calendar month, in the order months are first seen.
///
/// Entries without a parseable date are skipped.
#[must_use]
pub fn monthly_trend(
    scope1: &[EmissionEntry],
    scope2: &[EmissionEntry],
    scope3: &[EmissionEntry],
) -> Vec<MonthlyEmissions> {
    let dated: Vec<(String, f64)> = scope1
        .iter()
        .chain(scope2)
        .chain(scope3)
        .filter_map(|e| e.month().map(|month| (month, emissions_of(e))))
        .collect();
    group_in_order(dated.iter().map(|(month, v)| (month.as_str(), *v)))
        .into_iter()
        .map(|(month, emissions)| MonthlyEmissions { month, emissions })
        .collect()
}

/// One bar of the waterfall series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterfallBar {
    /// Bar label.
    pub name: String,
    /// Height of this step.
    pub value: f64,
    /// Cumulative `[start, end]` span of the bar.
    pub range: [f64; 2],
}

/// Waterfall series: Scope 1, Scope 2, each scope 3 sub-category, then Total.
#[must_use]
pub fn waterfall(
    scope1: &[EmissionEntry],
    scope2: &[EmissionEntry],
    scope3: &[EmissionEntry],
) -> Vec<WaterfallBar> {
    let mut steps = vec![
        (Scope::Direct.label().to_string(), scope_total(scope1)),
        (Scope::IndirectEnergy.label().to_string(), scope_total(scope2)),
    ];
    steps.extend(group_in_order(
        scope3.iter().map(|e| (source_name(e), emissions_of(e))),
    ));

    let mut cumulative = 0.0;
    let mut bars: Vec<WaterfallBar> = steps
        .into_iter()
        .map(|(name, value)| {
            let start = cumulative;
            cumulative += value;
            WaterfallBar {
                name,
                value,
                range: [start, cumulative],
            }
        })
        .collect();
    bars.push(WaterfallBar {
        name: WATERFALL_TOTAL.to_string(),
        value: cumulative,
        range: [0.0, cumulative],
    });
    bars
}

/// A top-level treemap node with its leaves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreemapNode {
    /// Scope label.
    pub name: String,
    /// Total of the node.
    pub value: f64,
    /// Leaves drawn inside the node.
    pub children: Vec<ChartPoint>,
}

/// Treemap series.
///
/// Scope 1 and Scope 2 are always present with a single leaf; Scope 3 is
/// split by sub-category and is omitted when it has no entries.
#[must_use]
pub fn treemap(
    scope1: &[EmissionEntry],
    scope2: &[EmissionEntry],
    scope3: &[EmissionEntry],
) -> Vec<TreemapNode> {
    let mut nodes = Vec::with_capacity(3);
    for (scope, entries) in [(Scope::Direct, scope1), (Scope::IndirectEnergy, scope2)] {
        let value = scope_total(entries);
        let name = scope.label().to_string();
        nodes.push(TreemapNode {
            children: vec![ChartPoint {
                name: name.clone(),
                value,
            }],
            name,
            value,
        });
    }

    let children: Vec<ChartPoint> =
        group_in_order(scope3.iter().map(|e| (source_name(e), emissions_of(e))))
            .into_iter()
            .map(|(name, value)| ChartPoint { name, value })
            .collect();
    if !children.is_empty() {
        nodes.push(TreemapNode {
            name: Scope::ValueChain.label().to_string(),
            value: children.iter().map(|c| c.value).sum(),
            children,
        });
    }
    nodes
}

/// One entry plotted on the quantity/factor bubble chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BubblePoint {
    /// Sub-category name, or [`UNCATEGORIZED`].
    pub name: String,
    /// Scope label.
    pub scope: String,
    /// Parsed quantity.
    pub quantity: f64,
    /// Parsed emission factor.
    pub emission_factor: f64,
    /// Bubble size.
    pub emissions: f64,
}

/// One bubble per entry, scope by scope.
#[must_use]
pub fn bubble_points(
    scope1: &[EmissionEntry],
    scope2: &[EmissionEntry],
    scope3: &[EmissionEntry],
) -> Vec<BubblePoint> {
    Scope::ALL
        .into_iter()
        .zip([scope1, scope2, scope3])
        .flat_map(|(scope, entries)| {
            entries.iter().map(move |e| BubblePoint {
                name: source_name(e).to_string(),
                scope: scope.label().to_string(),
                quantity: e.quantity_value(),
                emission_factor: e.emission_factor_value(),
                emissions: emissions_of(e),
            })
        })
        .collect()
}

/// Per-scope and overall totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    /// Scope 1 total.
    pub scope1: f64,
    /// Scope 2 total.
    pub scope2: f64,
    /// Scope 3 total.
    pub scope3: f64,
    /// Sum of the three.
    pub overall: f64,
}

/// Every dashboard figure for a report, computed in one pass over the state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Scope and overall totals.
    pub totals: Totals,
    /// Pie chart series.
    pub by_scope: Vec<ChartPoint>,
    /// Top sources.
    pub by_source: Vec<SourceEmissions>,
    /// Monthly trend.
    pub monthly_trend: Vec<MonthlyEmissions>,
    /// Waterfall series.
    pub waterfall: Vec<WaterfallBar>,
    /// Treemap series.
    pub treemap: Vec<TreemapNode>,
    /// Bubble chart series.
    pub bubbles: Vec<BubblePoint>,
}

impl Dashboard {
    /// Compute the dashboard for `state`, keeping the `top_n` largest sources.
    #[must_use]
    pub fn compute(state: &ReportState, top_n: usize) -> Self {
        let (s1, s2, s3) = (&state.scope1[..], &state.scope2[..], &state.scope3[..]);
        let totals = Totals {
            scope1: scope_total(s1),
            scope2: scope_total(s2),
            scope3: scope_total(s3),
            overall: overall_total(s1, s2, s3),
        };
        Self {
            totals,
            by_scope: by_scope_chart(s1, s2, s3),
            by_source: by_source(s1, s2, s3, top_n),
            monthly_trend: monthly_trend(s1, s2, s3),
            waterfall: waterfall(s1, s2, s3),
            treemap: treemap(s1, s2, s3),
            bubbles: bubble_points(s1, s2, s3),
        }
    }
}
