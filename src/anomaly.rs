//! Whole-graph validation passes
//!
//! One advisory pass per graph: cycles, self-consuming buildings, isolated
//! resources, raw-material candidates, extreme input:output ratios, and
//! zero/missing-rate outputs. The report annotates the catalog's rough edges
//! for a human to act on; it never blocks graph construction, tracing, or
//! estimation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::graph::ProductionGraph;
use crate::models::{BuildingKey, Catalog, ResourceKey};

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyConfig {
    /// Longest simple cycle reported; keeps enumeration finite on dense
    /// graphs.
    pub max_cycle_len: usize,
    /// Input:output quantity ratio above which an edge is flagged.
    pub ratio_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            max_cycle_len: 8,
            ratio_threshold: 10.0,
        }
    }
}

/// A closed production loop, smallest member first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleEntry {
    pub resources: Vec<ResourceKey>,
}

/// A building whose input and output sets share resources. One entry per
/// building regardless of how many resources it shares.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfConsumer {
    pub building: BuildingKey,
    pub resources: Vec<ResourceKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtremeRatioEdge {
    pub building: BuildingKey,
    pub input: ResourceKey,
    pub output: ResourceKey,
    pub input_quantity: f64,
    pub output_quantity: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZeroRateOutput {
    pub building: BuildingKey,
    pub resource: ResourceKey,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnomalyReport {
    pub cycles: Vec<CycleEntry>,
    pub self_consumers: Vec<SelfConsumer>,
    pub isolated_resources: Vec<ResourceKey>,
    pub raw_material_candidates: Vec<ResourceKey>,
    pub extreme_ratio_edges: Vec<ExtremeRatioEdge>,
    pub zero_rate_outputs: Vec<ZeroRateOutput>,
}

impl AnomalyReport {
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty()
            && self.self_consumers.is_empty()
            && self.isolated_resources.is_empty()
            && self.extreme_ratio_edges.is_empty()
            && self.zero_rate_outputs.is_empty()
    }
}

/// Run every validation pass over one graph.
pub fn analyze(catalog: &Catalog, graph: &ProductionGraph, config: &AnomalyConfig) -> AnomalyReport {
    AnomalyReport {
        cycles: find_cycles(graph, config.max_cycle_len),
        self_consumers: find_self_consumers(catalog),
        isolated_resources: find_isolated(catalog),
        raw_material_candidates: find_raw_candidates(catalog, graph),
        extreme_ratio_edges: find_extreme_ratios(graph, config.ratio_threshold),
        zero_rate_outputs: find_zero_rates(catalog),
    }
}

/// All simple cycles up to `max_len`, each reported exactly once.
///
/// Depth-first enumeration rooted at every node in turn, restricted to nodes
/// ordered after the root so a cycle is only emitted from its smallest
/// member. Length-1 self-loops are left to the self-consumer pass.
fn find_cycles(graph: &ProductionGraph, max_len: usize) -> Vec<CycleEntry> {
    let mut adjacency: BTreeMap<&ResourceKey, BTreeSet<&ResourceKey>> = BTreeMap::new();
    for ((input, output), _) in graph.edges() {
        adjacency.entry(input).or_default().insert(output);
    }

    let mut cycles = Vec::new();
    let nodes: Vec<&ResourceKey> = adjacency.keys().copied().collect();
    for &start in &nodes {
        let mut path = vec![start];
        dfs_cycles(&adjacency, start, start, &mut path, max_len, &mut cycles);
    }
    cycles
}

fn dfs_cycles<'a>(
    adjacency: &BTreeMap<&'a ResourceKey, BTreeSet<&'a ResourceKey>>,
    start: &'a ResourceKey,
    current: &'a ResourceKey,
    path: &mut Vec<&'a ResourceKey>,
    max_len: usize,
    cycles: &mut Vec<CycleEntry>,
) {
    let Some(neighbours) = adjacency.get(current) else {
        return;
    };
    for &next in neighbours {
        if next == start {
            if path.len() > 1 {
                cycles.push(CycleEntry {
                    resources: path.iter().map(|&r| r.clone()).collect(),
                });
            }
        } else if next > start && path.len() < max_len && !path.contains(&next) {
            path.push(next);
            // Recursion depth is capped by max_len.
            dfs_cycles(adjacency, start, next, path, max_len, cycles);
            path.pop();
        }
    }
}

fn find_self_consumers(catalog: &Catalog) -> Vec<SelfConsumer> {
    let mut entries = Vec::new();
    for building in catalog.buildings() {
        let inputs: BTreeSet<&ResourceKey> =
            building.inputs.iter().map(|a| &a.resource).collect();
        let shared: Vec<ResourceKey> = building
            .outputs
            .iter()
            .map(|o| &o.resource)
            .filter(|r| inputs.contains(r))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !shared.is_empty() {
            entries.push(SelfConsumer {
                building: building.key.clone(),
                resources: shared,
            });
        }
    }
    entries
}

/// Resources no building produces or consumes. Consumption is read from the
/// catalog rather than the edge set, so feeding an output-less demand
/// building still counts.
fn find_isolated(catalog: &Catalog) -> Vec<ResourceKey> {
    let consumed = consumed_resources(catalog);
    let produced: BTreeSet<&ResourceKey> = catalog
        .buildings()
        .flat_map(|b| b.outputs.iter().map(|o| &o.resource))
        .collect();
    catalog
        .resources()
        .map(|r| &r.key)
        .filter(|key| !consumed.contains(*key) && !produced.contains(*key))
        .cloned()
        .collect()
}

fn find_raw_candidates(catalog: &Catalog, graph: &ProductionGraph) -> Vec<ResourceKey> {
    let consumed = consumed_resources(catalog);
    catalog
        .resources()
        .map(|r| &r.key)
        .filter(|key| consumed.contains(*key) && !graph.is_producible(key))
        .cloned()
        .collect()
}

fn consumed_resources(catalog: &Catalog) -> BTreeSet<ResourceKey> {
    catalog
        .buildings()
        .flat_map(|b| b.inputs.iter().map(|a| a.resource.clone()))
        .filter(|key| catalog.contains_resource(key))
        .collect()
}

fn find_extreme_ratios(graph: &ProductionGraph, threshold: f64) -> Vec<ExtremeRatioEdge> {
    let mut entries = Vec::new();
    for ((input, output), contributions) in graph.edges() {
        for contribution in contributions {
            if contribution.output_quantity <= 0.0 {
                continue;
            }
            let ratio = contribution.input_quantity / contribution.output_quantity;
            if ratio > threshold {
                entries.push(ExtremeRatioEdge {
                    building: contribution.building.clone(),
                    input: input.clone(),
                    output: output.clone(),
                    input_quantity: contribution.input_quantity,
                    output_quantity: contribution.output_quantity,
                    ratio,
                });
            }
        }
    }
    entries
}

fn find_zero_rates(catalog: &Catalog) -> Vec<ZeroRateOutput> {
    let mut entries = Vec::new();
    for building in catalog.buildings() {
        for output in &building.outputs {
            if output.rate_per_minute().is_none() {
                entries.push(ZeroRateOutput {
                    building: building.key.clone(),
                    resource: output.resource.clone(),
                    quantity: output.quantity,
                });
            }
        }
    }
    entries
}

impl fmt::Display for AnomalyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Anomaly Report ===")?;

        writeln!(f, "Cycles: {}", self.cycles.len())?;
        for cycle in &self.cycles {
            let chain: Vec<String> = cycle.resources.iter().map(|r| r.to_string()).collect();
            writeln!(f, "  {} -> {}", chain.join(" -> "), cycle.resources[0])?;
        }

        writeln!(f, "Self-consuming buildings: {}", self.self_consumers.len())?;
        for entry in &self.self_consumers {
            let shared: Vec<String> = entry.resources.iter().map(|r| r.name.clone()).collect();
            writeln!(f, "  {} ({})", entry.building, shared.join(", "))?;
        }

        writeln!(f, "Isolated resources: {}", self.isolated_resources.len())?;
        for resource in &self.isolated_resources {
            writeln!(f, "  {}", resource)?;
        }

        writeln!(
            f,
            "Raw-material candidates: {}",
            self.raw_material_candidates.len()
        )?;
        for resource in &self.raw_material_candidates {
            writeln!(f, "  {}", resource)?;
        }

        writeln!(f, "Extreme-ratio edges: {}", self.extreme_ratio_edges.len())?;
        for edge in &self.extreme_ratio_edges {
            writeln!(
                f,
                "  {}: {} {} -> {} {} (ratio {:.1}:1)",
                edge.building,
                edge.input_quantity,
                edge.input.name,
                edge.output_quantity,
                edge.output.name,
                edge.ratio
            )?;
        }

        writeln!(f, "Zero/missing-rate outputs: {}", self.zero_rate_outputs.len())?;
        for output in &self.zero_rate_outputs {
            writeln!(f, "  {} -> {}", output.building, output.resource)?;
        }

        Ok(())
    }
}
