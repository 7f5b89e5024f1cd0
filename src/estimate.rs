//! First-order building requirement estimation
//!
//! Converts target resource rates into per-building counts. This is a
//! conservative approximation, not a multi-commodity optimizer: each target
//! is sized independently, and a building serving several targets gets the
//! maximum requirement across them rather than the sum, since one building's
//! full output feeds every consumer that needs it.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::bounds::{CountCheck, SafetyBounds};
use crate::graph::ProductionGraph;
use crate::models::{BuildingKey, ResourceKey};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildingEstimate {
    pub count: u64,
    pub check: CountCheck,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequirementEstimate {
    pub buildings: BTreeMap<BuildingKey, BuildingEstimate>,
    pub total_count: u64,
    pub total_check: CountCheck,
    /// Targets no building in the catalog produces.
    pub unproducible: Vec<ResourceKey>,
}

/// Estimate building counts for a set of target production rates
/// (units per minute per resource).
///
/// Sizing uses the derived per-minute rate of each producer when the catalog
/// carries one, falling back to the per-cycle output quantity otherwise.
/// Every count comes back with its bounds status attached; counts are never
/// returned unchecked.
pub fn estimate(
    graph: &ProductionGraph,
    targets: &BTreeMap<ResourceKey, f64>,
    bounds: &SafetyBounds,
) -> RequirementEstimate {
    let mut required: BTreeMap<BuildingKey, u64> = BTreeMap::new();
    let mut unproducible = Vec::new();

    for (resource, &desired) in targets {
        let producers = graph.producers(resource);
        if producers.is_empty() {
            debug!(resource = %resource, "target has no producers");
            unproducible.push(resource.clone());
            continue;
        }
        for entry in producers {
            let per_building = entry.rate_per_minute.unwrap_or(entry.output_quantity);
            if per_building <= 0.0 {
                continue;
            }
            let needed = (desired / per_building).ceil() as u64;
            // Max across targets, not sum: the most demanding consumer
            // drives the count.
            required
                .entry(entry.building.clone())
                .and_modify(|count| *count = (*count).max(needed))
                .or_insert(needed);
        }
    }

    let total_count = required.values().sum();
    let buildings = required
        .into_iter()
        .map(|(building, count)| {
            let check = bounds.check_count(&building, count);
            (building, BuildingEstimate { count, check })
        })
        .collect();

    RequirementEstimate {
        buildings,
        total_count,
        total_check: bounds.check_total(total_count),
        unproducible,
    }
}

impl fmt::Display for RequirementEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Requirement Estimate ===")?;
        writeln!(f, "Buildings required:")?;
        for (building, estimate) in &self.buildings {
            writeln!(
                f,
                "  {:>5}x {} [{}] (limit {})",
                estimate.count, building, estimate.check.status, estimate.check.limit
            )?;
        }
        writeln!(
            f,
            "Total: {} buildings [{}]",
            self.total_count, self.total_check.status
        )?;
        if !self.unproducible.is_empty() {
            writeln!(f, "No producer found for:")?;
            for resource in &self.unproducible {
                writeln!(f, "  {}", resource)?;
            }
        }
        writeln!(
            f,
            "(first-order estimate; does not model shared intermediate demand)"
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::BoundsStatus;
    use crate::models::{Building, Catalog, Output, Resource, ResourceAmount};

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new(name, "Master")
    }

    fn producer(name: &str, output: &str, quantity: f64, cycle_secs: f64) -> Building {
        Building {
            key: BuildingKey::new(name, "Master"),
            tier: 1,
            inputs: Vec::new(),
            outputs: vec![Output::new(key(output), quantity, Some(cycle_secs))],
            construction_cost: Vec::new(),
            maintenance_cost: Vec::new(),
        }
    }

    fn graph_for(resources: &[&str], buildings: Vec<Building>) -> ProductionGraph {
        let resources = resources
            .iter()
            .map(|n| Resource { key: key(n) })
            .collect();
        let catalog = Catalog::new(resources, buildings).unwrap();
        ProductionGraph::build(&catalog).0
    }

    #[test]
    fn count_is_ceiling_of_rate_ratio() {
        // Well produces 10 Water/min; 100/min needs exactly 10 wells.
        let graph = graph_for(&["Water"], vec![producer("Well", "Water", 10.0, 60.0)]);
        let targets = BTreeMap::from([(key("Water"), 100.0)]);
        let estimate = estimate(&graph, &targets, &SafetyBounds::default());

        let well = &estimate.buildings[&BuildingKey::new("Well", "Master")];
        assert_eq!(well.count, 10);
        assert_eq!(well.check.status, BoundsStatus::Ok);
    }

    #[test]
    fn fractional_demand_rounds_up() {
        let graph = graph_for(&["Water"], vec![producer("Well", "Water", 10.0, 60.0)]);
        let targets = BTreeMap::from([(key("Water"), 101.0)]);
        let estimate = estimate(&graph, &targets, &SafetyBounds::default());
        assert_eq!(
            estimate.buildings[&BuildingKey::new("Well", "Master")].count,
            11
        );
    }

    #[test]
    fn shared_building_takes_max_across_targets_not_sum() {
        // One press outputs both Oil and Pulp at 5/min.
        let press = Building {
            key: BuildingKey::new("Press", "Master"),
            tier: 2,
            inputs: Vec::new(),
            outputs: vec![
                Output::new(key("Oil"), 5.0, Some(60.0)),
                Output::new(key("Pulp"), 5.0, Some(60.0)),
            ],
            construction_cost: Vec::new(),
            maintenance_cost: Vec::new(),
        };
        let graph = graph_for(&["Oil", "Pulp"], vec![press]);
        let targets = BTreeMap::from([(key("Oil"), 40.0), (key("Pulp"), 15.0)]);
        let estimate = estimate(&graph, &targets, &SafetyBounds::default());
        // max(8, 3), not 8 + 3.
        assert_eq!(
            estimate.buildings[&BuildingKey::new("Press", "Master")].count,
            8
        );
    }

    #[test]
    fn every_count_carries_a_bounds_status() {
        let graph = graph_for(&["Water"], vec![producer("Well", "Water", 1.0, 60.0)]);
        let targets = BTreeMap::from([(key("Water"), 500.0)]); // 500 wells, limit 50
        let estimate = estimate(&graph, &targets, &SafetyBounds::default());
        let well = &estimate.buildings[&BuildingKey::new("Well", "Master")];
        assert_eq!(well.count, 500);
        assert_eq!(well.check.status, BoundsStatus::Error);
    }

    #[test]
    fn target_without_producer_is_reported_not_dropped() {
        let graph = graph_for(&["Water", "Relic"], vec![producer("Well", "Water", 10.0, 60.0)]);
        let targets = BTreeMap::from([(key("Water"), 10.0), (key("Relic"), 1.0)]);
        let estimate = estimate(&graph, &targets, &SafetyBounds::default());
        assert_eq!(estimate.unproducible, vec![key("Relic")]);
        assert_eq!(estimate.buildings.len(), 1);
    }

    #[test]
    fn quantity_fallback_when_rate_missing() {
        let mut well = producer("Well", "Water", 10.0, 60.0);
        well.outputs[0].cycle_time_secs = None;
        let graph = graph_for(&["Water"], vec![well]);
        let targets = BTreeMap::from([(key("Water"), 25.0)]);
        let estimate = estimate(&graph, &targets, &SafetyBounds::default());
        assert_eq!(
            estimate.buildings[&BuildingKey::new("Well", "Master")].count,
            3
        );
    }
}
