//! Production graph construction
//!
//! Derives a directed resource-to-resource graph from the catalog: one edge
//! per (input resource, output resource) pair of a building, with every
//! contributing building accumulated on the edge. The graph is a pure
//! function of the catalog snapshot, so rebuilding from the same snapshot
//! yields an identical edge set.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use crate::models::{BuildingKey, Catalog, ResourceAmount, ResourceKey};

/// One building's contribution to a production edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub building: BuildingKey,
    pub input_quantity: f64,
    pub output_quantity: f64,
    pub rate_per_minute: Option<f64>,
}

/// A building that produces a resource, with the validated inputs the tracer
/// recurses into. Inputs referencing unknown resources have already been
/// dropped (and warned about) here.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerEntry {
    pub building: BuildingKey,
    pub output_quantity: f64,
    pub rate_per_minute: Option<f64>,
    pub inputs: Vec<ResourceAmount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Input,
    Output,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::Input => write!(f, "input"),
            RelationKind::Output => write!(f, "output"),
        }
    }
}

/// A recipe relation referencing a resource absent from the catalog. The
/// relation is skipped, never silently substituted; the rest of the building
/// still enters the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub building: BuildingKey,
    pub missing_resource: ResourceKey,
    pub relation: RelationKind,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} references unknown {} resource {}",
            self.building, self.relation, self.missing_resource
        )
    }
}

/// Immutable production graph keyed by resource identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionGraph {
    /// (input resource, output resource) -> contributing buildings.
    edges: BTreeMap<(ResourceKey, ResourceKey), Vec<Contribution>>,
    /// resource -> buildings producing it, in stable building order.
    producers: BTreeMap<ResourceKey, Vec<ProducerEntry>>,
}

impl ProductionGraph {
    /// Build the graph from a catalog snapshot.
    ///
    /// Never aborts for a bad row: relations naming unknown resources are
    /// dropped with a recorded [`ValidationWarning`] and construction
    /// continues with the rest of the building.
    pub fn build(catalog: &Catalog) -> (Self, Vec<ValidationWarning>) {
        let mut edges: BTreeMap<(ResourceKey, ResourceKey), Vec<Contribution>> = BTreeMap::new();
        let mut producers: BTreeMap<ResourceKey, Vec<ProducerEntry>> = BTreeMap::new();
        let mut warnings = Vec::new();

        for building in catalog.buildings() {
            let mut valid_inputs = Vec::new();
            for input in &building.inputs {
                if catalog.contains_resource(&input.resource) {
                    valid_inputs.push(input.clone());
                } else {
                    let warning = ValidationWarning {
                        building: building.key.clone(),
                        missing_resource: input.resource.clone(),
                        relation: RelationKind::Input,
                    };
                    warn!(%warning, "dropping recipe relation");
                    warnings.push(warning);
                }
            }

            for output in &building.outputs {
                if !catalog.contains_resource(&output.resource) {
                    let warning = ValidationWarning {
                        building: building.key.clone(),
                        missing_resource: output.resource.clone(),
                        relation: RelationKind::Output,
                    };
                    warn!(%warning, "dropping recipe relation");
                    warnings.push(warning);
                    continue;
                }

                producers
                    .entry(output.resource.clone())
                    .or_default()
                    .push(ProducerEntry {
                        building: building.key.clone(),
                        output_quantity: output.quantity,
                        rate_per_minute: output.rate_per_minute(),
                        inputs: valid_inputs.clone(),
                    });

                for input in &valid_inputs {
                    edges
                        .entry((input.resource.clone(), output.resource.clone()))
                        .or_default()
                        .push(Contribution {
                            building: building.key.clone(),
                            input_quantity: input.quantity,
                            output_quantity: output.quantity,
                            rate_per_minute: output.rate_per_minute(),
                        });
                }
            }
        }

        let graph = Self { edges, producers };
        debug!(
            edges = graph.edge_count(),
            producible = graph.producers.len(),
            warnings = warnings.len(),
            "production graph built"
        );
        (graph, warnings)
    }

    /// Buildings producing `resource`, in stable (lexicographic) order.
    /// Empty for raw materials.
    pub fn producers(&self, resource: &ResourceKey) -> &[ProducerEntry] {
        self.producers.get(resource).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether at least one building produces `resource`.
    pub fn is_producible(&self, resource: &ResourceKey) -> bool {
        self.producers.contains_key(resource)
    }

    pub fn edges(
        &self,
    ) -> impl Iterator<Item = (&(ResourceKey, ResourceKey), &Vec<Contribution>)> {
        self.edges.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
