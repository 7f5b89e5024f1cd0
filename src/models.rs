//! Data models for Masterplan Tycoon resources and buildings

use std::collections::BTreeMap;
use std::fmt;

use crate::error::CatalogError;

/// Identity of a resource: the same resource name may exist independently on
/// different maps (regions).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub name: String,
    pub region: String,
}

impl ResourceKey {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.region)
    }
}

/// Identity of a building, scoped to a region like resources.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuildingKey {
    pub name: String,
    pub region: String,
}

impl BuildingKey {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for BuildingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.region)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub key: ResourceKey,
}

/// A (resource, quantity) pair as it appears in recipes and cost lists.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAmount {
    pub resource: ResourceKey,
    pub quantity: f64,
}

impl ResourceAmount {
    pub fn new(resource: ResourceKey, quantity: f64) -> Self {
        Self { resource, quantity }
    }
}

/// A production output: quantity produced per cycle, with the cycle time the
/// derived rate comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub resource: ResourceKey,
    pub quantity: f64,
    pub cycle_time_secs: Option<f64>,
}

impl Output {
    pub fn new(resource: ResourceKey, quantity: f64, cycle_time_secs: Option<f64>) -> Self {
        Self {
            resource,
            quantity,
            cycle_time_secs,
        }
    }

    /// Derived production rate in units per minute. `None` when the quantity
    /// or the cycle time is zero or absent; the anomaly detector reports those
    /// as zero/missing-rate outputs.
    pub fn rate_per_minute(&self) -> Option<f64> {
        match self.cycle_time_secs {
            Some(t) if t > 0.0 && self.quantity > 0.0 => Some(self.quantity / t * 60.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub key: BuildingKey,
    /// Position in the production progression (1 = basic extraction).
    pub tier: i64,
    pub inputs: Vec<ResourceAmount>,
    pub outputs: Vec<Output>,
    /// Construction and maintenance costs pass through untouched; the core
    /// only looks at them during anomaly checks.
    pub construction_cost: Vec<ResourceAmount>,
    pub maintenance_cost: Vec<ResourceAmount>,
}

/// Immutable in-memory snapshot of the full resource/building catalog.
///
/// The catalog is loaded once per analysis session and never mutated; all
/// traversal and estimation read from the same snapshot. Recipe relations may
/// reference resources absent from the snapshot (the data is hand-curated) —
/// those are handled at graph-build time, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    resources: BTreeMap<ResourceKey, Resource>,
    buildings: BTreeMap<BuildingKey, Building>,
}

impl Catalog {
    /// Assemble and validate a snapshot. This is the analyzer's only hard
    /// failure point: duplicate identities, empty names/regions, and negative
    /// quantities reject the whole snapshot before any graph is built.
    pub fn new(resources: Vec<Resource>, buildings: Vec<Building>) -> Result<Self, CatalogError> {
        let mut resource_map = BTreeMap::new();
        for resource in resources {
            if resource.key.name.is_empty() || resource.key.region.is_empty() {
                return Err(CatalogError::UnnamedResource);
            }
            if let Some(prev) = resource_map.insert(resource.key.clone(), resource) {
                return Err(CatalogError::DuplicateResource(prev.key));
            }
        }

        let mut building_map = BTreeMap::new();
        for building in buildings {
            if building.key.name.is_empty() || building.key.region.is_empty() {
                return Err(CatalogError::UnnamedBuilding);
            }
            Self::check_quantities(&building)?;
            if let Some(prev) = building_map.insert(building.key.clone(), building) {
                return Err(CatalogError::DuplicateBuilding(prev.key));
            }
        }

        Ok(Self {
            resources: resource_map,
            buildings: building_map,
        })
    }

    fn check_quantities(building: &Building) -> Result<(), CatalogError> {
        let relations: [(&'static str, &Vec<ResourceAmount>); 3] = [
            ("input", &building.inputs),
            ("construction", &building.construction_cost),
            ("maintenance", &building.maintenance_cost),
        ];
        for (relation, amounts) in relations {
            for amount in amounts {
                if amount.quantity < 0.0 {
                    return Err(CatalogError::NegativeQuantity {
                        building: building.key.clone(),
                        resource: amount.resource.clone(),
                        relation,
                    });
                }
            }
        }
        for output in &building.outputs {
            if output.quantity < 0.0 {
                return Err(CatalogError::NegativeQuantity {
                    building: building.key.clone(),
                    resource: output.resource.clone(),
                    relation: "output",
                });
            }
        }
        Ok(())
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    pub fn contains_resource(&self, key: &ResourceKey) -> bool {
        self.resources.contains_key(key)
    }

    pub fn building(&self, key: &BuildingKey) -> Option<&Building> {
        self.buildings.get(key)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }
}
