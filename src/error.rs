//! Catalog error taxonomy
//!
//! A structurally invalid catalog snapshot is the only hard failure in the
//! analyzer; everything downstream degrades gracefully (skipped relations,
//! truncated trees, bounds statuses).

use thiserror::Error;

use crate::models::{BuildingKey, ResourceKey};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate resource {0}")]
    DuplicateResource(ResourceKey),

    #[error("duplicate building {0}")]
    DuplicateBuilding(BuildingKey),

    #[error("resource with empty name or region")]
    UnnamedResource,

    #[error("building with empty name or region")]
    UnnamedBuilding,

    #[error("building {building} has a negative {relation} quantity for {resource}")]
    NegativeQuantity {
        building: BuildingKey,
        resource: ResourceKey,
        relation: &'static str,
    },
}
