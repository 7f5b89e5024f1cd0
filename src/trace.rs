//! Guarded dependency tracing
//!
//! Expands a target resource into the buildings that produce it and their
//! required inputs, down to raw materials. The expansion runs on an explicit
//! frontier (work stack plus node arena) rather than native recursion, so a
//! pathological catalog can exhaust the iteration budget but never the call
//! stack. Guards per node, checked in order: ancestor-path cycle guard,
//! depth bound, shared iteration budget.

use std::collections::HashSet;
use std::fmt;
use std::fmt::Write as _;

use tracing::warn;

use crate::bounds::SafetyBounds;
use crate::graph::ProductionGraph;
use crate::models::{BuildingKey, ResourceKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Intermediate resource with at least one producer.
    Expanding,
    /// No producers in the catalog; terminal.
    Raw,
    /// Resource already on its own ancestor chain; terminal.
    CycleDetected,
    /// Depth counter hit the bound; terminal.
    MaxDepthReached,
    /// Trace-wide iteration budget exhausted; terminal.
    BudgetExceeded,
}

impl NodeStatus {
    fn is_truncation(self) -> bool {
        matches!(self, NodeStatus::MaxDepthReached | NodeStatus::BudgetExceeded)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Expanding => write!(f, "EXPANDING"),
            NodeStatus::Raw => write!(f, "RAW"),
            NodeStatus::CycleDetected => write!(f, "CYCLE_DETECTED"),
            NodeStatus::MaxDepthReached => write!(f, "MAX_DEPTH_REACHED"),
            NodeStatus::BudgetExceeded => write!(f, "BUDGET_EXCEEDED"),
        }
    }
}

/// Iteration budget shared across one whole trace call, threaded explicitly
/// so concurrent independent traces cannot interfere with each other.
#[derive(Debug)]
pub struct TraceBudget {
    remaining: u64,
}

impl TraceBudget {
    pub fn new(limit: u64) -> Self {
        Self { remaining: limit }
    }

    /// Take one unit of budget; `false` once exhausted.
    fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            false
        } else {
            self.remaining -= 1;
            true
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

/// One node of a dependency tree.
///
/// A resource node (`producer: None`) carries one child per contributing
/// building; a producer-alternative node (`producer: Some(..)`) repeats the
/// resource and carries one child per validated input of that building, one
/// level deeper. All producer alternatives are represented, in stable
/// building order, so traces are reproducible.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyTree {
    pub resource: ResourceKey,
    pub status: NodeStatus,
    pub producer: Option<BuildingKey>,
    /// Units required per production cycle of the consuming building;
    /// 0 for the trace root.
    pub quantity: f64,
    pub depth: usize,
    pub children: Vec<DependencyTree>,
    /// True when this node or any descendant hit a depth/budget terminal.
    pub truncated: bool,
}

struct ArenaNode {
    resource: ResourceKey,
    status: NodeStatus,
    producer: Option<BuildingKey>,
    quantity: f64,
    depth: usize,
    children: Vec<usize>,
}

struct Frame {
    resource: ResourceKey,
    quantity: f64,
    depth: usize,
    ancestors: HashSet<ResourceKey>,
    parent: Option<usize>,
}

/// Trace with a fresh budget taken from `bounds.max_iterations`.
pub fn trace(
    graph: &ProductionGraph,
    target: &ResourceKey,
    bounds: &SafetyBounds,
) -> DependencyTree {
    let mut budget = TraceBudget::new(bounds.max_iterations);
    trace_with_budget(graph, target, bounds, &mut budget)
}

/// Trace the full production chain behind `target` back to raw materials.
///
/// Always returns a tree, possibly partial: cycle, depth, and budget
/// violations become terminal node statuses, never hard failures or
/// unbounded work. The cycle guard is per ancestor path — a resource may
/// legitimately reappear on a sibling branch.
pub fn trace_with_budget(
    graph: &ProductionGraph,
    target: &ResourceKey,
    bounds: &SafetyBounds,
    budget: &mut TraceBudget,
) -> DependencyTree {
    let mut arena: Vec<ArenaNode> = Vec::new();
    let mut stack = vec![Frame {
        resource: target.clone(),
        quantity: 0.0,
        depth: 0,
        ancestors: HashSet::new(),
        parent: None,
    }];

    while let Some(frame) = stack.pop() {
        let status = if frame.ancestors.contains(&frame.resource) {
            NodeStatus::CycleDetected
        } else if frame.depth >= bounds.max_depth {
            NodeStatus::MaxDepthReached
        } else if !budget.consume() {
            NodeStatus::BudgetExceeded
        } else if graph.producers(&frame.resource).is_empty() {
            NodeStatus::Raw
        } else {
            NodeStatus::Expanding
        };

        let index = arena.len();
        arena.push(ArenaNode {
            resource: frame.resource.clone(),
            status,
            producer: None,
            quantity: frame.quantity,
            depth: frame.depth,
            children: Vec::new(),
        });
        if let Some(parent) = frame.parent {
            arena[parent].children.push(index);
        }

        if status != NodeStatus::Expanding {
            continue;
        }

        let mut ancestors = frame.ancestors;
        ancestors.insert(frame.resource.clone());

        // One producer-alternative node per contributing building; its input
        // frames go on the stack in reverse so they pop in catalog order.
        for entry in graph.producers(&frame.resource) {
            let alt_index = arena.len();
            arena.push(ArenaNode {
                resource: frame.resource.clone(),
                status: NodeStatus::Expanding,
                producer: Some(entry.building.clone()),
                quantity: entry.output_quantity,
                depth: frame.depth,
                children: Vec::new(),
            });
            arena[index].children.push(alt_index);

            for input in entry.inputs.iter().rev() {
                stack.push(Frame {
                    resource: input.resource.clone(),
                    quantity: input.quantity,
                    depth: frame.depth + 1,
                    ancestors: ancestors.clone(),
                    parent: Some(alt_index),
                });
            }
        }
    }

    let tree = assemble(&arena, 0);
    if tree.truncated {
        warn!(resource = %target, remaining_budget = budget.remaining(), "trace truncated");
    }
    tree
}

// Arena indices to nested tree; recursion depth is bounded by the depth
// guard applied during expansion.
fn assemble(arena: &[ArenaNode], index: usize) -> DependencyTree {
    let node = &arena[index];
    let children: Vec<DependencyTree> = node
        .children
        .iter()
        .map(|&child| assemble(arena, child))
        .collect();
    let truncated = node.status.is_truncation() || children.iter().any(|c| c.truncated);
    DependencyTree {
        resource: node.resource.clone(),
        status: node.status,
        producer: node.producer.clone(),
        quantity: node.quantity,
        depth: node.depth,
        children,
        truncated,
    }
}

/// Render a tree in indented text form, one line per node.
pub fn format_tree(tree: &DependencyTree) -> String {
    let mut out = String::new();
    render(tree, 0, &mut out);
    out
}

fn render(node: &DependencyTree, indent: usize, out: &mut String) {
    let prefix = "  ".repeat(indent);
    match (&node.producer, node.status) {
        (Some(building), _) => {
            let _ = writeln!(
                out,
                "{}<- {} ({} {} per cycle)",
                prefix, building, node.quantity, node.resource.name
            );
        }
        (None, NodeStatus::Expanding) => {
            let _ = writeln!(out, "{}{}", prefix, node.resource);
        }
        (None, status) => {
            let _ = writeln!(out, "{}{} ({})", prefix, node.resource, status);
        }
    }
    for child in &node.children {
        render(child, indent + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Building, Catalog, Output, Resource, ResourceAmount};

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new(name, "Master")
    }

    fn converter(name: &str, input: &str, output: &str) -> Building {
        Building {
            key: BuildingKey::new(name, "Master"),
            tier: 2,
            inputs: vec![ResourceAmount::new(key(input), 2.0)],
            outputs: vec![Output::new(key(output), 1.0, Some(30.0))],
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
    fn resource_without_producers_is_single_raw_node() {
        let graph = graph_for(&["Stone"], Vec::new());
        let tree = trace(&graph, &key("Stone"), &SafetyBounds::default());
        assert_eq!(tree.status, NodeStatus::Raw);
        assert!(tree.children.is_empty());
        assert!(!tree.truncated);
    }

    #[test]
    fn chain_expands_to_raw_material() {
        let graph = graph_for(
            &["Wood", "Plank", "Furniture"],
            vec![
                converter("Sawmill", "Wood", "Plank"),
                converter("Workshop", "Plank", "Furniture"),
            ],
        );
        let tree = trace(&graph, &key("Furniture"), &SafetyBounds::default());

        assert_eq!(tree.status, NodeStatus::Expanding);
        assert!(!tree.truncated);
        // Furniture <- Workshop <- Plank <- Sawmill <- Wood (raw)
        let workshop = &tree.children[0];
        assert_eq!(workshop.producer.as_ref().unwrap().name, "Workshop");
        let plank = &workshop.children[0];
        assert_eq!(plank.resource, key("Plank"));
        assert_eq!(plank.quantity, 2.0);
        assert_eq!(plank.depth, 1);
        let wood = &plank.children[0].children[0];
        assert_eq!(wood.resource, key("Wood"));
        assert_eq!(wood.status, NodeStatus::Raw);
        assert_eq!(wood.depth, 2);
    }

    #[test]
    fn three_cycle_terminates_with_cycle_markers() {
        let graph = graph_for(
            &["A", "B", "C"],
            vec![
                converter("Make B", "A", "B"),
                converter("Make C", "B", "C"),
                converter("Make A", "C", "A"),
            ],
        );
        let tree = trace(&graph, &key("A"), &SafetyBounds::default());

        // A <- Make A <- C <- Make C <- B <- Make B <- A (cycle)
        let c = &tree.children[0].children[0];
        assert_eq!(c.resource, key("C"));
        let b = &c.children[0].children[0];
        assert_eq!(b.resource, key("B"));
        let a_again = &b.children[0].children[0];
        assert_eq!(a_again.resource, key("A"));
        assert_eq!(a_again.status, NodeStatus::CycleDetected);
        assert_eq!(a_again.depth, 3);
        assert!(a_again.children.is_empty());
        // A cycle alone is not a truncation.
        assert!(!tree.truncated);
    }

    #[test]
    fn sibling_branches_may_share_a_resource() {
        // Both inputs of the workshop expand down to Wood; only the ancestor
        // chain is guarded, so Wood appears on both branches.
        let resources = ["Wood", "Plank", "Glue", "Furniture"];
        let workshop = Building {
            key: BuildingKey::new("Workshop", "Master"),
            tier: 3,
            inputs: vec![
                ResourceAmount::new(key("Plank"), 4.0),
                ResourceAmount::new(key("Glue"), 1.0),
            ],
            outputs: vec![Output::new(key("Furniture"), 1.0, Some(60.0))],
            construction_cost: Vec::new(),
            maintenance_cost: Vec::new(),
        };
        let graph = graph_for(
            &resources,
            vec![
                workshop,
                converter("Sawmill", "Wood", "Plank"),
                converter("Glue Boiler", "Wood", "Glue"),
            ],
        );
        let tree = trace(&graph, &key("Furniture"), &SafetyBounds::default());

        let alt = &tree.children[0];
        assert_eq!(alt.children.len(), 2);
        for input in &alt.children {
            let wood = &input.children[0].children[0];
            assert_eq!(wood.resource, key("Wood"));
            assert_eq!(wood.status, NodeStatus::Raw);
        }
    }

    #[test]
    fn max_depth_truncates_at_boundary() {
        let graph = graph_for(
            &["R0", "R1", "R2", "R3", "R4", "R5"],
            vec![
                converter("Step 1", "R0", "R1"),
                converter("Step 2", "R1", "R2"),
                converter("Step 3", "R2", "R3"),
                converter("Step 4", "R3", "R4"),
                converter("Step 5", "R4", "R5"),
            ],
        );
        let bounds = SafetyBounds {
            max_depth: 2,
            ..SafetyBounds::default()
        };
        let tree = trace(&graph, &key("R5"), &bounds);

        assert!(tree.truncated);
        let r4 = &tree.children[0].children[0];
        assert_eq!(r4.depth, 1);
        assert_eq!(r4.status, NodeStatus::Expanding);
        let r3 = &r4.children[0].children[0];
        assert_eq!(r3.depth, 2);
        assert_eq!(r3.status, NodeStatus::MaxDepthReached);
        assert!(r3.children.is_empty());
    }

    #[test]
    fn exhausted_budget_marks_remaining_nodes() {
        let graph = graph_for(
            &["R0", "R1", "R2", "R3"],
            vec![
                converter("Step 1", "R0", "R1"),
                converter("Step 2", "R1", "R2"),
                converter("Step 3", "R2", "R3"),
            ],
        );
        let bounds = SafetyBounds {
            max_iterations: 2,
            ..SafetyBounds::default()
        };
        let tree = trace(&graph, &key("R3"), &bounds);

        assert!(tree.truncated);
        // Root and R2 consumed the budget; R1 hits the exhausted counter.
        let r1 = &tree.children[0].children[0].children[0].children[0];
        assert_eq!(r1.resource, key("R1"));
        assert_eq!(r1.status, NodeStatus::BudgetExceeded);
    }

    #[test]
    fn budget_is_shared_across_a_call_not_across_calls() {
        let graph = graph_for(&["Stone"], Vec::new());
        let bounds = SafetyBounds::default();
        let mut budget = TraceBudget::new(5);
        trace_with_budget(&graph, &key("Stone"), &bounds, &mut budget);
        assert_eq!(budget.remaining(), 4);
        // A fresh call gets a fresh budget.
        let tree = trace(&graph, &key("Stone"), &bounds);
        assert_eq!(tree.status, NodeStatus::Raw);
    }

    #[test]
    fn producer_alternatives_come_in_stable_order() {
        let graph = graph_for(
            &["Wood", "Coal"],
            vec![
                converter("Zeta Kiln", "Wood", "Coal"),
                converter("Alpha Kiln", "Wood", "Coal"),
            ],
        );
        let tree = trace(&graph, &key("Coal"), &SafetyBounds::default());
        let names: Vec<_> = tree
            .children
            .iter()
            .map(|alt| alt.producer.as_ref().unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["Alpha Kiln", "Zeta Kiln"]);
    }
}
