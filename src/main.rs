//! Masterplan Tycoon Production Analyzer
//!
//! Builds a production dependency graph from the building/resource catalog,
//! traces chains back to raw materials, flags anomalies in the curated data,
//! and estimates building requirements under safety bounds.

mod anomaly;
mod bounds;
mod db;
mod error;
mod estimate;
mod graph;
mod models;
mod savefile;
mod trace;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use crate::anomaly::AnomalyConfig;
use crate::bounds::SafetyBounds;
use crate::graph::ProductionGraph;
use crate::models::{Building, BuildingKey, Output, ResourceAmount, ResourceKey};

#[derive(Parser)]
#[command(name = "masterplan-analyzer")]
#[command(about = "Production chain dependency analyzer for Masterplan Tycoon")]
struct Cli {
    /// Path to the SQLite catalog database
    #[arg(short, long, default_value = "masterplan_catalog.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace the full production chain behind a resource
    Trace {
        /// Target resource name (e.g. "Bread", "Steel")
        resource: String,

        /// Region the resource belongs to
        #[arg(short, long, default_value = "Master")]
        region: String,

        /// Maximum dependency depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Iteration budget for the whole trace
        #[arg(long)]
        max_iterations: Option<u64>,
    },

    /// Run the whole-graph anomaly report
    Analyze {
        /// Longest simple cycle to report
        #[arg(long)]
        max_cycle_len: Option<usize>,

        /// Input:output ratio above which an edge is flagged
        #[arg(long)]
        ratio_threshold: Option<f64>,
    },

    /// Estimate building counts for target production rates
    Estimate {
        /// Targets as Resource=rate_per_minute (e.g. "Bread=19")
        targets: Vec<String>,

        /// Region the target resources belong to
        #[arg(short, long, default_value = "Master")]
        region: String,

        /// Save file providing observed building counts for the bounds
        #[arg(long)]
        save_file: Option<PathBuf>,
    },

    /// List all buildings in the catalog
    ListBuildings,

    /// List all resources, marking producible ones
    ListResources,

    /// Initialize empty database with schema
    Init,

    /// Load a small sample catalog for testing
    LoadSample,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Trace {
            resource,
            region,
            max_depth,
            max_iterations,
        } => {
            let catalog = db::load_catalog(&conn)?;
            let (graph, warnings) = ProductionGraph::build(&catalog);
            print_warnings(&warnings);

            let mut bounds = SafetyBounds::default();
            if let Some(depth) = max_depth {
                bounds.max_depth = depth;
            }
            if let Some(iterations) = max_iterations {
                bounds.max_iterations = iterations;
            }

            let target = ResourceKey::new(resource, region);
            let tree = trace::trace(&graph, &target, &bounds);
            println!("=== Dependency tree for {} ===", target);
            print!("{}", trace::format_tree(&tree));
            if tree.truncated {
                println!("(truncated: depth or iteration bound hit)");
            }
        }

        Commands::Analyze {
            max_cycle_len,
            ratio_threshold,
        } => {
            let catalog = db::load_catalog(&conn)?;
            let (graph, warnings) = ProductionGraph::build(&catalog);
            print_warnings(&warnings);

            let mut config = AnomalyConfig::default();
            if let Some(len) = max_cycle_len {
                config.max_cycle_len = len;
            }
            if let Some(threshold) = ratio_threshold {
                config.ratio_threshold = threshold;
            }

            println!(
                "Graph: {} resources, {} buildings, {} production edges",
                catalog.resource_count(),
                catalog.building_count(),
                graph.edge_count()
            );
            let report = anomaly::analyze(&catalog, &graph, &config);
            print!("{}", report);
            if report.is_clean() {
                println!("No anomalies found.");
            }
        }

        Commands::Estimate {
            targets,
            region,
            save_file,
        } => {
            if targets.is_empty() {
                bail!("no targets given; expected Resource=rate pairs");
            }
            let catalog = db::load_catalog(&conn)?;
            let (graph, warnings) = ProductionGraph::build(&catalog);
            print_warnings(&warnings);

            let observed = match save_file {
                Some(path) => Some(savefile::observed_building_counts(&path)?),
                None => None,
            };
            let bounds = SafetyBounds::derive(observed, SafetyBounds::default());

            let targets = parse_targets(&targets, &region)?;
            let estimate = estimate::estimate(&graph, &targets, &bounds);
            print!("{}", estimate);
        }

        Commands::ListBuildings => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.building_count() == 0 {
                println!("No buildings in catalog. Run 'load-sample' or import data first.");
            } else {
                println!("{:<30} {:<10} {:>4} {:>7} {:>8}", "Building", "Region", "Tier", "Inputs", "Outputs");
                println!("{}", "-".repeat(62));
                for b in catalog.buildings() {
                    println!(
                        "{:<30} {:<10} {:>4} {:>7} {:>8}",
                        b.key.name,
                        b.key.region,
                        b.tier,
                        b.inputs.len(),
                        b.outputs.len()
                    );
                }
            }
        }

        Commands::ListResources => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.resource_count() == 0 {
                println!("No resources in catalog. Run 'load-sample' or import data first.");
            } else {
                let (graph, _) = ProductionGraph::build(&catalog);
                for r in catalog.resources() {
                    let marker = if graph.is_producible(&r.key) {
                        "producible"
                    } else {
                        "raw"
                    };
                    println!("  {:<40} {}", r.key.to_string(), marker);
                }
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample catalog loaded successfully!");
        }
    }

    Ok(())
}

fn print_warnings(warnings: &[graph::ValidationWarning]) {
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
}

/// Parse "Resource=rate" pairs into a target map.
fn parse_targets(raw: &[String], region: &str) -> Result<BTreeMap<ResourceKey, f64>> {
    let mut targets = BTreeMap::new();
    for pair in raw {
        let Some((name, rate)) = pair.split_once('=') else {
            bail!("invalid target '{pair}'; expected Resource=rate");
        };
        let rate: f64 = rate
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid rate in '{pair}'"))?;
        if rate <= 0.0 {
            bail!("rate must be positive in '{pair}'");
        }
        targets.insert(ResourceKey::new(name.trim(), region), rate);
    }
    Ok(targets)
}

/// Load a small Masterplan-style sample catalog for testing without a real
/// data import.
fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_data(conn)?;

    let region = "Master";
    let resources = [
        "Wood", "Plank", "Coal", "Iron Ore", "Steel", "Water", "Wheat", "Flour", "Bread", "Fish",
    ];
    for name in resources {
        db::upsert_resource(conn, &ResourceKey::new(name, region))?;
    }

    let key = |name: &str| ResourceKey::new(name, region);
    let buildings = [
        Building {
            key: BuildingKey::new("Lumberjack", region),
            tier: 1,
            inputs: vec![],
            outputs: vec![Output::new(key("Wood"), 1.0, Some(20.0))],
            construction_cost: vec![],
            maintenance_cost: vec![ResourceAmount::new(key("Fish"), 1.0)],
        },
        Building {
            key: BuildingKey::new("Sawmill", region),
            tier: 2,
            inputs: vec![ResourceAmount::new(key("Wood"), 2.0)],
            outputs: vec![Output::new(key("Plank"), 1.0, Some(30.0))],
            construction_cost: vec![ResourceAmount::new(key("Wood"), 20.0)],
            maintenance_cost: vec![ResourceAmount::new(key("Fish"), 1.0)],
        },
        Building {
            key: BuildingKey::new("Coal Mine", region),
            tier: 1,
            inputs: vec![ResourceAmount::new(key("Plank"), 1.0)],
            outputs: vec![Output::new(key("Coal"), 2.0, Some(40.0))],
            construction_cost: vec![ResourceAmount::new(key("Plank"), 10.0)],
            maintenance_cost: vec![ResourceAmount::new(key("Bread"), 1.0)],
        },
        Building {
            key: BuildingKey::new("Iron Mine", region),
            tier: 1,
            inputs: vec![ResourceAmount::new(key("Plank"), 1.0)],
            outputs: vec![Output::new(key("Iron Ore"), 1.0, Some(40.0))],
            construction_cost: vec![ResourceAmount::new(key("Plank"), 10.0)],
            maintenance_cost: vec![ResourceAmount::new(key("Bread"), 1.0)],
        },
        Building {
            key: BuildingKey::new("Smelter", region),
            tier: 3,
            inputs: vec![
                ResourceAmount::new(key("Iron Ore"), 2.0),
                ResourceAmount::new(key("Coal"), 1.0),
            ],
            outputs: vec![Output::new(key("Steel"), 1.0, Some(60.0))],
            construction_cost: vec![ResourceAmount::new(key("Plank"), 25.0)],
            maintenance_cost: vec![ResourceAmount::new(key("Bread"), 2.0)],
        },
        Building {
            key: BuildingKey::new("Well", region),
            tier: 1,
            inputs: vec![],
            outputs: vec![Output::new(key("Water"), 1.0, Some(10.0))],
            construction_cost: vec![ResourceAmount::new(key("Plank"), 5.0)],
            maintenance_cost: vec![],
        },
        Building {
            key: BuildingKey::new("Wheat Farm", region),
            tier: 2,
            inputs: vec![ResourceAmount::new(key("Water"), 2.0)],
            outputs: vec![Output::new(key("Wheat"), 3.0, Some(90.0))],
            construction_cost: vec![ResourceAmount::new(key("Plank"), 15.0)],
            maintenance_cost: vec![ResourceAmount::new(key("Water"), 1.0)],
        },
        Building {
            key: BuildingKey::new("Mill", region),
            tier: 2,
            inputs: vec![ResourceAmount::new(key("Wheat"), 2.0)],
            outputs: vec![Output::new(key("Flour"), 1.0, Some(30.0))],
            construction_cost: vec![ResourceAmount::new(key("Plank"), 15.0)],
            maintenance_cost: vec![],
        },
        Building {
            key: BuildingKey::new("Bakery", region),
            tier: 3,
            inputs: vec![
                ResourceAmount::new(key("Flour"), 1.0),
                ResourceAmount::new(key("Water"), 1.0),
                ResourceAmount::new(key("Coal"), 1.0),
            ],
            outputs: vec![Output::new(key("Bread"), 2.0, Some(45.0))],
            construction_cost: vec![ResourceAmount::new(key("Plank"), 20.0)],
            maintenance_cost: vec![ResourceAmount::new(key("Water"), 1.0)],
        },
        Building {
            key: BuildingKey::new("Fishery", region),
            tier: 1,
            inputs: vec![],
            outputs: vec![Output::new(key("Fish"), 1.0, Some(25.0))],
            construction_cost: vec![ResourceAmount::new(key("Wood"), 10.0)],
            maintenance_cost: vec![ResourceAmount::new(key("Bread"), 1.0)],
        },
    ];

    for building in &buildings {
        let id = db::upsert_building(conn, &building.key, building.tier)?;
        for input in &building.inputs {
            db::insert_input(conn, id, input)?;
        }
        for output in &building.outputs {
            db::insert_output(conn, id, output)?;
        }
        for cost in &building.construction_cost {
            db::insert_cost(conn, id, cost, "construction")?;
        }
        for cost in &building.maintenance_cost {
            db::insert_cost(conn, id, cost, "maintenance")?;
        }
    }

    println!("Loaded {} sample buildings", buildings.len());
    Ok(())
}

// Keep the sample catalog loadable end to end.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_catalog_loads_and_traces() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        load_sample_data(&conn).unwrap();

        let catalog = db::load_catalog(&conn).unwrap();
        let (graph, warnings) = ProductionGraph::build(&catalog);
        assert!(warnings.is_empty());

        let bread = ResourceKey::new("Bread", "Master");
        let tree = trace::trace(&graph, &bread, &SafetyBounds::default());
        assert_eq!(tree.status, trace::NodeStatus::Expanding);
        assert!(!tree.truncated);

        let report = anomaly::analyze(&catalog, &graph, &AnomalyConfig::default());
        assert!(report.cycles.is_empty());
        assert!(report.isolated_resources.is_empty());
    }

    #[test]
    fn parse_targets_accepts_pairs_and_rejects_garbage() {
        let parsed = parse_targets(&["Bread=19".into(), "Steel=10".into()], "Master").unwrap();
        assert_eq!(parsed[&ResourceKey::new("Bread", "Master")], 19.0);
        assert!(parse_targets(&["Bread".into()], "Master").is_err());
        assert!(parse_targets(&["Bread=-1".into()], "Master").is_err());
    }
}
