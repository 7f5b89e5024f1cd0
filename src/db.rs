//! Catalog database schema and operations
//!
//! SQLite-backed store for the hand-curated building/resource catalog. The
//! analyzer core never touches SQL: [`load_catalog`] reads everything into
//! one immutable [`Catalog`] snapshot up front, and all analysis runs on
//! that. Recipe relations reference resources by (name, region) pair rather
//! than foreign key, because the curated data is allowed to dangle — the
//! graph builder reports those as validation warnings.

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::models::{
    Building, BuildingKey, Catalog, Output, Resource, ResourceAmount, ResourceKey,
};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Resources, scoped per region (map)
        CREATE TABLE IF NOT EXISTS resources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            region TEXT NOT NULL,
            UNIQUE (name, region)
        );

        -- Building definitions
        CREATE TABLE IF NOT EXISTS buildings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            region TEXT NOT NULL,
            tier INTEGER NOT NULL DEFAULT 1,
            UNIQUE (name, region)
        );

        -- Production inputs (what a building consumes per cycle)
        CREATE TABLE IF NOT EXISTS building_inputs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            building_id INTEGER NOT NULL,
            resource TEXT NOT NULL,
            region TEXT NOT NULL,
            quantity REAL NOT NULL
        );

        -- Production outputs (what a building produces per cycle)
        CREATE TABLE IF NOT EXISTS building_outputs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            building_id INTEGER NOT NULL,
            resource TEXT NOT NULL,
            region TEXT NOT NULL,
            quantity REAL NOT NULL,
            cycle_time_seconds REAL
        );

        -- One-off construction and recurring maintenance costs
        CREATE TABLE IF NOT EXISTS building_costs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            building_id INTEGER NOT NULL,
            resource TEXT NOT NULL,
            region TEXT NOT NULL,
            quantity REAL NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('construction', 'maintenance'))
        );

        CREATE INDEX IF NOT EXISTS idx_building_inputs_building ON building_inputs(building_id);
        CREATE INDEX IF NOT EXISTS idx_building_outputs_building ON building_outputs(building_id);
        CREATE INDEX IF NOT EXISTS idx_building_costs_building ON building_costs(building_id);
        "#,
    )?;
    Ok(())
}

/// Clear all catalog data (for re-import)
pub fn clear_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM building_costs;
        DELETE FROM building_outputs;
        DELETE FROM building_inputs;
        DELETE FROM buildings;
        DELETE FROM resources;
        "#,
    )?;
    Ok(())
}

/// Insert or replace a resource
pub fn upsert_resource(conn: &Connection, key: &ResourceKey) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO resources (name, region) VALUES (?1, ?2)",
        (&key.name, &key.region),
    )?;
    Ok(())
}

/// Insert or replace a building row; returns its rowid for relation inserts.
pub fn upsert_building(conn: &Connection, key: &BuildingKey, tier: i64) -> Result<i64> {
    conn.execute(
        "INSERT OR REPLACE INTO buildings (name, region, tier) VALUES (?1, ?2, ?3)",
        (&key.name, &key.region, tier),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_input(conn: &Connection, building_id: i64, amount: &ResourceAmount) -> Result<()> {
    conn.execute(
        "INSERT INTO building_inputs (building_id, resource, region, quantity)
         VALUES (?1, ?2, ?3, ?4)",
        (
            building_id,
            &amount.resource.name,
            &amount.resource.region,
            amount.quantity,
        ),
    )?;
    Ok(())
}

pub fn insert_output(conn: &Connection, building_id: i64, output: &Output) -> Result<()> {
    conn.execute(
        "INSERT INTO building_outputs (building_id, resource, region, quantity, cycle_time_seconds)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            building_id,
            &output.resource.name,
            &output.resource.region,
            output.quantity,
            output.cycle_time_secs,
        ),
    )?;
    Ok(())
}

pub fn insert_cost(
    conn: &Connection,
    building_id: i64,
    amount: &ResourceAmount,
    kind: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO building_costs (building_id, resource, region, quantity, kind)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            building_id,
            &amount.resource.name,
            &amount.resource.region,
            amount.quantity,
            kind,
        ),
    )?;
    Ok(())
}

/// Load the full catalog into an immutable in-memory snapshot.
///
/// Fails fast on a structurally invalid snapshot (duplicate identities,
/// negative quantities); dangling recipe references load fine and surface
/// later as graph validation warnings.
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut stmt = conn.prepare("SELECT name, region FROM resources ORDER BY region, name")?;
    let resources: Vec<Resource> = stmt
        .query_map([], |row| {
            Ok(Resource {
                key: ResourceKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    let mut stmt =
        conn.prepare("SELECT id, name, region, tier FROM buildings ORDER BY region, name")?;
    let rows: Vec<(i64, BuildingKey, i64)> = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                BuildingKey::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<_>>()?;

    let mut buildings = Vec::with_capacity(rows.len());
    for (id, key, tier) in rows {
        buildings.push(Building {
            key,
            tier,
            inputs: load_amounts(conn, "building_inputs", id, None)?,
            outputs: load_outputs(conn, id)?,
            construction_cost: load_amounts(conn, "building_costs", id, Some("construction"))?,
            maintenance_cost: load_amounts(conn, "building_costs", id, Some("maintenance"))?,
        });
    }

    Catalog::new(resources, buildings).context("catalog snapshot is structurally invalid")
}

fn load_amounts(
    conn: &Connection,
    table: &str,
    building_id: i64,
    kind: Option<&str>,
) -> Result<Vec<ResourceAmount>> {
    let sql = match kind {
        Some(_) => format!(
            "SELECT resource, region, quantity FROM {table} WHERE building_id = ?1 AND kind = ?2 ORDER BY id"
        ),
        None => format!(
            "SELECT resource, region, quantity FROM {table} WHERE building_id = ?1 ORDER BY id"
        ),
    };
    let mut stmt = conn.prepare(&sql)?;
    let map_row = |row: &rusqlite::Row<'_>| {
        Ok(ResourceAmount::new(
            ResourceKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
            row.get::<_, f64>(2)?,
        ))
    };
    let amounts = match kind {
        Some(kind) => stmt
            .query_map((building_id, kind), map_row)?
            .collect::<rusqlite::Result<_>>()?,
        None => stmt
            .query_map([building_id], map_row)?
            .collect::<rusqlite::Result<_>>()?,
    };
    Ok(amounts)
}

fn load_outputs(conn: &Connection, building_id: i64) -> Result<Vec<Output>> {
    let mut stmt = conn.prepare(
        "SELECT resource, region, quantity, cycle_time_seconds
         FROM building_outputs WHERE building_id = ?1 ORDER BY id",
    )?;
    let outputs = stmt
        .query_map([building_id], |row| {
            Ok(Output::new(
                ResourceKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                row.get::<_, f64>(2)?,
                row.get::<_, Option<f64>>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<_>>()?;
    Ok(outputs)
}
