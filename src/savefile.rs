//! Save-game reader
//!
//! Extracts observed per-building counts from a Masterplan Tycoon save file
//! (`game_data_save0.json`). The counts calibrate the safety bounds: a
//! calculated requirement far above what a real play-through ever built is
//! suspect. Save node ConfigIDs look like `structure.master.mine.coal`; the
//! first segment after the prefix is the region, the remaining segments
//! reversed give the building name ("Coal Mine").

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SaveGame {
    #[serde(rename = "Nodes", default)]
    nodes: Vec<SaveNode>,
}

#[derive(Debug, Deserialize)]
struct SaveNode {
    #[serde(rename = "ConfigID")]
    config_id: String,
}

/// Observed building counts keyed by lowercased building name, ready for
/// [`crate::bounds::SafetyBounds::derive`].
pub fn observed_building_counts(path: &Path) -> Result<HashMap<String, u64>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading save file {}", path.display()))?;
    let save: SaveGame = serde_json::from_str(&raw)
        .with_context(|| format!("parsing save file {}", path.display()))?;

    let mut counts: HashMap<String, u64> = HashMap::new();
    for node in &save.nodes {
        if let Some(name) = building_name(&node.config_id) {
            *counts.entry(name.to_lowercase()).or_default() += 1;
        }
    }
    debug!(
        nodes = save.nodes.len(),
        building_types = counts.len(),
        "loaded observed counts from save file"
    );
    Ok(counts)
}

/// Building name from a save ConfigID, `None` for non-structure nodes.
fn building_name(config_id: &str) -> Option<String> {
    let rest = config_id.strip_prefix("structure.")?;
    let mut segments = rest.split('.');
    let _region = segments.next()?;
    let name_segments: Vec<&str> = segments.collect();
    if name_segments.is_empty() {
        return None;
    }
    let words: Vec<String> = name_segments.iter().rev().map(|s| capitalize(s)).collect();
    Some(words.join(" "))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_id_maps_to_building_name() {
        assert_eq!(
            building_name("structure.master.mine.coal").as_deref(),
            Some("Coal Mine")
        );
        assert_eq!(
            building_name("structure.master.well").as_deref(),
            Some("Well")
        );
    }

    #[test]
    fn non_structure_nodes_are_skipped() {
        assert_eq!(building_name("path.master.road"), None);
        assert_eq!(building_name("structure.master"), None);
    }

    #[test]
    fn counts_accumulate_per_building_type() {
        let dir = std::env::temp_dir().join("masterplan-analyzer-tests");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("save0.json");
        fs::write(
            &path,
            r#"{"Nodes": [
                {"ID": 1, "ConfigID": "structure.master.well"},
                {"ID": 2, "ConfigID": "structure.master.well"},
                {"ID": 3, "ConfigID": "structure.master.mine.coal"},
                {"ID": 4, "ConfigID": "path.master.road"}
            ]}"#,
        )
        .unwrap();

        let counts = observed_building_counts(&path).unwrap();
        assert_eq!(counts.get("well"), Some(&2));
        assert_eq!(counts.get("coal mine"), Some(&1));
        assert_eq!(counts.len(), 2);
    }
}
