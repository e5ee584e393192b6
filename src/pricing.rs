use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::cost::{PricingModel, PricingTable};

/// On-disk shape. Every field is optional so a partial document only
/// overrides what it names.
#[derive(Debug, Default, Deserialize)]
struct PricingDocument {
    baseline: Option<RawModel>,
    treated: Option<RawModel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawModel {
    input_cost_per_million: Option<f64>,
    output_cost_per_million: Option<f64>,
}

impl RawModel {
    fn resolve(&self, fallback: PricingModel) -> PricingModel {
        PricingModel {
            input_cost_per_million: self
                .input_cost_per_million
                .unwrap_or(fallback.input_cost_per_million),
            output_cost_per_million: self
                .output_cost_per_million
                .unwrap_or(fallback.output_cost_per_million),
        }
    }
}

pub fn parse_pricing(data: &str) -> serde_json::Result<PricingTable> {
    let doc: PricingDocument = serde_json::from_str(data)?;
    let defaults = PricingTable::default();
    Ok(PricingTable {
        baseline: doc
            .baseline
            .map_or(defaults.baseline, |m| m.resolve(defaults.baseline)),
        treated: doc
            .treated
            .map_or(defaults.treated, |m| m.resolve(defaults.treated)),
    })
}

/// Load the pricing table, falling back to the built-in rates when the file
/// is absent or cannot be decoded.
pub fn load_pricing(path: &Path) -> PricingTable {
    let Ok(data) = fs::read_to_string(path) else {
        debug!(path = %path.display(), "no pricing file, using defaults");
        return PricingTable::default();
    };

    match parse_pricing(&data) {
        Ok(table) => table,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "invalid pricing file, using defaults");
            PricingTable::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let table = load_pricing(&dir.path().join("pricing.json"));
        assert_eq!(table, PricingTable::default());
    }

    #[test]
    fn garbage_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricing.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_pricing(&path), PricingTable::default());
    }

    #[test]
    fn full_document_overrides_everything() {
        let table = parse_pricing(
            r#"{
                "baseline": {"inputCostPerMillion": 3.0, "outputCostPerMillion": 15.0},
                "treated": {"inputCostPerMillion": 0.3, "outputCostPerMillion": 1.2}
            }"#,
        )
        .unwrap();
        assert_eq!(table.baseline, PricingModel::new(3.0, 15.0));
        assert_eq!(table.treated, PricingModel::new(0.3, 1.2));
    }

    #[test]
    fn partial_document_keeps_unnamed_defaults() {
        let table = parse_pricing(r#"{"treated": {"outputCostPerMillion": 2.0}}"#).unwrap();
        assert_eq!(table.baseline, PricingModel::new(10.0, 5.0));
        assert_eq!(table.treated, PricingModel::new(1.5, 2.0));
    }
}
