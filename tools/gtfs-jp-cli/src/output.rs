use anyhow::{Context, Result};
use geojson::{FeatureCollection, GeoJson};
use serde::Serialize;
use std::path::Path;

/// Write a feature collection to a GeoJSON file
pub fn write_geojson(collection: &FeatureCollection, output_path: &Path) -> Result<()> {
    log::info!(
        "Writing {} features to {}",
        collection.features.len(),
        output_path.display()
    );

    let geojson = GeoJson::from(collection.clone());
    let json_string = serde_json::to_string_pretty(&geojson)
        .context("Failed to serialize GeoJSON")?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(output_path, json_string)
        .with_context(|| format!("Failed to write GeoJSON to {}", output_path.display()))?;

    Ok(())
}

/// Print a value to stdout as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json_string = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    println!("{}", json_string);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::{Feature, Geometry, Value};

    #[test]
    fn test_write_geojson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layers").join("stops.geojson");

        let collection = FeatureCollection {
            bbox: None,
            features: vec![Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![140.7266, 41.7737]))),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            foreign_members: None,
        };

        write_geojson(&collection, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        match text.parse::<GeoJson>().unwrap() {
            GeoJson::FeatureCollection(fc) => assert_eq!(fc.features.len(), 1),
            other => panic!("Expected FeatureCollection, got {other:?}"),
        }
    }
}
