use std::{fs, path::Path};

use super::feature::{AttributeValue, Feature, FeatureCollection};
use crate::{
    crs::projection::project_collection_to_wgs84,
    error::{IgtError, Result},
};

fn to_geojson_feature(feature: &Feature) -> geojson::Feature {
    let properties = feature.attributes.as_ref().map(|attributes| {
        attributes
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    AttributeValue::String(value) => serde_json::Value::String(value.clone()),
                    AttributeValue::Number(value) => serde_json::Value::from(*value),
                };
                (key.clone(), value)
            })
            .collect::<geojson::JsonObject>()
    });
    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&feature.geometry))),
        id: None,
        properties,
        foreign_members: None,
    }
}

/// Write a collection as a GeoJSON FeatureCollection. GeoJSON is always WGS84, so the collection is
/// reprojected first.
pub fn write_collection_to_geojson(collection: &FeatureCollection, output_filepath: &Path) -> Result<()> {
    let collection = project_collection_to_wgs84(collection)?;
    let feature_collection: geojson::FeatureCollection =
        collection.features.iter().map(to_geojson_feature).collect();
    let geojson_contents = geojson::GeoJson::from(feature_collection);
    log::info!(
        "Writing {} features to GeoJSON {:?}",
        collection.len(),
        output_filepath
    );
    fs::write(output_filepath, geojson_contents.to_string())
        .map_err(|err| IgtError::Store(format!("Could not write {:?}, {}", output_filepath, err)))
}

#[cfg(test)]
mod tests {
    use testdir::testdir;

    use crate::geofile::feature::{Feature, FeatureCollection};

    use super::write_collection_to_geojson;

    #[test]
    fn test_write_collection_to_geojson() {
        let collection = FeatureCollection::new_wgs84(vec![
            Feature::new_with_attributes(
                geo::Geometry::Polygon(geo::Rect::new((106.5, -6.4), (107.0, -6.1)).to_polygon()),
                [("source", "authoritative")],
            ),
            Feature::new_with_attributes(
                geo::Geometry::Point(geo::Point::new(106.7, -6.2)),
                [("area_ha", 20.0)],
            ),
        ])
        .unwrap();
        let output_filepath = testdir!().join("comparison.geojson");
        write_collection_to_geojson(&collection, &output_filepath).unwrap();

        let contents = std::fs::read_to_string(&output_filepath).unwrap();
        let geojson: geojson::GeoJson = contents.parse().unwrap();
        match geojson {
            geojson::GeoJson::FeatureCollection(feature_collection) => {
                assert_eq!(2, feature_collection.features.len());
                assert_eq!(
                    Some(&serde_json::Value::from("authoritative")),
                    feature_collection.features[0].property("source")
                );
                assert_eq!(
                    Some(&serde_json::Value::from(20.0)),
                    feature_collection.features[1].property("area_ha")
                );
            }
            other => panic!("Expected a FeatureCollection, got {:?}", other),
        }
    }
}
