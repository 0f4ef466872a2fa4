use gdal::vector::LayerAccess;
use indicatif::ProgressBar;
use std::{collections::BTreeMap, path::Path};

use super::feature::{AttributeValue, Feature, FeatureCollection, FeatureMap};
use crate::{
    crs::{crs_utils::epsg_4326, projection::project_collection_to_wgs84},
    error::{IgtError, Result},
};

pub enum GdalDriverType {
    GeoPackage,
    GeoJson,
    PostgreSql,
}

impl GdalDriverType {
    pub fn name(&self) -> &'static str {
        match self {
            GdalDriverType::GeoPackage => "GPKG",
            GdalDriverType::GeoJson => "GeoJSON",
            GdalDriverType::PostgreSql => "PostgreSQL",
        }
    }
}

fn read_error(filepath: &Path) -> impl Fn(gdal::errors::GdalError) -> IgtError + '_ {
    move |err| IgtError::Read(format!("{:?}: {}", filepath, err))
}

fn store_error(err: gdal::errors::GdalError) -> IgtError {
    IgtError::Store(err.to_string())
}

pub fn open_vector_dataset(name: &str, update: bool) -> gdal::errors::Result<gdal::Dataset> {
    gdal::DriverManager::register_all();
    let mut open_options = gdal::DatasetOptions::default();
    open_options.open_flags = if update {
        gdal::GdalOpenFlags::GDAL_OF_VECTOR | gdal::GdalOpenFlags::GDAL_OF_UPDATE
    } else {
        gdal::GdalOpenFlags::GDAL_OF_VECTOR
    };
    gdal::Dataset::open_ex(name, open_options)
}

/// Read all features of a vector file. `layer_name` selects a layer in multi-layer containers such as
/// GeoPackage; without it the file must hold exactly one layer.
pub fn read_features_from_geofile(
    filepath: &Path,
    layer_name: Option<&str>,
) -> Result<FeatureCollection> {
    if !filepath.exists() {
        return Err(IgtError::Read(format!("File {:?} not found", filepath)));
    }
    let dataset = open_vector_dataset(&filepath.to_string_lossy(), false)
        .map_err(read_error(filepath))?;

    let mut layer = match layer_name {
        Some(layer_name) => dataset.layer_by_name(layer_name).map_err(|err| {
            IgtError::Read(format!(
                "Layer '{}' not found in {:?}. {}",
                layer_name, filepath, err
            ))
        })?,
        None => {
            let layer_count = dataset.layer_count();
            if 1 != layer_count {
                return Err(IgtError::Read(format!(
                    "Found {} layers in {:?}, a layer name is required unless there is exactly one.",
                    layer_count, filepath
                )));
            }
            dataset.layer(0).map_err(read_error(filepath))?
        }
    };
    read_features_from_layer(&mut layer)
}

/// Like `read_features_from_geofile`, reprojected to WGS84 longitude/latitude.
pub fn load_geofile_wgs84(filepath: &Path, layer_name: Option<&str>) -> Result<FeatureCollection> {
    let collection = read_features_from_geofile(filepath, layer_name)?;
    log::info!("Read {} features from {:?}", collection.len(), filepath);
    project_collection_to_wgs84(&collection)
}

pub(crate) fn read_features_from_layer(layer: &mut gdal::vector::Layer) -> Result<FeatureCollection> {
    let spatial_ref = match layer.spatial_ref() {
        Some(mut spatial_ref) => {
            if let Err(err) = spatial_ref.auto_identify_epsg() {
                log::debug!("Could not identify EPSG code of layer CRS, {}", err);
            }
            spatial_ref
        }
        None => {
            log::warn!("Layer '{}' has no CRS, assuming WGS84", layer.name());
            epsg_4326()?
        }
    };

    let mut features = Vec::new();
    for gdal_feature in layer.features() {
        let geometry = gdal_feature
            .geometry_by_index(0)
            .and_then(|geometry| geometry.to_geo())
            .map_err(|err| {
                IgtError::Read(format!(
                    "Malformed geometry for feature {:?}, {}",
                    gdal_feature.fid(),
                    err
                ))
            })?;
        let mut attributes = FeatureMap::new();
        for (name, value) in gdal_feature.fields() {
            let value = match value {
                Some(gdal::vector::FieldValue::IntegerValue(value)) => {
                    AttributeValue::Number(value as f64)
                }
                Some(gdal::vector::FieldValue::Integer64Value(value)) => {
                    AttributeValue::Number(value as f64)
                }
                Some(gdal::vector::FieldValue::RealValue(value)) => AttributeValue::Number(value),
                Some(gdal::vector::FieldValue::StringValue(value)) => AttributeValue::String(value),
                Some(other) => match other.into_string() {
                    Some(value) => AttributeValue::String(value),
                    None => continue,
                },
                None => continue,
            };
            attributes.insert(name, value);
        }
        features.push(Feature {
            geometry,
            attributes: Some(attributes),
        });
    }
    Ok(FeatureCollection::new(features, spatial_ref))
}

/// Write a collection as a single layer of a new dataset.
pub fn write_features_to_geofile(
    collection: &FeatureCollection,
    output_filepath: &Path,
    driver: &str,
) -> Result<()> {
    gdal::DriverManager::register_all();
    let driver = gdal::DriverManager::get_driver_by_name(driver).map_err(store_error)?;
    let mut dataset = driver
        .create_vector_only(output_filepath)
        .map_err(store_error)?;
    let layer_name = output_filepath
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    write_in_transaction(&mut dataset, |dataset| {
        create_layer_with_features(dataset, &layer_name, collection, None)
    })
}

/// Run `write` inside a dataset transaction when the driver supports one, e.g. GeoPackage or
/// PostgreSQL. Everything `write` did is rolled back when it fails.
pub(crate) fn write_in_transaction<T>(
    dataset: &mut gdal::Dataset,
    write: impl FnOnce(&mut gdal::Dataset) -> Result<T>,
) -> Result<T> {
    let started = unsafe { gdal_sys::GDALDatasetStartTransaction(dataset.c_dataset(), 0) }
        == gdal_sys::OGRErr::OGRERR_NONE;
    if !started {
        log::debug!("Driver has no transactions, writing without one");
        return write(dataset);
    }
    match write(dataset) {
        Ok(value) => {
            let committed = unsafe { gdal_sys::GDALDatasetCommitTransaction(dataset.c_dataset()) };
            if committed != gdal_sys::OGRErr::OGRERR_NONE {
                return Err(IgtError::Store(format!(
                    "Could not commit transaction, OGR error {}",
                    committed
                )));
            }
            Ok(value)
        }
        Err(err) => {
            log::warn!("Rolling back transaction, {}", err);
            unsafe { gdal_sys::GDALDatasetRollbackTransaction(dataset.c_dataset()) };
            Err(err)
        }
    }
}

pub(crate) fn geometry_type(
    features: &[Feature],
) -> gdal::vector::OGRwkbGeometryType::Type {
    use gdal::vector::OGRwkbGeometryType::*;
    let types: Vec<gdal::vector::OGRwkbGeometryType::Type> = features
        .iter()
        .map(|feature| match &feature.geometry {
            geo::Geometry::Point(_) => wkbPoint,
            geo::Geometry::Line(_) | geo::Geometry::LineString(_) => wkbLineString,
            geo::Geometry::Polygon(_) | geo::Geometry::Rect(_) | geo::Geometry::Triangle(_) => {
                wkbPolygon
            }
            geo::Geometry::MultiPoint(_) => wkbMultiPoint,
            geo::Geometry::MultiLineString(_) => wkbMultiLineString,
            geo::Geometry::MultiPolygon(_) => wkbMultiPolygon,
            geo::Geometry::GeometryCollection(_) => wkbGeometryCollection,
        })
        .collect();
    match types.first() {
        Some(first) if types.iter().all(|ty| ty == first) => *first,
        _ => wkbUnknown,
    }
}

/// Field definitions covering the attributes of all features, sorted by name. A field is real when
/// every value is a number, string otherwise.
pub(crate) fn get_field_definitions(
    features: &[Feature],
) -> Vec<(String, gdal::vector::OGRFieldType::Type)> {
    let mut numeric_by_name: BTreeMap<String, bool> = BTreeMap::new();
    for attributes in features.iter().filter_map(|feature| feature.attributes.as_ref()) {
        for (name, value) in attributes {
            let is_number = matches!(value, AttributeValue::Number(_));
            numeric_by_name
                .entry(name.clone())
                .and_modify(|numeric| *numeric &= is_number)
                .or_insert(is_number);
        }
    }
    numeric_by_name
        .into_iter()
        .map(|(name, numeric)| {
            let field_type = if numeric {
                gdal::vector::OGRFieldType::OFTReal
            } else {
                gdal::vector::OGRFieldType::OFTString
            };
            (name, field_type)
        })
        .collect()
}

pub(crate) fn create_layer_with_features(
    dataset: &mut gdal::Dataset,
    layer_name: &str,
    collection: &FeatureCollection,
    options: Option<&[&str]>,
) -> Result<()> {
    let crs_name = collection.spatial_ref.name().map_err(store_error)?;
    log::debug!("Using spatial ref {} for layer {}", crs_name, layer_name);

    let layer_options = gdal::LayerOptions {
        name: layer_name,
        srs: Some(&collection.spatial_ref),
        ty: geometry_type(&collection.features),
        options,
    };
    let mut layer = dataset.create_layer(layer_options).map_err(store_error)?;

    let field_definitions = get_field_definitions(&collection.features);
    let field_definitions: Vec<(&str, gdal::vector::OGRFieldType::Type)> = field_definitions
        .iter()
        .map(|(field_name, field_type)| (field_name.as_str(), *field_type))
        .collect();
    layer
        .create_defn_fields(&field_definitions)
        .map_err(store_error)?;
    write_features_to_layer(&mut layer, &collection.features)
}

fn normalize_for_wkb(geometry: &geo::Geometry) -> geo::Geometry {
    match geometry {
        geo::Geometry::Line(line) => {
            geo::Geometry::LineString(geo::LineString::from(vec![line.start, line.end]))
        }
        geo::Geometry::Rect(rect) => geo::Geometry::Polygon(rect.to_polygon()),
        geo::Geometry::Triangle(triangle) => geo::Geometry::Polygon(triangle.to_polygon()),
        other => other.clone(),
    }
}

/// Write features to an existing layer. Callers wrap this in `write_in_transaction`, committing all
/// features at once is much faster than per-feature commits on GeoPackage and PostgreSQL.
pub(crate) fn write_features_to_layer(
    layer: &mut gdal::vector::Layer,
    features: &[Feature],
) -> Result<()> {
    log::info!("Writing {} features to layer {}", features.len(), layer.name());
    let bar = ProgressBar::new(features.len() as u64);
    let outcome = features.iter().try_for_each(|feature| {
        let wkb = wkb::geom_to_wkb(&normalize_for_wkb(&feature.geometry))
            .map_err(|err| IgtError::Store(format!("Could not write geometry to WKB, {:?}", err)))?;
        let geometry = gdal::vector::Geometry::from_wkb(&wkb).map_err(store_error)?;

        match &feature.attributes {
            Some(attributes) => {
                let mut field_names = Vec::new();
                let mut values = Vec::new();
                for (key, value) in attributes {
                    field_names.push(key.as_str());
                    values.push(match value {
                        AttributeValue::String(value) => {
                            gdal::vector::FieldValue::StringValue(value.to_owned())
                        }
                        AttributeValue::Number(value) => gdal::vector::FieldValue::RealValue(*value),
                    });
                }
                layer
                    .create_feature_fields(geometry, &field_names, &values)
                    .map_err(store_error)?;
            }
            None => layer.create_feature(geometry).map_err(store_error)?,
        }
        bar.inc(1);
        Ok(())
    });
    bar.finish_and_clear();
    outcome
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rstest::rstest;
    use testdir::testdir;

    use crate::{
        crs::crs_utils::{epsg_4326, epsg_code, spatial_ref_from_epsg},
        error::IgtError,
        geofile::{
            feature::{AttributeValue, Feature, FeatureCollection},
            gdal_geofile::{
                load_geofile_wgs84, read_features_from_geofile, write_features_to_geofile,
                GdalDriverType,
            },
        },
    };

    use super::{geometry_type, get_field_definitions};

    fn sample_collection() -> FeatureCollection {
        FeatureCollection::new(
            vec![
                Feature::new_with_attributes(
                    geo::Geometry::Point(geo::Point::new(106.8, -6.2)),
                    [
                        ("landuse_type", AttributeValue::from("Urban")),
                        ("area_ha", AttributeValue::from(20.0)),
                    ],
                ),
                Feature::new_with_attributes(
                    geo::Geometry::Point(geo::Point::new(107.5, -6.9)),
                    [
                        ("landuse_type", AttributeValue::from("Forest")),
                        ("area_ha", AttributeValue::from(512.5)),
                    ],
                ),
            ],
            epsg_4326().unwrap(),
        )
    }

    #[rstest]
    #[case(GdalDriverType::GeoPackage, "land_use.gpkg")]
    #[case(GdalDriverType::GeoJson, "land_use.geojson")]
    fn test_geofile_write_read_round_trip(#[case] driver: GdalDriverType, #[case] filename: &str) {
        let collection = sample_collection();
        let test_dir = testdir!();
        let geofile_filepath = test_dir.join(filename);

        write_features_to_geofile(&collection, &geofile_filepath, driver.name()).unwrap();
        let read_back = read_features_from_geofile(&geofile_filepath, None).unwrap();

        assert_eq!(collection.len(), read_back.len());
        assert_eq!(Some(4326), epsg_code(&read_back.spatial_ref));
        for (expected, actual) in collection.features.iter().zip(read_back.features.iter()) {
            assert_eq!(expected.geometry, actual.geometry);
            assert_eq!(expected.attribute("landuse_type"), actual.attribute("landuse_type"));
            assert_abs_diff_eq!(
                expected.attribute("area_ha").and_then(AttributeValue::as_f64).unwrap(),
                actual.attribute("area_ha").and_then(AttributeValue::as_f64).unwrap(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_read_missing_file_is_read_error() {
        let test_dir = testdir!();
        let result = read_features_from_geofile(&test_dir.join("missing.shp"), None);
        assert!(matches!(result, Err(IgtError::Read(_))));
    }

    #[test]
    fn test_read_missing_layer_is_read_error() {
        let test_dir = testdir!();
        let geofile_filepath = test_dir.join("provinces.gpkg");
        write_features_to_geofile(&sample_collection(), &geofile_filepath, GdalDriverType::GeoPackage.name())
            .unwrap();

        let result = read_features_from_geofile(&geofile_filepath, Some("KABUPATEN"));
        assert!(matches!(result, Err(IgtError::Read(_))));
        let by_name = read_features_from_geofile(&geofile_filepath, Some("provinces")).unwrap();
        assert_eq!(2, by_name.len());
    }

    #[test]
    fn test_load_geofile_wgs84_reprojects() {
        let test_dir = testdir!();
        let geofile_filepath = test_dir.join("utm.gpkg");
        let utm_collection = FeatureCollection::new(
            vec![Feature::from(geo::Geometry::Point(geo::Point::new(688_000.0, 9_314_000.0)))],
            spatial_ref_from_epsg(32748).unwrap(),
        );
        write_features_to_geofile(&utm_collection, &geofile_filepath, GdalDriverType::GeoPackage.name())
            .unwrap();

        let collection = load_geofile_wgs84(&geofile_filepath, None).unwrap();
        assert_eq!(Some(4326), epsg_code(&collection.spatial_ref));
        match &collection.features[0].geometry {
            geo::Geometry::Point(point) => {
                assert!((106.0..108.0).contains(&point.x()), "lon {}", point.x());
                assert!((-7.0..-6.0).contains(&point.y()), "lat {}", point.y());
            }
            other => panic!("Unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_field_definitions_and_geometry_type() {
        let mut features = sample_collection().features;
        let definitions = get_field_definitions(&features);
        assert_eq!(
            vec![
                ("area_ha".to_string(), gdal::vector::OGRFieldType::OFTReal),
                ("landuse_type".to_string(), gdal::vector::OGRFieldType::OFTString),
            ],
            definitions
        );
        assert_eq!(gdal::vector::OGRwkbGeometryType::wkbPoint, geometry_type(&features));

        features.push(Feature::from(geo::Geometry::Polygon(
            geo::Rect::new((0.0, 0.0), (1.0, 1.0)).to_polygon(),
        )));
        assert_eq!(gdal::vector::OGRwkbGeometryType::wkbUnknown, geometry_type(&features));
    }
}
