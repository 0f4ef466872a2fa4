use std::collections::BTreeMap;

use geo::{Area, GeodesicArea, Intersects};

use super::areal_part;
use crate::{
    crs::{crs_utils::describe_crs, projection::project_collection},
    error::{IgtError, Result},
    geofile::feature::{AttributeValue, Feature, FeatureCollection},
};

const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Attribute names used by the overlap aggregation.
#[derive(Debug, Clone)]
pub struct OverlapParams {
    /// Name attribute of the administrative regions.
    pub region_field: String,
    /// Category attribute of the land-use features.
    pub category_field: String,
    /// Area in hectares, used for features without areal geometry.
    pub area_field: String,
}

impl Default for OverlapParams {
    fn default() -> Self {
        Self {
            region_field: "PROV_NAME".to_string(),
            category_field: "landuse_type".to_string(),
            area_field: "area_ha".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub region: String,
    pub category: String,
    pub area_ha: f64,
}

/// Area per (region, category), sorted by region then category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionAttributeSummary {
    pub rows: Vec<SummaryRow>,
}

impl RegionAttributeSummary {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, region: &str, category: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.region == region && row.category == category)
            .map(|row| row.area_ha)
    }

    pub fn total_area_ha(&self) -> f64 {
        self.rows.iter().map(|row| row.area_ha).sum()
    }
}

fn string_attribute(feature: &Feature, field: &str, role: &str) -> Result<String> {
    feature
        .attribute(field)
        .map(AttributeValue::to_string)
        .ok_or_else(|| {
            IgtError::InvalidArgument(format!("{} feature is missing attribute '{}'", role, field))
        })
}

/// Area of a feature in hectares. Areal geometries are measured on the WGS84 ellipsoid when
/// `geographic` (longitude/latitude degrees) and in the plane otherwise; points and lines fall back
/// to the `area_field` attribute.
fn feature_area_ha(feature: &Feature, area_field: &str, geographic: bool) -> Result<f64> {
    let polygons = areal_part(&feature.geometry);
    if !polygons.0.is_empty() {
        let area_m2 = if geographic {
            polygons.geodesic_area_unsigned()
        } else {
            polygons.unsigned_area()
        };
        return Ok(area_m2 / SQUARE_METERS_PER_HECTARE);
    }
    match feature.attribute(area_field) {
        None => Ok(0.0),
        Some(value) => match value.as_f64() {
            Some(area_ha) if area_ha >= 0.0 => Ok(area_ha),
            _ => Err(IgtError::InvalidArgument(format!(
                "Attribute '{}' must be a non-negative number, got '{}'",
                area_field, value
            ))),
        },
    }
}

/// Spatially join `feature_layer` onto `admin_regions` (inner join on intersection) and sum feature
/// areas per (region name, category).
///
/// The join runs in the CRS of the admin regions, onto which the feature layer is reprojected. The
/// inputs are left untouched. A feature intersecting several regions is counted once for each of
/// them.
pub fn aggregate(
    admin_regions: &FeatureCollection,
    feature_layer: &FeatureCollection,
    params: &OverlapParams,
) -> Result<RegionAttributeSummary> {
    if admin_regions.is_empty() || feature_layer.is_empty() {
        return Ok(RegionAttributeSummary::default());
    }

    let features = project_collection(feature_layer, &admin_regions.spatial_ref)?;
    let geographic = admin_regions.spatial_ref.is_geographic();
    log::debug!(
        "Joining {} features onto {} regions in {}",
        features.len(),
        admin_regions.len(),
        describe_crs(&admin_regions.spatial_ref)
    );

    let region_names = admin_regions
        .features
        .iter()
        .map(|region| string_attribute(region, &params.region_field, "Region"))
        .collect::<Result<Vec<String>>>()?;

    let mut area_by_key: BTreeMap<(String, String), f64> = BTreeMap::new();
    let mut unmatched = 0;
    for feature in &features.features {
        let matching_regions: Vec<&String> = admin_regions
            .features
            .iter()
            .zip(region_names.iter())
            .filter(|(region, _)| region.geometry.intersects(&feature.geometry))
            .map(|(_, name)| name)
            .collect();
        if matching_regions.is_empty() {
            unmatched += 1;
            continue;
        }
        let category = string_attribute(feature, &params.category_field, "Land use")?;
        let area_ha = feature_area_ha(feature, &params.area_field, geographic)?;
        for region_name in matching_regions {
            *area_by_key
                .entry((region_name.clone(), category.clone()))
                .or_insert(0.0) += area_ha;
        }
    }
    if unmatched > 0 {
        log::info!("{} features intersect no region and were dropped", unmatched);
    }

    Ok(RegionAttributeSummary {
        rows: area_by_key
            .into_iter()
            .map(|((region, category), area_ha)| SummaryRow {
                region,
                category,
                area_ha,
            })
            .collect(),
    })
}
