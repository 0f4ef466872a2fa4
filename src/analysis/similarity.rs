use geo::{Area, BooleanOps};

use super::areal_part;
use crate::{error::Result, geocode::Geocoder};

/// Intersection over union of two geometries in the same CRS. Zero when the union has no area.
pub fn iou(geometry_a: &geo::Geometry, geometry_b: &geo::Geometry) -> f64 {
    let area_a = areal_part(geometry_a);
    let area_b = areal_part(geometry_b);
    if area_a.0.is_empty() || area_b.0.is_empty() {
        return 0.0;
    }
    if geometry_a == geometry_b {
        return if area_a.unsigned_area() > 0.0 { 1.0 } else { 0.0 };
    }

    let union_area = area_a.union(&area_b).unsigned_area();
    if union_area <= 0.0 {
        return 0.0;
    }
    let intersection_area = area_a.intersection(&area_b).unsigned_area();
    (intersection_area / union_area).clamp(0.0, 1.0)
}

/// IoU of the two geometries. The second geometry is handed back so callers comparing against a
/// fetched reference keep it.
pub fn score(geometry_a: &geo::Geometry, geometry_b: geo::Geometry) -> (f64, geo::Geometry) {
    (iou(geometry_a, &geometry_b), geometry_b)
}

/// Resolve `place_name` through the geocoder and score `geometry` against the result.
/// Geocoding failures are returned as they are.
pub fn compare_with_reference(
    geocoder: &dyn Geocoder,
    place_name: &str,
    geometry: &geo::Geometry,
) -> Result<(f64, geo::Geometry)> {
    log::info!("Resolving '{}' with {}", place_name, geocoder.service_name());
    let reference = geocoder.resolve(place_name)?;
    let (iou_score, reference) = score(geometry, reference);
    log::info!(
        "IoU between local geometry and {} result for '{}': {:.4}",
        geocoder.service_name(),
        place_name,
        iou_score
    );
    Ok((iou_score, reference))
}
