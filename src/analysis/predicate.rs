use std::{fmt, str::FromStr};

use geo::{Intersects, Relate};
use serde::Deserialize;

use crate::{
    crs::crs_utils::{describe_crs, same_crs},
    error::{IgtError, Result},
    geofile::feature::{Feature, FeatureCollection},
};

/// Spatial relationship evaluated as `feature <predicate> target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialPredicate {
    Intersects,
    Within,
    Contains,
}

impl SpatialPredicate {
    pub const ALL: [SpatialPredicate; 3] = [
        SpatialPredicate::Intersects,
        SpatialPredicate::Within,
        SpatialPredicate::Contains,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SpatialPredicate::Intersects => "intersects",
            SpatialPredicate::Within => "within",
            SpatialPredicate::Contains => "contains",
        }
    }

    pub fn evaluate(&self, geometry: &geo::Geometry, target: &geo::Geometry) -> bool {
        match self {
            SpatialPredicate::Intersects => geometry.intersects(target),
            SpatialPredicate::Within => geometry.relate(target).is_within(),
            SpatialPredicate::Contains => geometry.relate(target).is_contains(),
        }
    }
}

impl fmt::Display for SpatialPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpatialPredicate {
    type Err = IgtError;

    fn from_str(value: &str) -> Result<Self> {
        SpatialPredicate::ALL
            .into_iter()
            .find(|predicate| predicate.name() == value)
            .ok_or_else(|| {
                IgtError::InvalidArgument(format!(
                    "Unknown spatial predicate '{}', expected one of intersects, within, contains",
                    value
                ))
            })
    }
}

/// Features of `collection` for which `feature <predicate> target` holds, in original order.
pub fn filter(
    collection: &FeatureCollection,
    target: &geo::Geometry,
    predicate: SpatialPredicate,
) -> FeatureCollection {
    let features: Vec<Feature> = collection
        .features
        .iter()
        .filter(|feature| predicate.evaluate(&feature.geometry, target))
        .cloned()
        .collect();
    log::debug!(
        "{} of {} features satisfy '{}'",
        features.len(),
        collection.len(),
        predicate
    );
    FeatureCollection::new(features, collection.spatial_ref.clone())
}

/// `filter` with the predicate given by name.
pub fn filter_by_name(
    collection: &FeatureCollection,
    target: &geo::Geometry,
    predicate_name: &str,
) -> Result<FeatureCollection> {
    Ok(filter(collection, target, predicate_name.parse()?))
}

/// Number of ordered pairs `(a, b)` with `a <predicate> b`.
pub fn count_matches(
    left: &FeatureCollection,
    right: &FeatureCollection,
    predicate: SpatialPredicate,
) -> Result<usize> {
    if !same_crs(&left.spatial_ref, &right.spatial_ref) {
        return Err(IgtError::Crs(format!(
            "Cannot compare collections in {} and {}",
            describe_crs(&left.spatial_ref),
            describe_crs(&right.spatial_ref)
        )));
    }
    Ok(left
        .features
        .iter()
        .map(|a| {
            right
                .features
                .iter()
                .filter(|b| predicate.evaluate(&a.geometry, &b.geometry))
                .count()
        })
        .sum())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{
        crs::crs_utils::spatial_ref_from_epsg,
        error::IgtError,
        geofile::feature::{Feature, FeatureCollection},
    };

    use super::{count_matches, filter, filter_by_name, SpatialPredicate};

    fn bbox(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> geo::Geometry {
        geo::Geometry::Polygon(geo::Rect::new((min_x, min_y), (max_x, max_y)).to_polygon())
    }

    fn point(x: f64, y: f64) -> geo::Geometry {
        geo::Geometry::Point(geo::Point::new(x, y))
    }

    fn labelled(geometries: Vec<geo::Geometry>) -> FeatureCollection {
        FeatureCollection::new_wgs84(
            geometries
                .into_iter()
                .enumerate()
                .map(|(index, geometry)| {
                    Feature::new_with_attributes(geometry, [("id", format!("LU_{}", index))])
                })
                .collect(),
        )
        .unwrap()
    }

    fn ids(collection: &FeatureCollection) -> Vec<String> {
        collection.string_values("id")
    }

    #[rstest]
    #[case("intersects", SpatialPredicate::Intersects)]
    #[case("within", SpatialPredicate::Within)]
    #[case("contains", SpatialPredicate::Contains)]
    fn test_parse_predicate(#[case] name: &str, #[case] expected: SpatialPredicate) {
        let predicate: SpatialPredicate = name.parse().unwrap();
        assert_eq!(expected, predicate);
        assert_eq!(name, predicate.to_string());
    }

    #[rstest]
    #[case("overlaps")]
    #[case("Within")]
    #[case("")]
    #[case("touches")]
    fn test_unknown_predicate_is_invalid_argument(#[case] name: &str) {
        let collection = labelled(vec![point(106.7, -6.2)]);
        match filter_by_name(&collection, &bbox(106.5, -6.4, 107.0, -6.1), name) {
            Err(IgtError::InvalidArgument(message)) => {
                assert!(message.contains(&format!("'{}'", name)), "{}", message)
            }
            Err(other) => panic!("Unexpected error {:?}", other),
            Ok(_) => panic!("Predicate '{}' should be rejected", name),
        }
    }

    #[test]
    fn test_intersects_with_covering_target_keeps_everything_in_order() {
        let collection = labelled(vec![
            point(106.7, -6.2),
            bbox(107.1, -7.0, 107.5, -6.5),
            point(113.0, -7.5),
            bbox(109.5, -7.5, 110.0, -7.0),
        ]);
        let java = bbox(105.0, -10.0, 115.0, -5.0);
        let result = filter(&collection, &java, SpatialPredicate::Intersects);
        assert_eq!(ids(&collection), ids(&result));
    }

    #[test]
    fn test_within_jakarta_bbox() {
        let collection = labelled(vec![
            point(106.8, -6.2),
            point(107.8, -6.9),
            point(106.75, -6.15),
            bbox(106.6, -6.35, 107.2, -6.2),
        ]);
        let jakarta = bbox(106.5, -6.4, 107.0, -6.1);
        let result = filter(&collection, &jakarta, SpatialPredicate::Within);
        assert_eq!(vec!["LU_0", "LU_2"], ids(&result));

        // The polygon straddling the eastern edge intersects but is not within.
        let intersecting = filter(&collection, &jakarta, SpatialPredicate::Intersects);
        assert_eq!(vec!["LU_0", "LU_2", "LU_3"], ids(&intersecting));
    }

    #[test]
    fn test_contains_keeps_features_containing_target() {
        let collection = labelled(vec![
            bbox(106.5, -6.4, 107.0, -6.1),
            bbox(107.0, -7.5, 108.5, -6.1),
            point(108.0, -7.0),
        ]);
        let target = point(106.7, -6.2);
        let result = filter(&collection, &target, SpatialPredicate::Contains);
        assert_eq!(vec!["LU_0"], ids(&result));
    }

    #[test]
    fn test_filter_does_not_mutate_input() {
        let collection = labelled(vec![point(106.8, -6.2), point(120.0, 0.0)]);
        let result = filter(&collection, &bbox(106.5, -6.4, 107.0, -6.1), SpatialPredicate::Within);
        assert_eq!(1, result.len());
        assert_eq!(2, collection.len());
    }

    #[test]
    fn test_count_matches() {
        let provinces = labelled(vec![
            bbox(106.5, -6.4, 107.0, -6.1),
            bbox(107.0, -7.5, 108.5, -6.1),
        ]);
        let land_use = labelled(vec![
            point(106.8, -6.2),
            point(107.8, -6.9),
            point(110.0, -7.0),
            // On the shared border of both provinces.
            point(107.0, -6.2),
        ]);
        assert_eq!(
            4,
            count_matches(&provinces, &land_use, SpatialPredicate::Intersects).unwrap()
        );
        assert_eq!(
            2,
            count_matches(&land_use, &provinces, SpatialPredicate::Within).unwrap()
        );
    }

    #[test]
    fn test_count_matches_requires_same_crs() {
        let wgs84 = labelled(vec![point(106.8, -6.2)]);
        let utm = FeatureCollection::new(
            vec![Feature::from(point(700_000.0, 9_300_000.0))],
            spatial_ref_from_epsg(32748).unwrap(),
        );
        assert!(matches!(
            count_matches(&wgs84, &utm, SpatialPredicate::Intersects),
            Err(IgtError::Crs(_))
        ));
    }
}
