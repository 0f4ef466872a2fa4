use geo::BoundingRect;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::{
    error::{IgtError, Result},
    geofile::feature::{AttributeValue, Feature, FeatureCollection},
};

pub const PROVINCE_CODE_FIELD: &str = "PROV_CODE";
pub const PROVINCE_NAME_FIELD: &str = "PROV_NAME";

const SEED: u64 = 42;
const NUM_LAND_USE_POINTS: usize = 50;
const LAND_USE_TYPES: [&str; 4] = ["Forest", "Agriculture", "Urban", "Water"];

/// Simplified Javanese provinces: code, name and bounding box (min lon, min lat, max lon, max lat).
pub const PROVINCES: [(&str, &str, [f64; 4]); 4] = [
    ("JK", "DKI Jakarta", [106.5, -6.4, 107.0, -6.1]),
    ("JB", "Jawa Barat", [107.0, -7.5, 108.5, -6.1]),
    ("JT", "Jawa Tengah", [109.0, -8.0, 111.0, -6.5]),
    ("JI", "Jawa Timur", [111.0, -9.0, 114.5, -6.8]),
];

pub fn province_name(code: &str) -> Option<&'static str> {
    PROVINCES
        .iter()
        .find(|(province_code, _, _)| *province_code == code)
        .map(|(_, name, _)| *name)
}

pub fn create_sample_provinces() -> Result<FeatureCollection> {
    let features = PROVINCES
        .iter()
        .map(|(code, name, [min_x, min_y, max_x, max_y])| {
            Feature::new_with_attributes(
                geo::Geometry::Polygon(
                    geo::Rect::new((*min_x, *min_y), (*max_x, *max_y)).to_polygon(),
                ),
                [(PROVINCE_CODE_FIELD, *code), (PROVINCE_NAME_FIELD, *name)],
            )
        })
        .collect();
    FeatureCollection::new_wgs84(features)
}

/// Random land-use points inside the bounding box of each province. Seeded, so every call returns the
/// same points.
pub fn create_sample_land_use(provinces: &FeatureCollection) -> Result<FeatureCollection> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let points_per_province = NUM_LAND_USE_POINTS / PROVINCES.len();
    let mut features = Vec::with_capacity(points_per_province * provinces.len());

    for province in &provinces.features {
        let code = province
            .attribute(PROVINCE_CODE_FIELD)
            .map(AttributeValue::to_string)
            .ok_or_else(|| {
                IgtError::InvalidArgument(format!("Province without '{}'", PROVINCE_CODE_FIELD))
            })?;
        let bounds = province
            .geometry
            .bounding_rect()
            .ok_or_else(|| IgtError::InvalidArgument(format!("Province {} has no extent", code)))?;

        for i in 0..points_per_province {
            let point = geo::Point::new(
                rng.gen_range(bounds.min().x..bounds.max().x),
                rng.gen_range(bounds.min().y..bounds.max().y),
            );
            let landuse_type = LAND_USE_TYPES.choose(&mut rng).copied().unwrap_or("Forest");
            features.push(Feature::new_with_attributes(
                geo::Geometry::Point(point),
                [
                    ("id", AttributeValue::from(format!("LU_{}_{}", code, i))),
                    ("landuse_type", AttributeValue::from(landuse_type)),
                    ("area_ha", AttributeValue::from(rng.gen_range(10.0..1000.0))),
                ],
            ));
        }
    }
    FeatureCollection::new_wgs84(features)
}

/// Provinces and land use used when no real data is configured.
pub fn create_sample_data() -> Result<(FeatureCollection, FeatureCollection)> {
    log::info!("Creating sample Indonesian spatial data...");
    let provinces = create_sample_provinces()?;
    let land_use = create_sample_land_use(&provinces)?;
    Ok((provinces, land_use))
}

#[cfg(test)]
mod tests {
    use geo::Intersects;

    use crate::geofile::feature::AttributeValue;

    use super::{create_sample_data, province_name, PROVINCE_CODE_FIELD};

    #[test]
    fn test_sample_data_shape() {
        let (provinces, land_use) = create_sample_data().unwrap();
        assert_eq!(
            vec!["JK", "JB", "JT", "JI"],
            provinces.string_values(PROVINCE_CODE_FIELD)
        );
        assert_eq!(48, land_use.len());
        assert!(provinces.spatial_ref.is_geographic());
        assert_eq!(Some("LU_JK_0".to_string()), land_use.string_values("id").first().cloned());
        assert_eq!(Some("LU_JI_11".to_string()), land_use.string_values("id").last().cloned());
    }

    #[test]
    fn test_sample_points_lie_in_their_province() {
        let (provinces, land_use) = create_sample_data().unwrap();
        for feature in &land_use.features {
            let id = feature.attribute("id").unwrap().to_string();
            let code = id.split('_').nth(1).unwrap();
            let province = provinces.find_by_attribute(PROVINCE_CODE_FIELD, code).unwrap();
            assert!(province.geometry.intersects(&feature.geometry), "{} outside {}", id, code);

            let area_ha = feature.attribute("area_ha").and_then(AttributeValue::as_f64).unwrap();
            assert!((10.0..1000.0).contains(&area_ha));
            let landuse_type = feature.attribute("landuse_type").unwrap().to_string();
            assert!(["Forest", "Agriculture", "Urban", "Water"].contains(&landuse_type.as_str()));
        }
    }

    #[test]
    fn test_sample_data_is_deterministic() {
        let (_, first) = create_sample_data().unwrap();
        let (_, second) = create_sample_data().unwrap();
        for (a, b) in first.features.iter().zip(second.features.iter()) {
            assert_eq!(a.geometry, b.geometry);
            assert_eq!(a.attributes, b.attributes);
        }
    }

    #[test]
    fn test_province_name() {
        assert_eq!(Some("Jawa Timur"), province_name("JI"));
        assert_eq!(None, province_name("XX"));
    }
}
