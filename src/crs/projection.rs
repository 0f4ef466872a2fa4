use proj::Transform;

use crate::{
    crs::crs_utils::{crs_definition, describe_crs, epsg_4326, same_crs},
    error::Result,
    geofile::feature::{Feature, FeatureCollection},
};

pub fn project_geometry(geometry: &geo::Geometry, projection: &proj::Proj) -> Result<geo::Geometry> {
    use geo::Geometry::*;
    let projected = match geometry {
        Point(point) => Point(point.transformed(projection)?),
        Line(line) => LineString(geo::LineString::from(vec![line.start, line.end]).transformed(projection)?),
        LineString(line) => LineString(line.transformed(projection)?),
        Polygon(polygon) => Polygon(polygon.transformed(projection)?),
        MultiPoint(points) => MultiPoint(points.transformed(projection)?),
        MultiLineString(lines) => MultiLineString(lines.transformed(projection)?),
        MultiPolygon(polygons) => MultiPolygon(polygons.transformed(projection)?),
        Rect(rect) => Polygon(rect.to_polygon().transformed(projection)?),
        Triangle(triangle) => Polygon(triangle.to_polygon().transformed(projection)?),
        GeometryCollection(collection) => GeometryCollection(geo::GeometryCollection(
            collection
                .iter()
                .map(|member| project_geometry(member, projection))
                .collect::<Result<Vec<geo::Geometry>>>()?,
        )),
    };
    Ok(projected)
}

/// Project a collection into the CRS indicated by `to_crs`. Returns a new collection.
pub fn project_collection(
    collection: &FeatureCollection,
    to_crs: &gdal::spatial_ref::SpatialRef,
) -> Result<FeatureCollection> {
    if same_crs(&collection.spatial_ref, to_crs) {
        return Ok(collection.clone());
    }
    log::debug!(
        "Projecting {} features from {} to {}",
        collection.len(),
        describe_crs(&collection.spatial_ref),
        describe_crs(to_crs)
    );
    let projection = proj::Proj::new_known_crs(
        &crs_definition(&collection.spatial_ref)?,
        &crs_definition(to_crs)?,
        None,
    )?;
    let features: Result<Vec<Feature>> = collection
        .features
        .iter()
        .map(|feature| {
            Ok(Feature {
                geometry: project_geometry(&feature.geometry, &projection)?,
                attributes: feature.attributes.clone(),
            })
        })
        .collect();
    Ok(FeatureCollection::new(features?, to_crs.clone()))
}

pub fn project_collection_to_wgs84(collection: &FeatureCollection) -> Result<FeatureCollection> {
    project_collection(collection, &epsg_4326()?)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use geo::{Area, GeodesicArea, Geometry};

    use crate::{
        crs::crs_utils::{epsg_4326, epsg_code, spatial_ref_from_epsg},
        geofile::feature::{Feature, FeatureCollection},
    };

    use super::project_collection;

    fn jakarta_point_collection() -> FeatureCollection {
        FeatureCollection::new(
            vec![Feature::from(Geometry::Point(geo::Point::new(106.7, -6.2)))],
            epsg_4326().unwrap(),
        )
    }

    #[test]
    fn test_project_collection_round_trip() {
        let collection = jakarta_point_collection();
        let utm_48s = spatial_ref_from_epsg(32748).unwrap();
        let projected = project_collection(&collection, &utm_48s).unwrap();
        assert_eq!(Some(32748), epsg_code(&projected.spatial_ref));
        match &projected.features[0].geometry {
            // Southern hemisphere northings are offset by 10,000 km.
            Geometry::Point(point) => assert!(point.y() > 9_000_000.0 && point.x() > 600_000.0),
            other => panic!("Unexpected geometry {:?}", other),
        }

        let back = project_collection(&projected, &epsg_4326().unwrap()).unwrap();
        match &back.features[0].geometry {
            Geometry::Point(point) => {
                assert_abs_diff_eq!(*point, geo::Point::new(106.7, -6.2), epsilon = 1e-7)
            }
            other => panic!("Unexpected geometry {:?}", other),
        }
        // The input keeps its CRS.
        assert_eq!(Some(4326), epsg_code(&collection.spatial_ref));
    }

    #[test]
    fn test_projected_area_near_central_meridian_matches_geodesic_area() {
        // Hundredth of a degree square near Jakarta, 1.3 degrees from the 48S central meridian.
        let square: geo::Polygon = geo::Rect::new((106.70, -6.21), (106.71, -6.20)).to_polygon();
        let collection = FeatureCollection::new(
            vec![Feature::from(Geometry::Polygon(square.clone()))],
            epsg_4326().unwrap(),
        );
        let projected =
            project_collection(&collection, &spatial_ref_from_epsg(32748).unwrap()).unwrap();

        let planar_area = projected.features[0].geometry.unsigned_area();
        let geodesic_area = square.geodesic_area_unsigned();
        assert_abs_diff_eq!(1.0, planar_area / geodesic_area, epsilon = 1e-3);
    }
}
