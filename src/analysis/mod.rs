pub mod overlap;
pub mod predicate;
pub mod similarity;

/// Polygonal part of a geometry. Points and lines have no area and contribute nothing.
pub(crate) fn areal_part(geometry: &geo::Geometry) -> geo::MultiPolygon {
    match geometry {
        geo::Geometry::Polygon(polygon) => geo::MultiPolygon(vec![polygon.clone()]),
        geo::Geometry::MultiPolygon(polygons) => polygons.clone(),
        geo::Geometry::Rect(rect) => geo::MultiPolygon(vec![rect.to_polygon()]),
        geo::Geometry::Triangle(triangle) => geo::MultiPolygon(vec![triangle.to_polygon()]),
        geo::Geometry::GeometryCollection(collection) => geo::MultiPolygon(
            collection
                .iter()
                .flat_map(|member| areal_part(member).0)
                .collect(),
        ),
        _ => geo::MultiPolygon(vec![]),
    }
}
