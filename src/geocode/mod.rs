pub mod google;

use crate::error::FetchError;

/// Resolves a place name to a reference geometry in WGS84 longitude/latitude.
pub trait Geocoder {
    /// Name used in logs and exported comparison layers.
    fn service_name(&self) -> &str;

    fn resolve(&self, place_name: &str) -> Result<geo::Geometry, FetchError>;
}
