use crate::error::{IgtError, Result};

pub type EpsgCode = u32;

pub const WGS84_EPSG: EpsgCode = 4326;

pub fn spatial_ref_from_epsg(code: EpsgCode) -> Result<gdal::spatial_ref::SpatialRef> {
    gdal::spatial_ref::SpatialRef::from_epsg(code)
        .map_err(|err| IgtError::Crs(format!("Could not create SpatialRef for EPSG:{}. {}", code, err)))
}

pub fn epsg_4326() -> Result<gdal::spatial_ref::SpatialRef> {
    spatial_ref_from_epsg(WGS84_EPSG)
}

/// EPSG code of a spatial reference, if it has one.
pub fn epsg_code(spatial_ref: &gdal::spatial_ref::SpatialRef) -> Option<EpsgCode> {
    match spatial_ref.auth_name() {
        Ok(name) if name == "EPSG" => spatial_ref.auth_code().ok().map(|code| code as EpsgCode),
        _ => None,
    }
}

/// Definition string PROJ accepts for the spatial reference: "EPSG:xxxx" when an authority
/// code is known, WKT otherwise.
pub fn crs_definition(spatial_ref: &gdal::spatial_ref::SpatialRef) -> Result<String> {
    match epsg_code(spatial_ref) {
        Some(code) => Ok(epsg_code_to_authority_string(code)),
        None => spatial_ref
            .to_wkt()
            .map_err(|err| IgtError::Crs(format!("Could not export spatial ref to WKT. {}", err))),
    }
}

pub fn describe_crs(spatial_ref: &gdal::spatial_ref::SpatialRef) -> String {
    match epsg_code(spatial_ref) {
        Some(code) => epsg_code_to_authority_string(code),
        None => spatial_ref.name().unwrap_or_else(|_| "unknown CRS".to_string()),
    }
}

pub fn same_crs(
    left: &gdal::spatial_ref::SpatialRef,
    right: &gdal::spatial_ref::SpatialRef,
) -> bool {
    match (epsg_code(left), epsg_code(right)) {
        (Some(left_code), Some(right_code)) => left_code == right_code,
        _ => left == right,
    }
}

pub fn epsg_code_to_authority_string(code: EpsgCode) -> String {
    format!("EPSG:{}", code)
}
