use std::collections::HashMap;

use crate::crs::crs_utils::epsg_4326;
use crate::error::Result;

/// Attribute value of a feature. GDAL integer and real fields are both read as `Number`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Number(f64),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(value) => Some(value),
            AttributeValue::Number(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(value) => Some(*value),
            AttributeValue::String(value) => value.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::String(value) => write!(f, "{}", value),
            AttributeValue::Number(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

pub type FeatureMap = HashMap<String, AttributeValue>;

#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: geo::Geometry,
    pub attributes: Option<FeatureMap>,
}

impl Feature {
    pub fn new_with_attributes<I, K, V>(geometry: geo::Geometry, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        Self {
            geometry,
            attributes: Some(
                attributes
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.as_ref().and_then(|attributes| attributes.get(name))
    }
}

impl From<geo::Geometry> for Feature {
    fn from(value: geo::Geometry) -> Self {
        Self {
            geometry: value,
            attributes: None,
        }
    }
}

/// Features sharing one coordinate reference system.
#[derive(Clone)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub spatial_ref: gdal::spatial_ref::SpatialRef,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>, spatial_ref: gdal::spatial_ref::SpatialRef) -> Self {
        Self {
            features,
            spatial_ref,
        }
    }

    /// Collection in WGS84 longitude/latitude.
    pub fn new_wgs84(features: Vec<Feature>) -> Result<Self> {
        Ok(Self::new(features, epsg_4326()?))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// First feature whose `field` attribute is the string `value`.
    pub fn find_by_attribute(&self, field: &str, value: &str) -> Option<&Feature> {
        self.features.iter().find(|feature| {
            feature
                .attribute(field)
                .and_then(AttributeValue::as_str)
                .map_or(false, |attribute| attribute == value)
        })
    }

    /// Values of a string attribute in feature order, skipping features that lack it.
    pub fn string_values(&self, field: &str) -> Vec<String> {
        self.features
            .iter()
            .filter_map(|feature| feature.attribute(field))
            .map(|value| value.to_string())
            .collect()
    }
}
