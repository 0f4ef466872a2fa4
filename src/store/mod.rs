pub mod gdal_store;

use std::fmt;

use serde::Deserialize;

use crate::{error::Result, geofile::feature::FeatureCollection};

/// What to do when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    Replace,
    Append,
    Fail,
}

impl ConflictPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            ConflictPolicy::Replace => "replace",
            ConflictPolicy::Append => "append",
            ConflictPolicy::Fail => "fail",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Table-oriented persistence of feature collections.
pub trait SpatialStore {
    /// Write several `(table name, collection)` pairs. Either every table is written or none is.
    fn write_collections(
        &mut self,
        tables: &[(&str, &FeatureCollection)],
        policy: ConflictPolicy,
    ) -> Result<()>;

    fn write_collection(
        &mut self,
        collection: &FeatureCollection,
        table_name: &str,
        policy: ConflictPolicy,
    ) -> Result<()> {
        self.write_collections(&[(table_name, collection)], policy)
    }

    fn has_table(&self, table_name: &str) -> bool;

    /// Run a SQL query and return its rows as features.
    fn query(&self, sql: &str) -> Result<FeatureCollection>;
}
