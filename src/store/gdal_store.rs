use gdal::vector::LayerAccess;
use std::path::Path;

use super::{ConflictPolicy, SpatialStore};
use crate::{
    config::DatabaseConfig,
    crs::{crs_utils::describe_crs, projection::project_collection},
    error::{IgtError, Result},
    geofile::{
        feature::FeatureCollection,
        gdal_geofile::{
            create_layer_with_features, open_vector_dataset, read_features_from_layer,
            write_features_to_layer, write_in_transaction, GdalDriverType,
        },
    },
};

fn store_error(context: &str) -> impl Fn(gdal::errors::GdalError) -> IgtError + '_ {
    move |err| IgtError::Store(format!("{}, {}", context, err))
}

/// Spatial store over any writable GDAL vector dataset: a PostGIS database through the PostgreSQL
/// driver, or a GeoPackage file.
pub struct GdalStore {
    dataset: gdal::Dataset,
    description: String,
}

impl GdalStore {
    /// Connect to PostGIS and make sure the extension is enabled.
    pub fn connect_postgis(config: &DatabaseConfig) -> Result<Self> {
        log::info!(
            "Connecting to PostGIS database {} at {}:{}",
            config.database,
            config.host,
            config.port
        );
        let dataset = open_vector_dataset(&config.gdal_connection_string(), true)
            .map_err(store_error("Could not connect to PostGIS"))?;
        let driver_name = dataset.driver().short_name();
        if driver_name != GdalDriverType::PostgreSql.name() {
            return Err(IgtError::Store(format!(
                "Expected a {} dataset, got {}",
                GdalDriverType::PostgreSql.name(),
                driver_name
            )));
        }
        dataset
            .execute_sql(
                "CREATE EXTENSION IF NOT EXISTS postgis",
                None,
                gdal::vector::sql::Dialect::DEFAULT,
            )
            .map_err(store_error("Could not enable the PostGIS extension"))?;
        Ok(Self {
            dataset,
            description: format!("postgis://{}:{}/{}", config.host, config.port, config.database),
        })
    }

    pub fn create_geopackage(filepath: &Path) -> Result<Self> {
        gdal::DriverManager::register_all();
        let driver = gdal::DriverManager::get_driver_by_name(GdalDriverType::GeoPackage.name())
            .map_err(store_error("Getting GDAL driver"))?;
        let dataset = driver
            .create_vector_only(filepath)
            .map_err(store_error("Could not create GeoPackage"))?;
        Ok(Self {
            dataset,
            description: format!("{:?}", filepath),
        })
    }

    pub fn open(filepath: &Path) -> Result<Self> {
        let dataset = open_vector_dataset(&filepath.to_string_lossy(), true)
            .map_err(store_error("Could not open store"))?;
        Ok(Self {
            dataset,
            description: format!("{:?}", filepath),
        })
    }
}

fn has_layer(dataset: &gdal::Dataset, table_name: &str) -> bool {
    dataset.layer_by_name(table_name).is_ok()
}

fn append_to_table(
    dataset: &mut gdal::Dataset,
    collection: &FeatureCollection,
    table_name: &str,
) -> Result<()> {
    let mut layer = dataset
        .layer_by_name(table_name)
        .map_err(store_error("Could not open table"))?;

    let field_names: Vec<String> = layer.defn().fields().map(|field| field.name()).collect();
    let missing_fields: Vec<&String> = collection
        .features
        .iter()
        .filter_map(|feature| feature.attributes.as_ref())
        .flat_map(|attributes| attributes.keys())
        .filter(|name| !field_names.contains(name))
        .collect();
    if let Some(missing_field) = missing_fields.first() {
        return Err(IgtError::Store(format!(
            "Schema mismatch, table '{}' has no column '{}'",
            table_name, missing_field
        )));
    }

    let collection = match layer.spatial_ref() {
        Some(table_crs) => {
            log::debug!("Appending in table CRS {}", describe_crs(&table_crs));
            project_collection(collection, &table_crs)?
        }
        None => collection.clone(),
    };
    write_features_to_layer(&mut layer, &collection.features)
}

fn write_table(
    dataset: &mut gdal::Dataset,
    collection: &FeatureCollection,
    table_name: &str,
    policy: ConflictPolicy,
) -> Result<()> {
    match (policy, has_layer(dataset, table_name)) {
        (ConflictPolicy::Fail, true) => Err(IgtError::Store(format!(
            "Table '{}' already exists",
            table_name
        ))),
        (ConflictPolicy::Append, true) => append_to_table(dataset, collection, table_name),
        (ConflictPolicy::Replace, true) => create_layer_with_features(
            dataset,
            table_name,
            collection,
            Some(&["OVERWRITE=YES"][..]),
        ),
        (_, false) => create_layer_with_features(dataset, table_name, collection, None),
    }
}

impl SpatialStore for GdalStore {
    fn write_collections(
        &mut self,
        tables: &[(&str, &FeatureCollection)],
        policy: ConflictPolicy,
    ) -> Result<()> {
        for (table_name, collection) in tables {
            log::info!(
                "Writing {} features to table '{}' of {} (if exists: {})",
                collection.len(),
                table_name,
                self.description,
                policy
            );
        }
        if policy == ConflictPolicy::Fail {
            if let Some((table_name, _)) = tables
                .iter()
                .find(|(table_name, _)| has_layer(&self.dataset, table_name))
            {
                return Err(IgtError::Store(format!(
                    "Table '{}' already exists",
                    table_name
                )));
            }
        }
        write_in_transaction(&mut self.dataset, |dataset| {
            tables.iter().try_for_each(|(table_name, collection)| {
                write_table(dataset, collection, table_name, policy)
            })
        })
    }

    fn has_table(&self, table_name: &str) -> bool {
        has_layer(&self.dataset, table_name)
    }

    fn query(&self, sql: &str) -> Result<FeatureCollection> {
        let result_set = self
            .dataset
            .execute_sql(sql, None, gdal::vector::sql::Dialect::DEFAULT)
            .map_err(store_error("Query failed"))?;
        match result_set {
            Some(mut result_set) => read_features_from_layer(&mut result_set),
            None => FeatureCollection::new_wgs84(vec![]),
        }
    }
}
