use std::{fs, path::Path};

use crate::{
    analysis::{
        overlap::{aggregate, OverlapParams, RegionAttributeSummary},
        predicate::{count_matches, filter},
        similarity::compare_with_reference,
    },
    config::Config,
    error::{IgtError, Result},
    geocode::{google::GoogleGeocoder, Geocoder},
    geofile::{
        feature::{Feature, FeatureCollection},
        gdal_geofile::load_geofile_wgs84,
        geojson::write_collection_to_geojson,
    },
    sample_data::{create_sample_data, PROVINCE_CODE_FIELD, PROVINCE_NAME_FIELD},
    store::{gdal_store::GdalStore, ConflictPolicy, SpatialStore},
};

pub const PROVINCES_TABLE: &str = "indonesia_provinces";
pub const LAND_USE_TABLE: &str = "land_use";

/// Parts of the pipeline that can be run on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Module {
    #[value(alias = "data_ingestion")]
    DataIngestion,
    #[value(alias = "spatial_analysis")]
    SpatialAnalysis,
    #[value(alias = "map_comparison")]
    MapComparison,
    Database,
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub service: String,
    pub place_name: String,
    pub iou: f64,
    pub reference: geo::Geometry,
}

pub struct SpatialAnalysis {
    pub overlap_summary: RegionAttributeSummary,
    /// Land use related to the target province by the configured predicate.
    pub query_result: FeatureCollection,
    /// Pairs (land use, province) related by the configured predicate.
    pub match_count: usize,
}

pub struct PipelineOutput {
    pub provinces: FeatureCollection,
    pub land_use: FeatureCollection,
    pub overlap_summary: RegionAttributeSummary,
    pub query_result: FeatureCollection,
    pub match_count: usize,
    pub comparison: Option<Comparison>,
    pub config: Config,
}

pub enum ModuleOutput {
    DataIngestion {
        provinces: FeatureCollection,
        land_use: FeatureCollection,
    },
    SpatialAnalysis(SpatialAnalysis),
    MapComparison(Comparison),
    Database { tables: Vec<String> },
}

pub struct Pipeline {
    config: Config,
    geocoder: Option<Box<dyn Geocoder>>,
    store: Option<Box<dyn SpatialStore>>,
}

impl Pipeline {
    /// Pipeline without external collaborators: comparison and persistence are skipped.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            geocoder: None,
            store: None,
        }
    }

    /// Pipeline with the collaborators the config asks for: a Google geocoder when an API key is
    /// available and a PostGIS store when the database is enabled.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let geocoder = config
            .google_api_key()
            .map(|api_key| Box::new(GoogleGeocoder::new(&api_key)) as Box<dyn Geocoder>);
        let store = if config.database.enabled {
            Some(Box::new(GdalStore::connect_postgis(&config.database)?) as Box<dyn SpatialStore>)
        } else {
            None
        };
        Ok(Self {
            config,
            geocoder,
            store,
        })
    }

    pub fn with_geocoder(mut self, geocoder: Box<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_store(mut self, store: Box<dyn SpatialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Run every phase. Persistence comes last, after analysis and export succeeded, and writes all
    /// tables in one transaction.
    pub fn run(&mut self) -> Result<PipelineOutput> {
        log::info!("{}", "=".repeat(70));
        log::info!("STARTING INDONESIAN IGT SPATIAL ANALYSIS PIPELINE");
        log::info!("{}", "=".repeat(70));

        match self.run_phases() {
            Ok(output) => {
                log::info!("PIPELINE EXECUTION COMPLETED SUCCESSFULLY");
                Ok(output)
            }
            Err(err) => {
                log_failure(&err);
                Err(err)
            }
        }
    }

    fn run_phases(&mut self) -> Result<PipelineOutput> {
        self.config.validate()?;

        log::info!("[PHASE 1] Data Preparation");
        let (provinces, land_use) = self.load_data()?;

        log::info!("[PHASE 2] Spatial Analysis");
        let analysis = self.analyze(&provinces, &land_use)?;
        log::info!(
            "Skipping network analysis (connection radius {} km)",
            self.config.analysis.connection_radius_km
        );

        log::info!("[PHASE 3] Map Service Comparison");
        let comparison = match &self.geocoder {
            Some(geocoder) => Some(self.compare(geocoder.as_ref(), &provinces)?),
            None => {
                log::info!(
                    "No API key configured (analysis.google_api_key or {}), skipping comparison",
                    crate::config::GOOGLE_API_KEY_ENV
                );
                None
            }
        };

        log::info!("[PHASE 4] Output");
        match &self.config.output_dir {
            Some(output_dir) => export_outputs(
                output_dir,
                &provinces,
                &land_use,
                &analysis,
                comparison.as_ref(),
                &self.target_province(&provinces)?.geometry,
            )?,
            None => log::info!("No output_dir configured, skipping export"),
        }

        log::info!("[PHASE 5] Spatial Database Operations");
        if self.store.is_some() {
            self.persist(&provinces, &land_use)?;
        } else {
            log::info!("Database disabled, skipping persistence");
        }

        let SpatialAnalysis {
            overlap_summary,
            query_result,
            match_count,
        } = analysis;
        Ok(PipelineOutput {
            provinces,
            land_use,
            overlap_summary,
            query_result,
            match_count,
            comparison,
            config: self.config.clone(),
        })
    }

    /// Run a single module. Each module loads its input data first.
    pub fn run_module(&mut self, module: Module) -> Result<ModuleOutput> {
        log::info!("Executing module: {:?}", module);
        let outcome = self.run_module_phases(module);
        if let Err(err) = &outcome {
            log_failure(err);
        }
        outcome
    }

    fn run_module_phases(&mut self, module: Module) -> Result<ModuleOutput> {
        self.config.validate()?;
        let (provinces, land_use) = self.load_data()?;
        match module {
            Module::DataIngestion => Ok(ModuleOutput::DataIngestion {
                provinces,
                land_use,
            }),
            Module::SpatialAnalysis => Ok(ModuleOutput::SpatialAnalysis(
                self.analyze(&provinces, &land_use)?,
            )),
            Module::MapComparison => {
                let geocoder = self.geocoder.as_ref().ok_or_else(|| {
                    IgtError::InvalidArgument(format!(
                        "Map comparison requires an API key, set analysis.google_api_key or {}",
                        crate::config::GOOGLE_API_KEY_ENV
                    ))
                })?;
                Ok(ModuleOutput::MapComparison(
                    self.compare(geocoder.as_ref(), &provinces)?,
                ))
            }
            Module::Database => {
                if self.store.is_none() {
                    return Err(IgtError::InvalidArgument(
                        "Database module requires database.enabled".to_string(),
                    ));
                }
                self.persist(&provinces, &land_use)?;
                Ok(ModuleOutput::Database {
                    tables: vec![PROVINCES_TABLE.to_string(), LAND_USE_TABLE.to_string()],
                })
            }
        }
    }

    fn load_data(&self) -> Result<(FeatureCollection, FeatureCollection)> {
        let (provinces, land_use) = if self.config.use_sample_data {
            log::info!("Using sample data (use_sample_data = true)");
            create_sample_data()?
        } else {
            let paths = &self.config.data_paths;
            let (provinces_path, land_use_path) = match (&paths.provinces, &paths.land_use) {
                (Some(provinces_path), Some(land_use_path)) => (provinces_path, land_use_path),
                _ => {
                    return Err(IgtError::InvalidArgument(
                        "Real data loading not configured, set data_paths or use_sample_data"
                            .to_string(),
                    ))
                }
            };
            (
                load_geofile_wgs84(provinces_path, paths.provinces_layer.as_deref())?,
                load_geofile_wgs84(land_use_path, paths.land_use_layer.as_deref())?,
            )
        };
        log::info!("Loaded {} provinces", provinces.len());
        log::info!("Loaded {} land use features", land_use.len());
        log::info!("Provinces: {:?}", provinces.string_values(PROVINCE_NAME_FIELD));
        Ok((provinces, land_use))
    }

    fn target_province<'a>(&self, provinces: &'a FeatureCollection) -> Result<&'a Feature> {
        let code = &self.config.analysis.target_province;
        provinces
            .find_by_attribute(PROVINCE_CODE_FIELD, code)
            .ok_or_else(|| {
                IgtError::InvalidArgument(format!(
                    "Province '{}' not found in {} field",
                    code, PROVINCE_CODE_FIELD
                ))
            })
    }

    fn analyze(
        &self,
        provinces: &FeatureCollection,
        land_use: &FeatureCollection,
    ) -> Result<SpatialAnalysis> {
        let operation = self.config.analysis.operation;

        log::info!(
            "Overlap: {} admin areas x {} land use features",
            provinces.len(),
            land_use.len()
        );
        let overlap_summary = aggregate(provinces, land_use, &OverlapParams::default())?;
        for row in &overlap_summary.rows {
            log::info!("{:<14} {:<12} {:>12.2} ha", row.region, row.category, row.area_ha);
        }

        let target = self.target_province(provinces)?;
        let query_result = filter(land_use, &target.geometry, operation);
        log::info!(
            "Spatial query: {} land use features {} province {}",
            query_result.len(),
            operation,
            self.config.analysis.target_province
        );

        let match_count = count_matches(land_use, provinces, operation)?;
        log::info!("Pairwise '{}' matches: {}", operation, match_count);

        Ok(SpatialAnalysis {
            overlap_summary,
            query_result,
            match_count,
        })
    }

    fn compare(&self, geocoder: &dyn Geocoder, provinces: &FeatureCollection) -> Result<Comparison> {
        let place_name = &self.config.analysis.place_name;
        let target = self.target_province(provinces)?;
        let (iou, reference) = compare_with_reference(geocoder, place_name, &target.geometry)?;
        Ok(Comparison {
            service: geocoder.service_name().to_string(),
            place_name: place_name.clone(),
            iou,
            reference,
        })
    }

    fn persist(&mut self, provinces: &FeatureCollection, land_use: &FeatureCollection) -> Result<()> {
        let policy = self.config.database.if_exists;
        let store = self
            .store
            .as_mut()
            .ok_or_else(|| IgtError::Store("No spatial store configured".to_string()))?;
        store.write_collections(
            &[(PROVINCES_TABLE, provinces), (LAND_USE_TABLE, land_use)],
            policy,
        )
    }
}

fn export_outputs(
    output_dir: &Path,
    provinces: &FeatureCollection,
    land_use: &FeatureCollection,
    analysis: &SpatialAnalysis,
    comparison: Option<&Comparison>,
    target_geometry: &geo::Geometry,
) -> Result<()> {
    fs::create_dir_all(output_dir).map_err(|err| {
        IgtError::Store(format!("Could not create output dir {:?}, {}", output_dir, err))
    })?;

    let geopackage_filepath = output_dir.join("igt_analysis.gpkg");
    let mut store = if geopackage_filepath.exists() {
        GdalStore::open(&geopackage_filepath)?
    } else {
        GdalStore::create_geopackage(&geopackage_filepath)?
    };
    store.write_collections(
        &[(PROVINCES_TABLE, provinces), (LAND_USE_TABLE, land_use)],
        ConflictPolicy::Replace,
    )?;

    write_collection_to_geojson(&analysis.query_result, &output_dir.join("query_result.geojson"))?;

    if let Some(comparison) = comparison {
        let layers = FeatureCollection::new(
            vec![
                Feature::new_with_attributes(target_geometry.clone(), [("source", "authoritative")]),
                Feature::new_with_attributes(
                    comparison.reference.clone(),
                    [("source", comparison.service.as_str())],
                ),
            ],
            provinces.spatial_ref.clone(),
        );
        write_collection_to_geojson(&layers, &output_dir.join("comparison.geojson"))?;
    }
    Ok(())
}

fn log_failure(err: &IgtError) {
    log::error!("Pipeline execution failed: {}", err);
    let hint = match err {
        IgtError::InvalidArgument(_) => "Check the config file and command line flags",
        IgtError::Fetch(_) => "Check that the geocoding API key is valid and has quota left",
        IgtError::Store(_) => "Check that the database is running and reachable",
        IgtError::Read(_) => "Check that the data paths and layer names in the config are correct",
        IgtError::Crs(_) => "Check that the input layers have a valid CRS",
    };
    log::error!("{}", hint);
}
