use thiserror::Error;

/// Failures of the external geocoding service.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("Request to geocoding service failed: {0}")]
    Network(String),

    #[error("No geocoding match found for '{0}'")]
    NoMatch(String),

    #[error("Geocoding quota exceeded: {0}")]
    RateLimited(String),

    #[error("Geocoding request denied: {0}")]
    Denied(String),

    #[error("Unexpected geocoding response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum IgtError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Spatial store error: {0}")]
    Store(String),

    #[error("Could not read geodata: {0}")]
    Read(String),

    #[error("CRS error: {0}")]
    Crs(String),
}

pub type Result<T> = std::result::Result<T, IgtError>;

impl From<proj::ProjCreateError> for IgtError {
    fn from(err: proj::ProjCreateError) -> Self {
        IgtError::Crs(format!("Could not create projection, {}", err))
    }
}

impl From<proj::ProjError> for IgtError {
    fn from(err: proj::ProjError) -> Self {
        IgtError::Crs(format!("Could not project geometry, {}", err))
    }
}
