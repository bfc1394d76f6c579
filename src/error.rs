use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Device does not have Bluetooth Low Energy")]
    CapabilityUnavailable,
    #[error("Bluetooth not enabled")]
    CapabilityDenied,
    #[error("Cannot start ranging: {0}")]
    ConnectFailed(String),
    #[error("Cannot stop ranging: {0}")]
    StopFailed(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No Bluetooth adapter found")]
    NoAdapter,
    #[error("Ranging service not connected")]
    NotConnected,
    #[error(transparent)]
    Btle(#[from] btleplug::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
