use crate::config::ConfigError;
use crate::marketplace::domain::ValidationError;
use crate::marketplace::repository::RepositoryError;
use crate::marketplace::session::AccessError;
use crate::marketplace::verification::VerificationError;
use crate::telemetry::TelemetryError;
use std::fmt;

/// Coarse classification callers use to pick a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Storage,
}

/// Error returned by every façade operation. None of them are fatal; the collections are left
/// as they were and the user can retry with corrected input.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl MarketplaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketplaceError::Validation(_)
            | MarketplaceError::Verification(VerificationError::Invalid(_)) => {
                ErrorKind::Validation
            }
            MarketplaceError::Verification(VerificationError::NoSuchPendingRequest(_)) => {
                ErrorKind::NotFound
            }
            MarketplaceError::Verification(
                VerificationError::AlreadyPending(_) | VerificationError::AlreadyVerified(_),
            ) => ErrorKind::Conflict,
            MarketplaceError::Access(_) => ErrorKind::Unauthorized,
            MarketplaceError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Start-up failures for an embedding process.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Marketplace(MarketplaceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Marketplace(err) => write!(f, "marketplace error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Marketplace(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<MarketplaceError> for AppError {
    fn from(value: MarketplaceError) -> Self {
        Self::Marketplace(value)
    }
}
