//! Device location lookup with a fallback map region.

use std::future::Future;

use quickbucks_proto::task::Coordinates;

/// Map centre used when the device position is unavailable.
pub const DEFAULT_ORIGIN: Coordinates = Coordinates::new(37.78825, -122.4324);

/// Errors reported by a location provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The user refused location access.
    #[error("location permission denied")]
    PermissionDenied,

    /// The position lookup failed.
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Foreground location access.
pub trait LocationProvider: Send + Sync {
    /// Asks for permission and returns the current position.
    fn current_position(&self) -> impl Future<Output = Result<Coordinates, DeviceError>> + Send;
}

/// A provider reporting a fixed answer.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticLocation(pub Result<Coordinates, DeviceError>);

impl LocationProvider for StaticLocation {
    async fn current_position(&self) -> Result<Coordinates, DeviceError> {
        self.0.clone()
    }
}

/// The device position, or [`DEFAULT_ORIGIN`] if it cannot be read.
pub async fn resolve_origin<L: LocationProvider>(provider: &L) -> Coordinates {
    match provider.current_position().await {
        Ok(position) => position,
        Err(err) => {
            tracing::warn!(error = %err, "using default map region");
            DEFAULT_ORIGIN
        }
    }
}
