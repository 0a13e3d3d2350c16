use thiserror::Error;

/// Every way a weather or location request can fail.
///
/// Errors are terminal for the request that produced them; a new explicit
/// call is needed to retry. They are `Clone` so they can be stored inside
/// observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error("Invalid query")]
    InvalidQuery,

    #[error("Invalid response from server")]
    InvalidResponse,

    /// Message reported by the provider in its `{ "message": ... }` error body.
    #[error("{0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    TransportError(String),

    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location is unavailable")]
    LocationUnavailable,

    #[error("Location error: {0}")]
    LocationError(String),

    #[error("Unknown location authorization status")]
    UnknownAuthorizationState,

    #[error("A location request is already in progress")]
    LocationRequestInProgress,
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs carry the API key in their query string.
        WeatherError::TransportError(err.without_url().to_string())
    }
}
