//! Unified error handling for the area-map library.
//!
//! The pure geometry functions (distance, clustering, consolidation) never
//! return errors for normal-range numeric input; everything in this module
//! originates at the external boundaries (location API, routing service) or
//! in engine orchestration.

use std::fmt;

/// Unified error type for area-map operations.
#[derive(Debug, Clone)]
pub enum AreaMapError {
    /// Input contained coordinates outside WGS84 range or non-finite values
    InvalidCoordinates {
        context: String,
        message: String,
    },
    /// HTTP/API error from the location source
    Http {
        message: String,
        status_code: Option<u16>,
    },
    /// Road-routing service failure (absorbed by the straight-line fallback)
    Routing { message: String },
    /// Configuration error
    Config { message: String },
    /// Generic internal error
    Internal { message: String },
}

impl fmt::Display for AreaMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AreaMapError::InvalidCoordinates { context, message } => {
                write!(f, "Invalid coordinates in {}: {}", context, message)
            }
            AreaMapError::Http {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "HTTP error ({}): {}", code, message)
                } else {
                    write!(f, "HTTP error: {}", message)
                }
            }
            AreaMapError::Routing { message } => {
                write!(f, "Routing error: {}", message)
            }
            AreaMapError::Config { message } => {
                write!(f, "Configuration error: {}", message)
            }
            AreaMapError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for AreaMapError {}

/// Result type alias for area-map operations.
pub type Result<T> = std::result::Result<T, AreaMapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AreaMapError::Http {
            message: "service unavailable".to_string(),
            status_code: Some(503),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("service unavailable"));
    }

    #[test]
    fn test_routing_display() {
        let err = AreaMapError::Routing {
            message: "no route found".to_string(),
        };
        assert_eq!(err.to_string(), "Routing error: no route found");
    }
}
