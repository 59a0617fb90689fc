//! ---
//! chaos_section: "02-cluster-interfaces"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Cluster control API contract and HTTP client."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use reqwest::StatusCode;

/// Errors surfaced by the cluster control API.
///
/// The distinction that matters to callers is [`ClusterError::is_unavailable`]:
/// an unavailable operation means "try the next fallback method", while other
/// variants indicate the method was reachable but the call itself failed.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// The API surface is missing or forbidden (RBAC denial, disabled API
    /// group, version mismatch). Drives fallback selection.
    #[error("cluster API unavailable for {operation}: {reason}")]
    Unavailable {
        /// Operation that was attempted.
        operation: String,
        /// Human readable cause.
        reason: String,
    },
    /// The named resource does not exist.
    #[error("{operation}: resource not found")]
    NotFound {
        /// Operation that was attempted.
        operation: String,
    },
    /// Transport-level failure (timeout, connection reset, TLS).
    #[error("cluster API request failed for {operation}: {reason}")]
    Request {
        /// Operation that was attempted.
        operation: String,
        /// Human readable cause.
        reason: String,
    },
    /// The API answered with a body we could not interpret.
    #[error("unexpected cluster API response for {operation}: {reason}")]
    Decode {
        /// Operation that was attempted.
        operation: String,
        /// Human readable cause.
        reason: String,
    },
}

impl ClusterError {
    /// True when the failing operation should be treated as "this fallback
    /// method is not available here", not as a hard error.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ClusterError::Unavailable { .. } | ClusterError::NotFound { .. }
        )
    }

    /// Classify a non-success HTTP status returned by the API server.
    pub fn from_status(operation: &str, status: StatusCode, body: &str) -> Self {
        let reason = if body.trim().is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), truncate(body, 200))
        };
        match status {
            StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::METHOD_NOT_ALLOWED
            | StatusCode::NOT_IMPLEMENTED => ClusterError::Unavailable {
                operation: operation.to_owned(),
                reason,
            },
            StatusCode::NOT_FOUND => ClusterError::NotFound {
                operation: operation.to_owned(),
            },
            _ => ClusterError::Request {
                operation: operation.to_owned(),
                reason,
            },
        }
    }

    /// Classify a transport error from the HTTP client.
    pub fn from_transport(operation: &str, err: reqwest::Error) -> Self {
        if err.is_connect() {
            // An unreachable API server means no method needing it can work.
            ClusterError::Unavailable {
                operation: operation.to_owned(),
                reason: err.to_string(),
            }
        } else {
            ClusterError::Request {
                operation: operation.to_owned(),
                reason: err.to_string(),
            }
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_owned()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_maps_to_unavailable() {
        let err = ClusterError::from_status("delete pod", StatusCode::FORBIDDEN, "");
        assert!(err.is_unavailable());
    }

    #[test]
    fn not_found_counts_as_unavailable() {
        let err = ClusterError::from_status("patch scale", StatusCode::NOT_FOUND, "");
        assert!(err.is_unavailable());
    }

    #[test]
    fn server_error_is_not_unavailable() {
        let err =
            ClusterError::from_status("list pods", StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(!err.is_unavailable());
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(500);
        let err = ClusterError::from_status("list pods", StatusCode::BAD_REQUEST, &body);
        assert!(err.to_string().len() < 300);
    }
}
