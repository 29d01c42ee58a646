// src/network/mod.rs
//! Network communication components
//!
//! Typed HTTP clients for the two kinds of process in the cluster:
//! - `WorkerClient`: used by the master to start, cancel and health-check workers
//! - `MasterClient`: used by workers (and tools) to register and report solutions

use crate::utils::error::PowError;
use url::Url;

/// Client for a worker's HTTP endpoints
pub mod worker_client;

/// Client for the master's HTTP endpoints
pub mod master_client;

// Re-export main components for cleaner imports
pub use master_client::{MasterClient, report_solution};
pub use worker_client::WorkerClient;

/// Parses a base address such as `http://host:8080`
///
/// Only `http` and `https` with a host are accepted.
pub fn parse_base(address: &str) -> Result<Url, PowError> {
    let url = Url::parse(address.trim())
        .map_err(|e| PowError::InputError(format!("invalid address {:?}: {}", address, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(PowError::InputError(format!(
            "expected an http(s) address with a host, got {:?}",
            address
        )));
    }
    Ok(url)
}

/// Appends `path` to the base address, keeping any existing path prefix
pub fn endpoint(base: &str, path: &str) -> Result<Url, PowError> {
    let mut url = parse_base(base)?;
    url.path_segments_mut()
        .map_err(|_| PowError::InputError(format!("{:?} cannot be used as a base", base)))?
        .pop_if_empty()
        .push(path);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_path() {
        assert_eq!(
            endpoint("http://localhost:8080", "start").unwrap().as_str(),
            "http://localhost:8080/start"
        );
        assert_eq!(
            endpoint("http://localhost:8080/", "cancel").unwrap().as_str(),
            "http://localhost:8080/cancel"
        );
        assert_eq!(
            endpoint("http://gw/pow", "health-check").unwrap().as_str(),
            "http://gw/pow/health-check"
        );
    }

    #[test]
    fn base_must_be_http_with_host() {
        assert!(parse_base("localhost:8080").is_err());
        assert!(parse_base("ftp://host").is_err());
        assert!(parse_base("not a url").is_err());
        assert!(parse_base("https://worker-1:9000").is_ok());
    }
}
