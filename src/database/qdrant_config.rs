use qdrant_client::{config::QdrantConfig, Qdrant};
use std::time::Duration;
use tracing::info;

use crate::error::{RagError, Result};

/// Normalise a user supplied Qdrant URL to the gRPC endpoint.
///
/// Accepts bare `host:port` as well as `http(s)://host:port`; the REST port 6333
/// is swapped for the gRPC port 6334.
pub fn grpc_url(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", url),
    };
    let rest = rest.trim_end_matches('/');

    let rest = match rest.strip_suffix(":6333") {
        Some(host) => format!("{}:6334", host),
        None => rest.to_string(),
    };

    format!("{}://{}", scheme, rest)
}

/// Build a Qdrant client. The gRPC channel connects lazily on first use.
pub fn create_qdrant_client(url: &str, api_key: Option<String>) -> Result<Qdrant> {
    let url = grpc_url(url);
    info!(url = %url, "creating qdrant client");

    let mut config = QdrantConfig::from_url(&url);
    config.check_compatibility = false;
    config.timeout = Duration::from_secs(30);
    config.connect_timeout = Duration::from_secs(10);
    config.api_key = api_key;

    Qdrant::new(config).map_err(|e| RagError::Config(format!("invalid qdrant config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grpc_url_swaps_rest_port() {
        assert_eq!(grpc_url("http://localhost:6333"), "http://localhost:6334");
        assert_eq!(grpc_url("localhost:6333/"), "http://localhost:6334");
    }

    #[test]
    fn test_grpc_url_keeps_other_ports_and_scheme() {
        assert_eq!(grpc_url("https://qdrant.example.com:443"), "https://qdrant.example.com:443");
        assert_eq!(grpc_url("qdrant:6334"), "http://qdrant:6334");
    }
}
