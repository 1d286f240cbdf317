use std::time::Duration;

use reqwest::header;
use reqwest::header::{HeaderMap, HeaderValue};

pub const DEFAULT_USER_AGENT: &str = "mediatools";

/**
Holds the http configuration for requests against the media backend
 */
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /**
     * Timeout for a single request, including the body
     */
    pub timeout: Duration,
    /**
     * Headers sent with every request
     */
    pub headers: HeaderMap,
}

impl Default for BackendConfig {
    /**
    Creates a default set of settings:
    * headers: { user-agent: "mediatools" }
    * timeout: 60s
     */
    fn default() -> Self {
        let mut config = BackendConfig {
            timeout: Duration::from_secs(60),
            headers: HeaderMap::new(),
        };
        config.headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(DEFAULT_USER_AGENT),
        );
        config
    }
}

impl BackendConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}
