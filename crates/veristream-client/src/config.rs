//! Client configuration.

use std::time::Duration;

/// Concurrent claim pipelines allowed by default.
pub const DEFAULT_MAX_CONCURRENT_CLAIMS: usize = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the verification service, without trailing slash.
    pub base_url: String,
    /// Claims verified side by side in one batch.
    pub max_concurrent_claims: usize,
    /// Bound on each request/response call.
    pub request_timeout: Duration,
    /// Longest wait for the next chunk of a verification stream.
    pub stream_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            max_concurrent_claims: DEFAULT_MAX_CONCURRENT_CLAIMS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_idle_timeout: DEFAULT_STREAM_IDLE_TIMEOUT,
        }
    }

    pub fn with_max_concurrent_claims(mut self, n: usize) -> Self {
        self.max_concurrent_claims = n.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let cfg = ClientConfig::new("http://localhost:4000/");
        assert_eq!(cfg.base_url, "http://localhost:4000");
        assert_eq!(cfg.endpoint("/api/verify"), "http://localhost:4000/api/verify");
    }

    #[test]
    fn concurrency_never_zero() {
        let cfg = ClientConfig::default().with_max_concurrent_claims(0);
        assert_eq!(cfg.max_concurrent_claims, 1);
    }

    #[test]
    fn defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.max_concurrent_claims, 3);
        assert_eq!(cfg.stream_idle_timeout, Duration::from_secs(120));
    }
}
