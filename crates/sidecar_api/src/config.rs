use std::time::Duration;

/// Port the sidecar listens on unless told otherwise.
pub const DEFAULT_SIDECAR_PORT: u16 = 39821;

/// Base URL of a sidecar on the default port.
pub const DEFAULT_SIDECAR_BASE_URL: &str = "http://127.0.0.1:39821";

/// Transport configuration for sidecar requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarApiConfig {
    /// Base URL endpoints are joined onto.
    pub base_url: String,
    /// Optional per-request timeout. `None` waits indefinitely, which includes
    /// the whole lifetime of a streamed turn.
    pub timeout: Option<Duration>,
}

impl Default for SidecarApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SIDECAR_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

impl SidecarApiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for a sidecar on the loopback interface at `port`.
    pub fn for_port(port: u16) -> Self {
        Self::default().with_base_url(format!("http://127.0.0.1:{port}"))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
