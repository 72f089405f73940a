//! Sidecar-backed implementation of the shared `chat_backend` contract.
//!
//! This adapter forwards `sidecar_api` stream fragments onto a
//! [`FragmentBus`] and maps transport failures to [`BackendError`]s whose
//! messages are shown to the user verbatim.

pub mod process;

use std::sync::Arc;
use std::time::Duration;

use chat_backend::{
    BackendError, BackendFuture, BackendProfile, ChatBackend, FragmentBus, FragmentStream,
};
use chat_transcript::Fragment;
use futures_util::future::BoxFuture;
use sidecar_api::{ChatStreamEnd, SidecarApiConfig, SidecarApiError, SidecarClient};
use tracing::debug;

pub use sidecar_api::{Settings, DEFAULT_SIDECAR_BASE_URL, DEFAULT_SIDECAR_PORT};

pub use crate::process::{
    SidecarLaunch, SidecarLocator, SidecarProcess, SidecarProcessError, SIDECAR_BINARY_NAME,
};

/// Stable backend identifier used by `chat_client` startup selection.
pub const SIDECAR_BACKEND_ID: &str = "sidecar";

/// Runtime configuration for the sidecar backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarBackendConfig {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for SidecarBackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SIDECAR_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

impl SidecarBackendConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn into_api_config(self) -> SidecarApiConfig {
        let config = SidecarApiConfig::new().with_base_url(self.base_url);
        match self.timeout {
            Some(timeout) => config.with_timeout(timeout),
            None => config,
        }
    }
}

type FragmentSink<'a> = &'a mut (dyn FnMut(Fragment) + Send);

trait SidecarTransport: Send + Sync {
    fn stream_chat<'a>(
        &'a self,
        message: &'a str,
        on_fragment: FragmentSink<'a>,
    ) -> BoxFuture<'a, Result<ChatStreamEnd, SidecarApiError>>;

    fn confirm(&self, approved: bool) -> BoxFuture<'_, Result<(), SidecarApiError>>;

    fn reset(&self) -> BoxFuture<'_, Result<(), SidecarApiError>>;

    fn settings(&self) -> BoxFuture<'_, Result<Settings, SidecarApiError>>;
}

#[derive(Debug)]
struct HttpTransport {
    client: SidecarClient,
}

impl SidecarTransport for HttpTransport {
    fn stream_chat<'a>(
        &'a self,
        message: &'a str,
        on_fragment: FragmentSink<'a>,
    ) -> BoxFuture<'a, Result<ChatStreamEnd, SidecarApiError>> {
        Box::pin(self.client.stream_chat(message, on_fragment))
    }

    fn confirm(&self, approved: bool) -> BoxFuture<'_, Result<(), SidecarApiError>> {
        Box::pin(async move { self.client.confirm(approved).await.map(|_| ()) })
    }

    fn reset(&self) -> BoxFuture<'_, Result<(), SidecarApiError>> {
        Box::pin(async move { self.client.reset().await.map(|_| ()) })
    }

    fn settings(&self) -> BoxFuture<'_, Result<Settings, SidecarApiError>> {
        Box::pin(self.client.settings())
    }
}

/// `ChatBackend` adapter backed by `sidecar_api` transport primitives.
pub struct SidecarBackend {
    transport: Arc<dyn SidecarTransport>,
    bus: FragmentBus,
    endpoint: String,
    process: Option<SidecarProcess>,
}

impl SidecarBackend {
    /// Creates a backend using real HTTP transport.
    pub fn new(config: SidecarBackendConfig) -> Result<Self, BackendError> {
        let endpoint = config.base_url.clone();
        let client = SidecarClient::new(config.into_api_config()).map_err(map_init_error)?;

        Ok(Self {
            transport: Arc::new(HttpTransport { client }),
            bus: FragmentBus::new(),
            endpoint,
            process: None,
        })
    }

    /// Ties a supervised sidecar process to this backend; it is stopped when
    /// the backend is dropped.
    #[must_use]
    pub fn with_process(mut self, process: SidecarProcess) -> Self {
        self.process = Some(process);
        self
    }

    pub fn process(&self) -> Option<&SidecarProcess> {
        self.process.as_ref()
    }

    /// Executor settings as currently held by the sidecar.
    pub async fn settings(&self) -> Result<Settings, BackendError> {
        self.transport.settings().await.map_err(map_transport_error)
    }

    #[cfg(test)]
    fn with_transport_for_tests(transport: Arc<dyn SidecarTransport>) -> Self {
        Self {
            transport,
            bus: FragmentBus::new(),
            endpoint: DEFAULT_SIDECAR_BASE_URL.to_string(),
            process: None,
        }
    }
}

impl ChatBackend for SidecarBackend {
    fn profile(&self) -> BackendProfile {
        BackendProfile {
            backend_id: SIDECAR_BACKEND_ID.to_string(),
            endpoint: Some(self.endpoint.clone()),
        }
    }

    fn subscribe_fragments(&self) -> FragmentStream {
        self.bus.subscribe()
    }

    fn request_completion(&self, message: String) -> BackendFuture<'_> {
        Box::pin(async move {
            let bus = &self.bus;
            let mut publish = |fragment: Fragment| {
                bus.publish(fragment);
            };

            let end = self
                .transport
                .stream_chat(&message, &mut publish)
                .await
                .map_err(map_transport_error)?;
            debug!(?end, "sidecar turn finished");
            Ok(())
        })
    }

    fn notify_confirmation(&self, approved: bool) -> BackendFuture<'_> {
        Box::pin(async move {
            self.transport
                .confirm(approved)
                .await
                .map_err(map_transport_error)
        })
    }

    fn reset_conversation(&self) -> BackendFuture<'_> {
        Box::pin(async move { self.transport.reset().await.map_err(map_transport_error) })
    }
}

fn map_transport_error(error: SidecarApiError) -> BackendError {
    BackendError::new(error.to_string())
}

fn map_init_error(error: SidecarApiError) -> BackendError {
    BackendError::new(format!("Failed to initialize sidecar backend: {error}"))
}
