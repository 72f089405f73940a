use std::sync::Arc;
use std::time::Duration;

use chat_backend::ChatBackend;
use chat_backend_mock::{MockBackend, MOCK_BACKEND_ID};
use chat_backend_sidecar::{
    SidecarBackend, SidecarBackendConfig, SidecarLocator, SidecarProcess, Settings,
    SIDECAR_BACKEND_ID,
};
use tracing::info;

use crate::config::ClientConfig;

/// Pause between mock tokens so the demo visibly streams.
pub const MOCK_TOKEN_DELAY: Duration = Duration::from_millis(30);

/// Builds the configured backend, launching a supervised sidecar first when
/// `spawn_sidecar` is set.
pub async fn backend_from_config(config: &ClientConfig) -> Result<Arc<dyn ChatBackend>, String> {
    if config.backend_id == SIDECAR_BACKEND_ID && config.spawn_sidecar {
        let backend = sidecar_backend(config)?;
        let port = config.sidecar_port().map_err(|error| error.to_string())?;
        let locator = SidecarLocator::from_environment(config.sidecar_root.clone());
        let process = SidecarProcess::launch(&locator, port)
            .await
            .map_err(|error| format!("Failed to start sidecar: {error}"))?;
        info!(port, pid = ?process.id(), "using supervised sidecar");
        return Ok(Arc::new(backend.with_process(process)));
    }

    backend_for_id(&config.backend_id, config)
}

/// Builds a backend for an already running sidecar or the mock.
pub fn backend_for_id(
    backend_id: &str,
    config: &ClientConfig,
) -> Result<Arc<dyn ChatBackend>, String> {
    match backend_id {
        SIDECAR_BACKEND_ID => Ok(Arc::new(sidecar_backend(config)?)),
        MOCK_BACKEND_ID => Ok(Arc::new(
            MockBackend::new().with_token_delay(MOCK_TOKEN_DELAY),
        )),
        unknown => Err(format!(
            "Unsupported backend '{unknown}'. Available backends: {SIDECAR_BACKEND_ID}, {MOCK_BACKEND_ID}"
        )),
    }
}

/// Reads the executor settings held by the configured sidecar.
pub async fn fetch_settings(config: &ClientConfig) -> Result<Settings, String> {
    if config.backend_id != SIDECAR_BACKEND_ID {
        return Err(format!(
            "Settings are only available with the {SIDECAR_BACKEND_ID} backend."
        ));
    }
    sidecar_backend(config)?
        .settings()
        .await
        .map_err(|error| format!("Failed to read settings: {error}"))
}

fn sidecar_backend(config: &ClientConfig) -> Result<SidecarBackend, String> {
    let mut sidecar_config = SidecarBackendConfig::new().with_base_url(config.sidecar_url.clone());
    if let Some(timeout) = config.request_timeout {
        sidecar_config = sidecar_config.with_timeout(timeout);
    }
    SidecarBackend::new(sidecar_config).map_err(|error| error.to_string())
}
