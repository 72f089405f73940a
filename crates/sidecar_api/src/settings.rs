use serde::{Deserialize, Serialize};

/// Executor settings as exposed by `GET /settings` and accepted by
/// `POST /settings`. Persisted by the sidecar, never by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub api_key: String,
    pub api_base: String,
    /// Run proposed code without asking for confirmation.
    pub auto_run: bool,
    pub custom_instructions: String,
    pub context_window: u32,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            api_key: String::new(),
            api_base: String::new(),
            auto_run: false,
            custom_instructions: String::new(),
            context_window: 128_000,
            max_tokens: 4096,
            temperature: 0.0,
        }
    }
}
