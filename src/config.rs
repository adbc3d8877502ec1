use serde::{Deserialize, Serialize};

/// Per-session engine configuration.
///
/// Deserializable so a host can pass it as the options argument of `open`.
/// Missing fields take their defaults.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Enforce foreign key constraints.
    pub foreign_keys: bool,
    /// SQL run once after the session is opened.
    pub init_script: Option<String>,
    /// Serialized database file copied into the session on open.
    pub image: Option<Vec<u8>>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn with_init_script(mut self, script: impl Into<String>) -> Self {
        self.init_script = Some(script.into());
        self
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }
}
