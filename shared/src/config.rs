use crate::board::check_match_dimensions;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PORT: u16 = 42042;
pub const DEFAULT_AUTH_TOKEN: &str = "me key mause";
pub const DEFAULT_DIMENSION: usize = 20;

/// Settings both peers must agree on. The snapshot frame carries no header,
/// so a client configured with other dimensions cannot read the maze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub columns: usize,
    pub rows: usize,
    pub auth_token: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_DIMENSION,
            rows: DEFAULT_DIMENSION,
            auth_token: DEFAULT_AUTH_TOKEN.to_string(),
        }
    }
}

impl GameConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: GameConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_match_dimensions(self.columns, self.rows)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.auth_token.is_empty() {
            return Err(ConfigError::Invalid("auth token is empty".to_string()));
        }
        Ok(())
    }

    pub fn token_bytes(&self) -> &[u8] {
        self.auth_token.as_bytes()
    }
}
