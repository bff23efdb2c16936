//! Engine configuration.
//!
//! Settings come from an optional TOML file layered under `QUILL_*`
//! environment variables. Nested keys are joined with `__`, so
//! `QUILL_ENGINE__MAX_IMAGE_DIMENSION=800` sets `engine.max_image_dimension`.

use std::{path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Default bound on either side of a staged image, in pixels.
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 1200;

const ENV_PREFIX: &str = "QUILL";

/// The file at `path` (if present) overlaid with the environment.
pub fn layered(path: &Path) -> Result<Config, ConfigError> {
  Config::builder()
    .add_source(File::from(path).required(false))
    .add_source(
      Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
}

/// The `[engine]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Staged images are downsampled until neither side exceeds this.
  pub max_image_dimension: u32,
  /// Upper bound on a single blob upload.
  pub upload_timeout_secs: u64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
      upload_timeout_secs: 30,
    }
  }
}

impl EngineConfig {
  pub fn upload_timeout(&self) -> Duration {
    Duration::from_secs(self.upload_timeout_secs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_leaves_engine_table_absent() {
    let path = std::env::temp_dir().join("quill-engine-absent-config.toml");
    let settings = layered(&path).unwrap();
    assert!(matches!(
      settings.get::<EngineConfig>("engine"),
      Err(ConfigError::NotFound(_))
    ));
    assert_eq!(EngineConfig::default().upload_timeout(), Duration::from_secs(30));
  }

  #[test]
  fn engine_table_overrides_defaults() {
    let path = std::env::temp_dir().join(format!(
      "quill-engine-config-{}.toml",
      std::process::id()
    ));
    std::fs::write(&path, "store_path = \"q.db\"\n\n[engine]\nmax_image_dimension = 640\n")
      .unwrap();

    let settings = layered(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let cfg: EngineConfig = settings.get("engine").unwrap();
    assert_eq!(cfg.max_image_dimension, 640);
    assert_eq!(cfg.upload_timeout_secs, 30);
    assert_eq!(settings.get_string("store_path").unwrap(), "q.db");
  }
}
