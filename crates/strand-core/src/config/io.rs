//! Generic YAML config loading/saving

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load a config, falling back to defaults on any failure
///
/// A missing or malformed file is not fatal - the app starts with
/// defaults and logs what happened.
pub fn load_config<T: DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("failed to parse {}: {}, using defaults", path.display(), e);
                T::default()
            }
        },
        Err(e) => {
            log::info!("no config at {} ({}), using defaults", path.display(), e);
            T::default()
        }
    }
}

/// Save a config, creating parent directories as needed
pub fn save_config<T: Serialize>(config: &T, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, yaml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join("strand-config-test");
        let path = dir.join("engine.yaml");
        let _ = std::fs::remove_file(&path);

        let mut config = EngineConfig::default();
        config.bpm = 93.0;
        save_config(&config, &path).unwrap();

        let loaded: EngineConfig = load_config(&path);
        assert_eq!(loaded.bpm, 93.0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let loaded: EngineConfig = load_config(Path::new("/nonexistent/strand.yaml"));
        assert_eq!(loaded.bpm, EngineConfig::default().bpm);
    }
}
