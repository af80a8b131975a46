//! Config path resolution

use std::path::PathBuf;

/// Default engine config location under the user config dir
///
/// Falls back to the current directory when no config dir exists (e.g.
/// stripped-down containers).
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("strand")
        .join("engine.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_ends_with_engine_yaml() {
        let path = default_config_path();
        assert!(path.ends_with("strand/engine.yaml"));
    }
}
