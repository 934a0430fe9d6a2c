//! `octave.toml`: optional project configuration. CLI flags win.

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub(crate) const DEFAULT_CONFIG_FILE: &str = "octave.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    /// Directory holding `<NAME>.oct.md` schemas
    pub(crate) schema_dir: PathBuf,
    /// Root of the document store used by `write` and `serve`
    pub(crate) store_root: PathBuf,
    pub(crate) lenient: bool,
    pub(crate) fix: bool,
    pub(crate) serve: ServeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServeConfig {
    pub(crate) port: u16,
    /// Requests per minute per IP
    pub(crate) rate_limit: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            schema_dir: PathBuf::from("schemas"),
            store_root: PathBuf::from("."),
            lenient: true,
            fix: false,
            serve: ServeConfig::default(),
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        ServeConfig {
            port: 8080,
            rate_limit: 60,
        }
    }
}

impl Config {
    /// Load `path`, or `./octave.toml` when it exists, or the defaults.
    /// Relative directories resolve against the config file's directory.
    pub(crate) fn load(path: Option<&Path>) -> Result<Config, String> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|e| format!("error reading config '{}': {}", path.display(), e))?;
        let mut config: Config = toml::from_str(&text)
            .map_err(|e| format!("error parsing config '{}': {}", path.display(), e))?;
        if let Some(base) = path.parent().filter(|b| !b.as_os_str().is_empty()) {
            config.schema_dir = base.join(&config.schema_dir);
            config.store_root = base.join(&config.store_root);
        }
        tracing::debug!(config = %path.display(), "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_file_is_an_error() {
        let c = Config::load(Some(Path::new("/nonexistent/octave.toml")));
        assert!(c.is_err());
        let d = Config::default();
        assert_eq!(d.serve.port, 8080);
        assert!(d.lenient);
    }

    #[test]
    fn file_values_and_relative_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("octave.toml");
        std::fs::write(
            &path,
            "schema_dir = \"s\"\nfix = true\n[serve]\nport = 9000\n",
        )
        .unwrap();
        let c = Config::load(Some(&path)).unwrap();
        assert_eq!(c.schema_dir, dir.path().join("s"));
        assert_eq!(c.store_root, dir.path().join("."));
        assert!(c.fix);
        assert_eq!(c.serve.port, 9000);
        assert_eq!(c.serve.rate_limit, 60);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("octave.toml");
        std::fs::write(&path, "shcema_dir = \"s\"\n").unwrap();
        assert!(Config::load(Some(&path)).unwrap_err().contains("shcema_dir"));
    }
}
