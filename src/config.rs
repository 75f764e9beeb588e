use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
/// Runtime settings for the `mapping-values` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mapping CSV to load.
    pub mapping: PathBuf,
    /// `tracing` filter directive, e.g. `info` or `mapping_values=debug`.
    pub logger_level: String,
    /// Default threshold (seconds) for the `prune` command.
    pub footage_threshold: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mapping: PathBuf::from("mapping.csv"),
            logger_level: "info".to_string(),
            footage_threshold: 0,
        }
    }
}

impl Config {
    /// Read a `.json`, `.yaml` or `.yml` config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let config: Config = match ext.as_deref() {
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("parsing JSON config {:?}", path))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
                .with_context(|| format!("parsing YAML config {:?}", path))?,
            other => bail!("unsupported config extension {:?} for {:?}", other, path),
        };
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file is `Ok(None)`.
    ///
    /// Runs before logging is set up, so it logs nothing itself.
    pub fn load_if_exists<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Apply `MAPPING_PATH`, `LOG_LEVEL` and `FOOTAGE_THRESHOLD` from the
    /// process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(path) = var("MAPPING_PATH") {
            self.mapping = PathBuf::from(path);
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logger_level = level;
        }
        if let Some(raw) = var("FOOTAGE_THRESHOLD") {
            self.footage_threshold = raw
                .trim()
                .parse()
                .with_context(|| format!("FOOTAGE_THRESHOLD {:?} is not an integer", raw))?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::{collections::HashMap, io::Write};
    use tempfile::{tempdir, Builder};

    #[test]
    fn test_load_json_with_defaults() -> Result<()> {
        let mut tmp = Builder::new().suffix(".json").tempfile()?;
        tmp.write_all(br#"{"mapping": "data/mapping.csv", "footage_threshold": 600}"#)?;
        let config = Config::load(tmp.path())?;
        assert_eq!(config.mapping, PathBuf::from("data/mapping.csv"));
        assert_eq!(config.footage_threshold, 600);
        assert_eq!(config.logger_level, "info");
        Ok(())
    }

    #[test]
    fn test_load_yaml() -> Result<()> {
        let mut tmp = Builder::new().suffix(".yml").tempfile()?;
        tmp.write_all(b"logger_level: debug\nmapping: m.csv\n")?;
        let config = Config::load(tmp.path())?;
        assert_eq!(config.logger_level, "debug");
        assert_eq!(config.mapping, PathBuf::from("m.csv"));
        assert_eq!(config.footage_threshold, 0);
        Ok(())
    }

    #[test]
    fn test_unknown_extension_is_error() -> Result<()> {
        let tmp = Builder::new().suffix(".toml").tempfile()?;
        assert!(Config::load(tmp.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_load_if_exists() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(Config::load_if_exists(dir.path().join("config.json"))?, None);

        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "footage_threshold: 5\n")?;
        let config = Config::load_if_exists(&path)?.expect("file exists");
        assert_eq!(config.footage_threshold, 5);

        std::fs::write(&path, "footage_threshold: [\n")?;
        assert!(Config::load_if_exists(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_overrides() -> Result<()> {
        let vars: HashMap<&str, &str> = [
            ("MAPPING_PATH", "other.csv"),
            ("FOOTAGE_THRESHOLD", " 42 "),
        ]
        .into_iter()
        .collect();
        let config = Config::default().with_overrides(|k| vars.get(k).map(|v| v.to_string()))?;
        assert_eq!(config.mapping, PathBuf::from("other.csv"));
        assert_eq!(config.footage_threshold, 42);
        assert_eq!(config.logger_level, "info");

        let bad = Config::default()
            .with_overrides(|k| (k == "FOOTAGE_THRESHOLD").then(|| "lots".to_string()));
        assert!(bad.is_err());
        Ok(())
    }
}
