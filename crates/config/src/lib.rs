//! Layered configuration for foldr.
//!
//! Sources, lowest precedence first:
//!
//! 1. Compiled-in defaults
//! 2. `config.toml`, `config.yaml` and `config.json` in the platform
//!    configuration directory (e.g. `~/.config/foldr` on Linux)
//! 3. A file given explicitly, format picked from its extension
//! 4. `FOLDR_*` environment variables (`FOLDR_SEPARATOR`, `FOLDR_LOG`, ...)

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use foldr_pipeline::Precision;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "FOLDR_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Joins the parts of a composite `{group}` key
    pub separator: String,
    /// Format of date predicate arguments, in `time` format description syntax
    pub date_format: String,
    /// Default timestamp precision: `s`, `m`, `h` or `d`
    pub precision: String,
    /// Base log filter, overridden by `-v` and `RUST_LOG`
    pub log: String,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            separator: " ".to_string(),
            date_format: "[day]/[month]/[year]".to_string(),
            precision: "d".to_string(),
            log: "warn".to_string(),
        }
    }
}
impl Config {
    /// Load every layer, using the platform configuration directory.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_from(Self::dir().as_deref(), file)
    }

    /// Load every layer, reading the per-user files from `dir`.
    pub fn load_from(dir: Option<&Path>, file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dir) = dir {
            tracing::debug!(dir = %dir.display(), "reading configuration directory");
            figment = figment
                .merge(Toml::file(dir.join("config.toml")))
                .merge(Yaml::file(dir.join("config.yaml")))
                .merge(Json::file(dir.join("config.json")));
        }
        if let Some(file) = file {
            if !file.is_file() {
                exn::bail!(ErrorKind::NotFound(file.to_path_buf()));
            }
            figment = match file.extension().and_then(|e| e.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(file)),
                Some("json") => figment.merge(Json::file_exact(file)),
                _ => figment.merge(Toml::file_exact(file)),
            };
        }
        let config: Config = figment.merge(Env::prefixed(ENV_PREFIX)).extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.precision()?;
        if let Err(err) = time::format_description::parse_borrowed::<2>(&self.date_format) {
            exn::bail!(ErrorKind::Invalid("date_format", err.to_string()));
        }
        if self.separator.contains(['/', '\\', '\0']) {
            exn::bail!(ErrorKind::Invalid("separator", "must not contain path separators".into()));
        }
        Ok(())
    }

    pub fn precision(&self) -> Result<Precision> {
        self.precision
            .parse::<Precision>()
            .or_raise(|| ErrorKind::Invalid("precision", format!("'{}' is not one of s, m, h, d", self.precision)))
    }

    /// Platform configuration directory, if the platform has one.
    pub fn dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "foldr").map(|dirs| dirs.config_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    #[test]
    fn test_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(Some(dir.path()), None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.precision().unwrap(), Precision::Days);
    }

    #[rstest]
    #[case("config.toml", "separator = \"_\"\nprecision = \"h\"\n")]
    #[case("config.yaml", "separator: _\nprecision: h\n")]
    #[case("config.json", r#"{"separator": "_", "precision": "h"}"#)]
    fn test_directory_files(#[case] name: &str, #[case] contents: &str) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(name), contents).unwrap();
        let config = Config::load_from(Some(dir.path()), None).unwrap();
        assert_eq!(config.separator, "_");
        assert_eq!(config.precision().unwrap(), Precision::Hours);
        assert_eq!(config.log, "warn");
    }

    #[test]
    fn test_explicit_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.toml"), "separator = \"_\"\nlog = \"info\"\n").unwrap();
        let explicit = dir.path().join("override.yml");
        fs::write(&explicit, "separator: \"-\"\n").unwrap();
        let config = Config::load_from(Some(dir.path()), Some(&explicit)).unwrap();
        assert_eq!(config.separator, "-");
        assert_eq!(config.log, "info");
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(None, Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[rstest]
    #[case("precision = \"weeks\"\n")]
    #[case("date_format = \"[day\"\n")]
    #[case("separator = \"a/b\"\n")]
    fn test_invalid_values(#[case] contents: &str) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.toml"), contents).unwrap();
        let err = Config::load_from(Some(dir.path()), None).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(..)));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.toml"), "separator = ").unwrap();
        let err = Config::load_from(Some(dir.path()), None).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load));
    }
}
