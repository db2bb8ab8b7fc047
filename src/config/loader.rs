//! Configuration loading: project config file, stage config files, and
//! the launcher's environment payload.
//!
//! Every stage config file is optional; an absent file yields the
//! config type's default. A present but unparsable file is a fatal
//! configuration error, raised before any stage runs.

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::{BuildConfig, RawOptions};

/// Configuration loading error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// Malformed JSON in the launcher's option payload
    #[error("Failed to parse build options: {0}")]
    Options(#[from] serde_json::Error),
    /// Unknown style plugin name in the plugin config
    #[error("Unknown style plugin '{0}'")]
    UnknownPlugin(String),
    /// Invalid options for a known style plugin
    #[error("Invalid options for style plugin '{name}': {reason}")]
    PluginOptions { name: String, reason: String },
}

/// A stage configuration that is either a plain value or a factory over
/// the resolved build configuration.
///
/// File-loaded configs are always `Static`; factories come from the
/// library API and are resolved once at load time.
pub enum ConfigSource<T> {
    Static(T),
    Factory(Box<dyn Fn(&BuildConfig) -> T>),
}

impl<T: Clone> ConfigSource<T> {
    /// Resolve to a concrete configuration value.
    pub fn resolve(&self, config: &BuildConfig) -> T {
        match self {
            ConfigSource::Static(value) => value.clone(),
            ConfigSource::Factory(factory) => factory(config),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ConfigSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Static(value) => f.debug_tuple("Static").field(value).finish(),
            ConfigSource::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Load a TOML config file, defaulting when the file is absent.
pub fn load_toml_or_default<T>(path: &Path) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Load the project config file, if present.
///
/// The file declares the same fields as the CLI flags and serves as a
/// per-project default layer underneath them.
pub fn load_project_config(path: &Path) -> Result<Option<RawOptions>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&contents)?))
}

/// Merge project-config defaults underneath CLI/launcher options.
///
/// A field set on `options` always wins over the file value.
pub fn merge_project_config(options: RawOptions, file: Option<RawOptions>) -> RawOptions {
    let Some(file) = file else {
        return options;
    };
    RawOptions {
        root: options.root.or(file.root),
        src: options.src.or(file.src),
        out: options.out.or(file.out),
        esm_config: options.esm_config.or(file.esm_config),
        babel_config: options.babel_config.or(file.babel_config),
        postcss_config: options.postcss_config.or(file.postcss_config),
        less_config: options.less_config.or(file.less_config),
        scss_config: options.scss_config.or(file.scss_config),
        alias_config: options.alias_config.or(file.alias_config),
        ignore: options.ignore.or(file.ignore),
        typescript: options.typescript.or(file.typescript),
        disable_compile_styles: options.disable_compile_styles.or(file.disable_compile_styles),
        disable_clean: options.disable_clean.or(file.disable_clean),
        sourcemap: options.sourcemap.or(file.sourcemap),
        command_prefix: options.command_prefix.or(file.command_prefix),
    }
}

/// Parse the launcher's JSON option payload.
///
/// Malformed JSON is a fatal configuration error.
pub fn parse_env_options(payload: &str) -> Result<RawOptions, ConfigError> {
    Ok(serde_json::from_str(payload)?)
}

/// The default project config file name, resolved against the root.
pub const PROJECT_CONFIG_FILE: &str = "esm-project.config.toml";

/// Locate the project config file for a raw option set.
pub fn project_config_path(raw: &RawOptions, root_dir: &Path) -> std::path::PathBuf {
    match &raw.esm_config {
        Some(path) if Path::new(path).is_absolute() => Path::new(path).to_path_buf(),
        Some(path) => root_dir.join(path),
        None => root_dir.join(PROJECT_CONFIG_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ScriptConfig;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml_or_default_absent_file() {
        let temp = TempDir::new().unwrap();
        let config: ScriptConfig =
            load_toml_or_default(&temp.path().join("babel.config.toml")).unwrap();
        assert_eq!(config, ScriptConfig::default());
    }

    #[test]
    fn test_load_toml_or_default_present_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("babel.config.toml");
        File::create(&path)
            .unwrap()
            .write_all(b"presets = [\"env\", \"react\"]\nplugins = [\"runtime\"]")
            .unwrap();

        let config: ScriptConfig = load_toml_or_default(&path).unwrap();
        assert_eq!(config.presets, vec!["env", "react"]);
        assert_eq!(config.plugins, vec!["runtime"]);
    }

    #[test]
    fn test_load_toml_or_default_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("babel.config.toml");
        File::create(&path).unwrap().write_all(b"not valid toml {{{").unwrap();

        let result: Result<ScriptConfig, _> = load_toml_or_default(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_merge_project_config_cli_wins() {
        let cli = RawOptions { out: Some("dist".to_string()), ..Default::default() };
        let file = RawOptions {
            out: Some("esm".to_string()),
            typescript: Some(true),
            ..Default::default()
        };

        let merged = merge_project_config(cli, Some(file));
        assert_eq!(merged.out.as_deref(), Some("dist"));
        assert_eq!(merged.typescript, Some(true));
    }

    #[test]
    fn test_merge_project_config_no_file() {
        let cli = RawOptions { src: Some("lib".to_string()), ..Default::default() };
        let merged = merge_project_config(cli.clone(), None);
        assert_eq!(merged, cli);
    }

    #[test]
    fn test_load_project_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(PROJECT_CONFIG_FILE);
        File::create(&path)
            .unwrap()
            .write_all(b"out = \"dist\"\ntypescript = true\nsourcemap = true")
            .unwrap();

        let loaded = load_project_config(&path).unwrap().unwrap();
        assert_eq!(loaded.out.as_deref(), Some("dist"));
        assert_eq!(loaded.typescript, Some(true));
        assert_eq!(loaded.sourcemap, Some(true));
    }

    #[test]
    fn test_parse_env_options() {
        let options = parse_env_options(r#"{"src":"lib","typescript":true}"#).unwrap();
        assert_eq!(options.src.as_deref(), Some("lib"));
        assert_eq!(options.typescript, Some(true));

        assert!(matches!(parse_env_options("{broken"), Err(ConfigError::Options(_))));
    }

    #[test]
    fn test_config_source_resolution() {
        let temp = TempDir::new().unwrap();
        let raw = RawOptions {
            root: Some(temp.path().display().to_string()),
            ..Default::default()
        };
        let config = BuildConfig::resolve(&raw);

        let fixed = ConfigSource::Static(ScriptConfig {
            presets: vec!["env".to_string()],
            plugins: vec![],
        });
        assert_eq!(fixed.resolve(&config).presets, vec!["env"]);

        let factory: ConfigSource<ScriptConfig> = ConfigSource::Factory(Box::new(|config| {
            ScriptConfig {
                presets: vec![if config.typescript { "ts" } else { "env" }.to_string()],
                plugins: vec![],
            }
        }));
        assert_eq!(factory.resolve(&config).presets, vec!["env"]);
    }

    #[test]
    fn test_project_config_path() {
        let raw = RawOptions::default();
        let path = project_config_path(&raw, Path::new("/project"));
        assert_eq!(path, Path::new("/project/esm-project.config.toml"));

        let raw = RawOptions { esm_config: Some("conf/esm.toml".to_string()), ..raw };
        assert_eq!(project_config_path(&raw, Path::new("/project")), Path::new("/project/conf/esm.toml"));
    }
}
