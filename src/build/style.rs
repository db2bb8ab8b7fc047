//! Stylesheet stages: less, scss, and plain css.
//!
//! Each variant owns a mask and a [`Preprocessor`] seam; all variants
//! share one [`StylePlugin`] chain assembled once per process from the
//! postcss-style config file. The orchestrator never parses CSS: the
//! built-in preprocessors only rewrite alias-prefixed import specifiers
//! textually before passing the sheet through, and the built-in plugins
//! are plain textual rewrites.
//!
//! Preprocessor and plugin failures are reported and skip the offending
//! file; the stage keeps going. When style compilation is disabled the
//! variants degrade to byte-for-byte passthrough of their own masks.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::SystemTime;

use crate::build::context::BuildContext;
use crate::build::stage::{self, StageId, StageOutcome};
use crate::build::BuildError;
use crate::config::loader::{load_toml_or_default, ConfigError};
use crate::config::schema::{AliasTable, StyleConfig, StylePluginsConfig, StyleVariant};
use crate::hooks::{HookArgs, HookName};

/// A transform plugin applied to every compiled sheet, postcss-style.
pub trait StylePlugin {
    fn name(&self) -> &str;

    /// Process one sheet. Errors skip the current file.
    fn process(&self, css: String) -> Result<String, String>;
}

/// Prepends a comment banner to every sheet.
#[derive(Debug, Clone)]
pub struct BannerPlugin {
    text: String,
}

impl BannerPlugin {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl StylePlugin for BannerPlugin {
    fn name(&self) -> &str {
        "banner"
    }

    fn process(&self, css: String) -> Result<String, String> {
        Ok(format!("/* {} */\n{}", self.text, css))
    }
}

/// Strips block comments from every sheet.
#[derive(Debug, Clone, Default)]
pub struct DiscardCommentsPlugin;

impl StylePlugin for DiscardCommentsPlugin {
    fn name(&self) -> &str {
        "discard-comments"
    }

    fn process(&self, css: String) -> Result<String, String> {
        static COMMENT: OnceLock<Regex> = OnceLock::new();
        let comment =
            COMMENT.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid comment pattern"));
        Ok(comment.replace_all(&css, "").into_owned())
    }
}

/// Instantiate a named plugin from its config options.
///
/// Unknown names are a fatal configuration error.
pub fn build_plugin(name: &str, options: &toml::Value) -> Result<Box<dyn StylePlugin>, ConfigError> {
    match name {
        "banner" => Ok(Box::new(BannerPlugin::new(banner_text(options)?))),
        "discard-comments" => Ok(Box::new(DiscardCommentsPlugin)),
        other => Err(ConfigError::UnknownPlugin(other.to_string())),
    }
}

fn banner_text(options: &toml::Value) -> Result<String, ConfigError> {
    let text = match options {
        toml::Value::String(text) => Some(text.clone()),
        toml::Value::Table(table) => {
            table.get("text").and_then(|v| v.as_str()).map(str::to_string)
        }
        _ => None,
    };
    text.ok_or_else(|| ConfigError::PluginOptions {
        name: "banner".to_string(),
        reason: "expected a string or a table with a 'text' entry".to_string(),
    })
}

/// The shared plugin chain, including the `style-plugins` hook verdict.
///
/// Cached on the context for the process lifetime.
pub struct PluginChain {
    pub plugins: Vec<Box<dyn StylePlugin>>,
    /// A hook vetoed the chain; stylesheet stages that need it pause.
    pub vetoed: bool,
}

/// Assemble the plugin chain from the plugin config file and the
/// `style-plugins` hook. Called once, via [`BuildContext::plugin_chain`].
pub fn load_plugin_chain(ctx: &BuildContext) -> Result<PluginChain, ConfigError> {
    let config: StylePluginsConfig = load_toml_or_default(&ctx.config().postcss_config_file)?;
    let mut plugins = Vec::with_capacity(config.plugins.len());
    for (name, options) in &config.plugins {
        plugins.push(build_plugin(name, options)?);
    }

    let verdict = ctx.run_hook(HookName::StylePlugins, &mut HookArgs::StylePlugins {
        plugins: &mut plugins,
    });
    Ok(PluginChain { plugins, vetoed: verdict.is_skip() })
}

/// External preprocessor seam for a stylesheet variant.
pub trait Preprocessor {
    /// Render a sheet to plain css.
    ///
    /// Errors are reported and skip the current file.
    fn render(
        &self,
        source: &str,
        config: &StyleConfig,
        path: &Path,
        aliases: &AliasTable,
    ) -> Result<String, String>;
}

/// Default less renderer: alias import rewriting, sheet passed through.
#[derive(Debug, Default)]
pub struct LessPreprocessor;

impl Preprocessor for LessPreprocessor {
    fn render(
        &self,
        source: &str,
        _config: &StyleConfig,
        _path: &Path,
        aliases: &AliasTable,
    ) -> Result<String, String> {
        Ok(rewrite_alias_imports(source, aliases))
    }
}

/// Default scss renderer: alias import rewriting, sheet passed through.
#[derive(Debug, Default)]
pub struct ScssPreprocessor;

impl Preprocessor for ScssPreprocessor {
    fn render(
        &self,
        source: &str,
        _config: &StyleConfig,
        _path: &Path,
        aliases: &AliasTable,
    ) -> Result<String, String> {
        Ok(rewrite_alias_imports(source, aliases))
    }
}

/// Plain css has no preprocessor; the sheet goes straight to the plugin
/// chain.
#[derive(Debug, Default)]
pub struct CssPassthrough;

impl Preprocessor for CssPassthrough {
    fn render(
        &self,
        source: &str,
        _config: &StyleConfig,
        _path: &Path,
        _aliases: &AliasTable,
    ) -> Result<String, String> {
        Ok(source.to_string())
    }
}

fn import_pattern() -> &'static Regex {
    static IMPORT: OnceLock<Regex> = OnceLock::new();
    IMPORT.get_or_init(|| {
        Regex::new(r#"(?m)^(?P<lead>\s*@(?:import|use)\b[^"'\n]*["'])(?P<spec>[^"'\n]+)(?P<tail>["'])"#)
            .expect("valid import pattern")
    })
}

/// Rewrite alias-prefixed `@import`/`@use` specifiers to filesystem
/// paths. Specifiers without a matching alias prefix are left to the
/// preprocessor's default resolution.
pub fn rewrite_alias_imports(source: &str, aliases: &AliasTable) -> String {
    import_pattern()
        .replace_all(source, |caps: &regex::Captures<'_>| {
            match aliases.rewrite(&caps["spec"]) {
                Some(path) => format!("{}{}{}", &caps["lead"], path, &caps["tail"]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn apply_plugins(chain: &PluginChain, mut css: String) -> Result<String, String> {
    for plugin in &chain.plugins {
        css = plugin
            .process(css)
            .map_err(|e| format!("plugin '{}': {}", plugin.name(), e))?;
    }
    Ok(css)
}

/// Run one stylesheet variant's stage, optionally scoped to a single
/// changed file.
pub fn run(
    ctx: &BuildContext,
    variant: StyleVariant,
    preprocessor: &dyn Preprocessor,
    file: Option<&Path>,
) -> Result<StageOutcome, BuildError> {
    let reporter = ctx.reporter();
    reporter.info(&format!("build {} start...", variant));

    let mut config = ctx.style_config(variant)?;
    let verdict = ctx.run_hook(
        HookName::for_style(variant),
        &mut HookArgs::Style { variant, config: &mut config, file },
    );
    if verdict.is_skip() {
        reporter.info("build paused.");
        return Ok(StageOutcome::Paused);
    }

    let stage_id = StageId::Style(variant);
    let started = SystemTime::now();
    let inputs = stage::select_inputs(ctx, stage_id, file)?;
    let build_config = ctx.config();
    let mut outputs = Vec::new();

    if build_config.disable_compile_styles {
        // Degraded mode: the variant's files are copied byte-for-byte,
        // keeping their own extension.
        for source in &inputs {
            if let Some(target) = stage::copy_through(build_config, source)? {
                outputs.push(target);
            }
        }
    } else {
        let chain = ctx.plugin_chain()?;
        if chain.vetoed {
            reporter.info("build paused.");
            return Ok(StageOutcome::Paused);
        }
        let aliases = ctx.aliases()?;

        for source in &inputs {
            let contents = fs::read_to_string(source)?;
            let rendered = preprocessor
                .render(&contents, &config, source, &aliases)
                .and_then(|css| apply_plugins(&chain, css));
            match rendered {
                Ok(css) => {
                    if let Some(target) = stage::output_path(build_config, source, Some("css")) {
                        stage::write_output(&target, css.as_bytes())?;
                        outputs.push(target);
                    }
                }
                Err(message) => {
                    // Bad syntax in one sheet must not stall the stage.
                    reporter.error(&format!(
                        "build {} error in {}: {}",
                        variant,
                        source.display(),
                        message
                    ));
                }
            }
        }
    }

    ctx.commit_run(stage_id, started);
    reporter.info(&format!("build {} end.", variant));
    Ok(StageOutcome::Built(outputs))
}
