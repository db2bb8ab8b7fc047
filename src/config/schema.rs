//! Option schema and resolution into an immutable `BuildConfig`.
//!
//! `RawOptions` is the all-optional option set as it arrives from the
//! CLI, the project config file, or the launcher's environment payload.
//! `BuildConfig::resolve` turns it into the fully-resolved configuration
//! every stage and watch handler reads for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

/// Raw, all-optional build options.
///
/// Field names serialize in camelCase so the launcher's JSON payload
/// matches the CLI flag names (`--babel-config` becomes `babelConfig`).
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawOptions {
    /// Project root directory, default: current working directory.
    pub root: Option<String>,
    /// Source directory relative to root, default `./src`.
    pub src: Option<String>,
    /// Output directory relative to root, default `./esm`.
    pub out: Option<String>,
    /// Project config file path, default `esm-project.config.toml`.
    pub esm_config: Option<String>,
    /// Script transform config file path, default `babel.config.toml`.
    pub babel_config: Option<String>,
    /// Style plugin config file path, default `postcss.config.toml`.
    pub postcss_config: Option<String>,
    /// Less preprocessor config file path, default `less.config.toml`.
    pub less_config: Option<String>,
    /// Scss preprocessor config file path, default `scss.config.toml`.
    pub scss_config: Option<String>,
    /// Alias config file path, default `alias.config.toml`.
    pub alias_config: Option<String>,
    /// Comma-separated ignore patterns, relative to root.
    pub ignore: Option<String>,
    /// Widen the script mask with TypeScript extensions.
    pub typescript: Option<bool>,
    /// Degrade stylesheet stages to passthrough copies.
    pub disable_compile_styles: Option<bool>,
    /// Skip the clean stage before full builds.
    pub disable_clean: Option<bool>,
    /// Emit a `.map` sibling next to every script output.
    pub sourcemap: Option<bool>,
    /// Log line prefix, default `[esmbuild]`.
    pub command_prefix: Option<String>,
}

/// One stylesheet stage variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleVariant {
    Less,
    Scss,
    /// Plain cascading sheets: no preprocessor, plugin chain only.
    Css,
}

impl StyleVariant {
    /// All variants, in pipeline order.
    pub const ALL: [StyleVariant; 3] = [StyleVariant::Scss, StyleVariant::Less, StyleVariant::Css];

    /// The source-file extension this variant owns.
    pub fn source_extension(self) -> &'static str {
        match self {
            StyleVariant::Less => "less",
            StyleVariant::Scss => "scss",
            StyleVariant::Css => "css",
        }
    }
}

impl fmt::Display for StyleVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_extension())
    }
}

/// A file-matching mask: a base directory plus an extension set.
///
/// The `glob` crate has no brace expansion, so masks are structured
/// rather than pattern strings; `expand` walks the base directory with a
/// `**/*` glob and filters by extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    /// Absolute base directory.
    pub base: PathBuf,
    /// Matched extensions, without the leading dot.
    pub extensions: Vec<String>,
}

impl Mask {
    /// Create a mask over `base` matching the given extensions.
    pub fn new(base: impl Into<PathBuf>, extensions: &[&str]) -> Self {
        Self {
            base: base.into(),
            extensions: extensions.iter().map(|e| (*e).to_string()).collect(),
        }
    }

    /// Check whether an absolute path falls under this mask.
    pub fn matches(&self, path: &Path) -> bool {
        if !path.starts_with(&self.base) {
            return false;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.iter().any(|e| e == ext),
            None => false,
        }
    }

    /// Expand the mask into the list of existing files it matches.
    pub fn expand(&self) -> Result<Vec<PathBuf>, glob::PatternError> {
        let pattern = format!("{}/**/*", self.base.display());
        let mut files: Vec<PathBuf> = glob::glob(&pattern)?
            .flatten()
            .filter(|p| p.is_file() && self.matches(p))
            .collect();
        files.sort();
        Ok(files)
    }
}

/// Fully-resolved build configuration.
///
/// Created once from `RawOptions` at process start and never mutated.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Absolute project root.
    pub root_dir: PathBuf,
    /// Absolute source root.
    pub src_dir: PathBuf,
    /// Absolute output root.
    pub out_dir: PathBuf,
    /// Script sources: js/jsx, plus ts/tsx in typescript mode.
    pub script_mask: Mask,
    /// Passthrough asset sources.
    pub asset_mask: Mask,
    /// Less stylesheet sources.
    pub less_mask: Mask,
    /// Scss stylesheet sources.
    pub scss_mask: Mask,
    /// Plain css stylesheet sources.
    pub css_mask: Mask,
    /// Ignore patterns, matched against root-relative paths.
    pub ignore: Vec<glob::Pattern>,
    /// Script transform config file.
    pub babel_config_file: PathBuf,
    /// Style plugin config file.
    pub postcss_config_file: PathBuf,
    /// Less preprocessor config file.
    pub less_config_file: PathBuf,
    /// Scss preprocessor config file.
    pub scss_config_file: PathBuf,
    /// Alias config file.
    pub alias_config_file: PathBuf,
    /// TypeScript mode.
    pub typescript: bool,
    /// Stylesheet stages degrade to passthrough copies.
    pub disable_compile_styles: bool,
    /// Skip the clean stage.
    pub disable_clean: bool,
    /// Emit `.map` siblings for script outputs.
    pub sourcemap: bool,
    /// Log line prefix.
    pub command_prefix: String,
}

/// Extensions handled by the passthrough asset stage. Includes `map` so
/// pre-existing sourcemaps are copied through.
const ASSET_EXTENSIONS: [&str; 7] = ["png", "jpg", "gif", "ico", "json", "svg", "map"];

impl BuildConfig {
    /// Resolve raw options into a full configuration.
    ///
    /// Never fails: every absent field has a documented default. The
    /// only ambient input is the current working directory, used when no
    /// root is given.
    pub fn resolve(raw: &RawOptions) -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let root_dir = match &raw.root {
            Some(root) => resolve_against(&cwd, Path::new(root)),
            None => cwd,
        };
        let src_dir = resolve_against(&root_dir, Path::new(raw.src.as_deref().unwrap_or("./src")));
        let out_dir = resolve_against(&root_dir, Path::new(raw.out.as_deref().unwrap_or("./esm")));

        let typescript = raw.typescript.unwrap_or(false);
        let script_exts: &[&str] =
            if typescript { &["js", "jsx", "ts", "tsx"] } else { &["js", "jsx"] };

        let ignore = raw
            .ignore
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| glob::Pattern::new(s).ok())
            .collect();

        let config_file = |explicit: &Option<String>, default: &str| -> PathBuf {
            match explicit {
                Some(path) => resolve_against(&root_dir, Path::new(path)),
                None => root_dir.join(default),
            }
        };

        Self {
            script_mask: Mask::new(&src_dir, script_exts),
            asset_mask: Mask::new(&src_dir, &ASSET_EXTENSIONS),
            less_mask: Mask::new(&src_dir, &["less"]),
            scss_mask: Mask::new(&src_dir, &["scss"]),
            css_mask: Mask::new(&src_dir, &["css"]),
            ignore,
            babel_config_file: config_file(&raw.babel_config, "babel.config.toml"),
            postcss_config_file: config_file(&raw.postcss_config, "postcss.config.toml"),
            less_config_file: config_file(&raw.less_config, "less.config.toml"),
            scss_config_file: config_file(&raw.scss_config, "scss.config.toml"),
            alias_config_file: config_file(&raw.alias_config, "alias.config.toml"),
            typescript,
            disable_compile_styles: raw.disable_compile_styles.unwrap_or(false),
            disable_clean: raw.disable_clean.unwrap_or(false),
            sourcemap: raw.sourcemap.unwrap_or(false),
            command_prefix: raw
                .command_prefix
                .clone()
                .unwrap_or_else(|| "[esmbuild]".to_string()),
            root_dir,
            src_dir,
            out_dir,
        }
    }

    /// The mask owned by a stylesheet variant.
    pub fn style_mask(&self, variant: StyleVariant) -> &Mask {
        match variant {
            StyleVariant::Less => &self.less_mask,
            StyleVariant::Scss => &self.scss_mask,
            StyleVariant::Css => &self.css_mask,
        }
    }

    /// The preprocessor config file for a stylesheet variant, if any.
    pub fn style_config_file(&self, variant: StyleVariant) -> Option<&Path> {
        match variant {
            StyleVariant::Less => Some(&self.less_config_file),
            StyleVariant::Scss => Some(&self.scss_config_file),
            StyleVariant::Css => None,
        }
    }

    /// Check whether a path matches any ignore pattern.
    ///
    /// Patterns are matched against the root-relative form of the path.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let rel = path.strip_prefix(&self.root_dir).unwrap_or(path);
        self.ignore.iter().any(|p| p.matches_path(rel))
    }

    /// Whether the clean stage may delete anything.
    ///
    /// Clean is inert when disabled or when the source root doubles as
    /// the output root.
    pub fn clean_enabled(&self) -> bool {
        !self.disable_clean && self.src_dir != self.out_dir
    }

    /// Mirror a source file into the output tree, without extension
    /// remapping. Returns `None` for paths outside the source root.
    pub fn mirror_output(&self, source: &Path) -> Option<PathBuf> {
        let rel = source.strip_prefix(&self.src_dir).ok()?;
        Some(self.out_dir.join(rel))
    }
}

/// Resolve a possibly-relative path against a base directory.
fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Script transform configuration, babel-style.
///
/// The orchestrator never interprets presets or plugins itself; they are
/// handed, hook-mutated, to the configured `ScriptTransform`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    pub presets: Vec<String>,
    pub plugins: Vec<String>,
}

/// Preprocessor options for a stylesheet variant.
///
/// An open table: hooks may add or edit entries, and the configured
/// `Preprocessor` decides what they mean.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct StyleConfig {
    pub options: toml::value::Table,
}

impl StyleConfig {
    /// Set an option entry, as hooks do.
    pub fn set(&mut self, key: &str, value: toml::Value) {
        self.options.insert(key.to_string(), value);
    }
}

/// Style plugin configuration, postcss-style: plugin name to options.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct StylePluginsConfig {
    pub plugins: toml::value::Table,
}

/// Alias config file contents: alias prefix to replacement directory.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AliasConfig {
    pub aliases: BTreeMap<String, String>,
}

/// Resolved alias table used to rewrite import specifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasTable {
    /// Prefix to replacement directory, longest prefix first.
    entries: Vec<(String, PathBuf)>,
}

impl AliasTable {
    /// Build the table from an alias config and the resolved
    /// configuration. `~` and `@` default to the source directory when
    /// not declared.
    pub fn resolve(alias_config: &AliasConfig, config: &BuildConfig) -> Self {
        let mut entries: Vec<(String, PathBuf)> = alias_config
            .aliases
            .iter()
            .map(|(prefix, dir)| {
                (prefix.clone(), resolve_against(&config.root_dir, Path::new(dir)))
            })
            .collect();
        for default in ["~", "@"] {
            if !entries.iter().any(|(p, _)| p == default) {
                entries.push((default.to_string(), config.src_dir.clone()));
            }
        }
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
        Self { entries }
    }

    /// Rewrite an alias-prefixed specifier to a filesystem path.
    ///
    /// Returns `None` when no alias prefix matches, delegating to the
    /// preprocessor's default resolution.
    pub fn rewrite(&self, specifier: &str) -> Option<String> {
        for (prefix, dir) in &self.entries {
            if let Some(rest) = specifier.strip_prefix(prefix.as_str()) {
                let rest = rest.trim_start_matches('/');
                if rest.is_empty() {
                    return Some(dir.display().to_string());
                }
                return Some(format!("{}/{}", dir.display(), rest));
            }
        }
        None
    }

    /// Number of alias entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn raw_with_root(root: &Path) -> RawOptions {
        RawOptions { root: Some(root.display().to_string()), ..Default::default() }
    }

    #[test]
    fn test_resolve_defaults() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::resolve(&raw_with_root(temp.path()));

        assert_eq!(config.src_dir, temp.path().join("./src"));
        assert_eq!(config.out_dir, temp.path().join("./esm"));
        assert_eq!(config.babel_config_file, temp.path().join("babel.config.toml"));
        assert_eq!(config.command_prefix, "[esmbuild]");
        assert!(!config.typescript);
        assert!(!config.sourcemap);
        assert!(config.clean_enabled());
    }

    #[test]
    fn test_resolve_script_mask_widened_by_typescript() {
        let temp = TempDir::new().unwrap();
        let mut raw = raw_with_root(temp.path());
        let config = BuildConfig::resolve(&raw);
        assert_eq!(config.script_mask.extensions, vec!["js", "jsx"]);

        raw.typescript = Some(true);
        let config = BuildConfig::resolve(&raw);
        assert_eq!(config.script_mask.extensions, vec!["js", "jsx", "ts", "tsx"]);
    }

    #[test]
    fn test_resolve_ignore_patterns() {
        let temp = TempDir::new().unwrap();
        let mut raw = raw_with_root(temp.path());
        raw.ignore = Some("src/**/*.test.js,,src/vendor/**".to_string());
        let config = BuildConfig::resolve(&raw);

        assert_eq!(config.ignore.len(), 2);
        assert!(config.is_ignored(&temp.path().join("src/a/b.test.js")));
        assert!(config.is_ignored(&temp.path().join("src/vendor/lib.js")));
        assert!(!config.is_ignored(&temp.path().join("src/a/b.js")));
    }

    #[test]
    fn test_clean_disabled_when_src_equals_out() {
        let temp = TempDir::new().unwrap();
        let mut raw = raw_with_root(temp.path());
        raw.src = Some("lib".to_string());
        raw.out = Some("lib".to_string());
        let config = BuildConfig::resolve(&raw);
        assert!(!config.clean_enabled());
    }

    #[test]
    fn test_mask_matches() {
        let mask = Mask::new("/project/src", &["js", "jsx"]);
        assert!(mask.matches(Path::new("/project/src/a.js")));
        assert!(mask.matches(Path::new("/project/src/deep/b.jsx")));
        assert!(!mask.matches(Path::new("/project/src/a.ts")));
        assert!(!mask.matches(Path::new("/project/other/a.js")));
        assert!(!mask.matches(Path::new("/project/src/noext")));
    }

    #[test]
    fn test_mask_expand() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("deep")).unwrap();
        fs::write(src.join("a.js"), "").unwrap();
        fs::write(src.join("deep/b.jsx"), "").unwrap();
        fs::write(src.join("deep/c.scss"), "").unwrap();

        let mask = Mask::new(&src, &["js", "jsx"]);
        let files = mask.expand().unwrap();
        assert_eq!(files, vec![src.join("a.js"), src.join("deep/b.jsx")]);
    }

    #[test]
    fn test_mirror_output() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::resolve(&raw_with_root(temp.path()));

        let source = config.src_dir.join("foo/bar.js");
        assert_eq!(config.mirror_output(&source), Some(config.out_dir.join("foo/bar.js")));
        assert_eq!(config.mirror_output(Path::new("/elsewhere/bar.js")), None);
    }

    #[test]
    fn test_alias_table_defaults() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::resolve(&raw_with_root(temp.path()));
        let table = AliasTable::resolve(&AliasConfig::default(), &config);

        assert_eq!(table.len(), 2);
        let src = config.src_dir.display().to_string();
        assert_eq!(table.rewrite("~components/a.less"), Some(format!("{}/components/a.less", src)));
        assert_eq!(table.rewrite("@theme/vars"), Some(format!("{}/theme/vars", src)));
        assert_eq!(table.rewrite("./relative"), None);
    }

    #[test]
    fn test_alias_table_longest_prefix_wins() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::resolve(&raw_with_root(temp.path()));
        let mut alias_config = AliasConfig::default();
        alias_config.aliases.insert("@".to_string(), "shared".to_string());
        alias_config.aliases.insert("@app".to_string(), "app".to_string());
        let table = AliasTable::resolve(&alias_config, &config);

        let root = temp.path().display().to_string();
        assert_eq!(table.rewrite("@app/x"), Some(format!("{}/app/x", root)));
        assert_eq!(table.rewrite("@other/x"), Some(format!("{}/shared/other/x", root)));
    }

    #[test]
    fn test_raw_options_camel_case_roundtrip() {
        let raw = RawOptions {
            babel_config: Some("conf/babel.toml".to_string()),
            disable_compile_styles: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_string(&raw).unwrap();
        assert!(json.contains("babelConfig"));
        assert!(json.contains("disableCompileStyles"));

        let back: RawOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_style_variant_display() {
        assert_eq!(StyleVariant::Less.to_string(), "less");
        assert_eq!(StyleVariant::Scss.to_string(), "scss");
        assert_eq!(StyleVariant::Css.to_string(), "css");
    }
}
