//! Per-process build context.
//!
//! One `BuildContext` is constructed at startup from the resolved
//! configuration and passed by reference into every stage and watch
//! handler. It owns the process-wide lazy caches (merged hook registry,
//! style plugin chain, alias table) and the per-stage incremental run
//! state. Caches are initialized exactly once and never invalidated
//! during a watch session; a config-file change requires a restart.

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::SystemTime;

use crate::build::stage::StageId;
use crate::build::style::{self, PluginChain};
use crate::config::loader::{load_toml_or_default, ConfigError, ConfigSource};
use crate::config::schema::{
    AliasConfig, AliasTable, BuildConfig, ScriptConfig, StyleConfig, StyleVariant,
};
use crate::hooks::{ExtensionSource, HookAction, HookArgs, HookName, HookRegistry};
use crate::report::Reporter;

pub struct BuildContext {
    config: BuildConfig,
    reporter: Reporter,
    /// Extension sources pending merge; drained when the registry is
    /// first built.
    sources: RefCell<Vec<ExtensionSource>>,
    hooks: OnceCell<HookRegistry>,
    plugin_chain: RefCell<Option<Rc<PluginChain>>>,
    aliases: RefCell<Option<Rc<AliasTable>>>,
    script_config_source: Option<ConfigSource<ScriptConfig>>,
    style_config_sources: HashMap<StyleVariant, ConfigSource<StyleConfig>>,
    /// Timestamp of the last successful run, per stage.
    run_state: RefCell<HashMap<StageId, SystemTime>>,
}

impl BuildContext {
    pub fn new(config: BuildConfig) -> Self {
        let reporter = Reporter::new(&config.command_prefix);
        Self {
            config,
            reporter,
            sources: RefCell::new(Vec::new()),
            hooks: OnceCell::new(),
            plugin_chain: RefCell::new(None),
            aliases: RefCell::new(None),
            script_config_source: None,
            style_config_sources: HashMap::new(),
            run_state: RefCell::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Register an extension source.
    ///
    /// The registry is assembled lazily on the first hook invocation
    /// and is immutable afterwards; sources registered after the first
    /// build have no effect.
    pub fn register_extension(&self, source: ExtensionSource) {
        self.sources.borrow_mut().push(source);
    }

    /// Override the script stage configuration instead of loading it
    /// from the babel config file.
    pub fn set_script_config(&mut self, source: ConfigSource<ScriptConfig>) {
        self.script_config_source = Some(source);
    }

    /// Override a stylesheet variant's configuration instead of loading
    /// it from the variant's config file.
    pub fn set_style_config(&mut self, variant: StyleVariant, source: ConfigSource<StyleConfig>) {
        self.style_config_sources.insert(variant, source);
    }

    fn registry(&self) -> &HookRegistry {
        self.hooks.get_or_init(|| HookRegistry::build(self.sources.take(), &self.config))
    }

    /// Run a hook with short-circuit evaluation. See [`HookRegistry::run`].
    pub fn run_hook(&self, name: HookName, args: &mut HookArgs<'_>) -> HookAction {
        self.registry().run(name, args)
    }

    /// Resolve the script stage configuration.
    pub fn script_config(&self) -> Result<ScriptConfig, ConfigError> {
        match &self.script_config_source {
            Some(source) => Ok(source.resolve(&self.config)),
            None => load_toml_or_default(&self.config.babel_config_file),
        }
    }

    /// Resolve a stylesheet variant's configuration.
    ///
    /// Plain css has no config file; it resolves to the empty config
    /// unless overridden.
    pub fn style_config(&self, variant: StyleVariant) -> Result<StyleConfig, ConfigError> {
        if let Some(source) = self.style_config_sources.get(&variant) {
            return Ok(source.resolve(&self.config));
        }
        match self.config.style_config_file(variant) {
            Some(path) => load_toml_or_default(path),
            None => Ok(StyleConfig::default()),
        }
    }

    /// The alias table, loaded from the alias config file on first use.
    pub fn aliases(&self) -> Result<Rc<AliasTable>, ConfigError> {
        if let Some(table) = self.aliases.borrow().as_ref() {
            return Ok(Rc::clone(table));
        }
        let alias_config: AliasConfig = load_toml_or_default(&self.config.alias_config_file)?;
        let table = Rc::new(AliasTable::resolve(&alias_config, &self.config));
        *self.aliases.borrow_mut() = Some(Rc::clone(&table));
        Ok(table)
    }

    /// The shared style plugin chain, assembled on first use.
    ///
    /// Assembly loads the plugin config file, instantiates each named
    /// plugin, and runs the `style-plugins` hook exactly once; the
    /// result (including a veto verdict) is cached for the process
    /// lifetime.
    pub fn plugin_chain(&self) -> Result<Rc<PluginChain>, ConfigError> {
        if let Some(chain) = self.plugin_chain.borrow().as_ref() {
            return Ok(Rc::clone(chain));
        }
        let chain = Rc::new(style::load_plugin_chain(self)?);
        *self.plugin_chain.borrow_mut() = Some(Rc::clone(&chain));
        Ok(chain)
    }

    /// Timestamp of the stage's last successful run.
    pub fn last_run(&self, stage: StageId) -> Option<SystemTime> {
        self.run_state.borrow().get(&stage).copied()
    }

    /// Commit a successful run. Called with the timestamp captured at
    /// run start, so files modified mid-run land in the next run.
    pub fn commit_run(&self, stage: StageId, started: SystemTime) {
        self.run_state.borrow_mut().insert(stage, started);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RawOptions;
    use crate::hooks::HookSet;
    use std::time::Duration;
    use tempfile::TempDir;

    fn context_in(temp: &TempDir) -> BuildContext {
        let raw = RawOptions {
            root: Some(temp.path().display().to_string()),
            ..Default::default()
        };
        BuildContext::new(BuildConfig::resolve(&raw))
    }

    #[test]
    fn test_hookless_context_continues() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp);
        assert_eq!(ctx.run_hook(HookName::Clean, &mut HookArgs::Clean), HookAction::Continue);
    }

    #[test]
    fn test_registration_after_first_build_has_no_effect() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp);

        // Force registry assembly with a first invocation.
        ctx.run_hook(HookName::Clean, &mut HookArgs::Clean);

        let late = HookSet::new().on(HookName::Clean, |_| HookAction::Skip);
        ctx.register_extension(ExtensionSource::Set(late));
        assert_eq!(ctx.run_hook(HookName::Clean, &mut HookArgs::Clean), HookAction::Continue);
    }

    #[test]
    fn test_script_config_override() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context_in(&temp);
        ctx.set_script_config(ConfigSource::Factory(Box::new(|_| ScriptConfig {
            presets: vec!["env".to_string()],
            plugins: vec![],
        })));
        assert_eq!(ctx.script_config().unwrap().presets, vec!["env"]);
    }

    #[test]
    fn test_css_variant_has_empty_config() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp);
        assert_eq!(ctx.style_config(StyleVariant::Css).unwrap(), StyleConfig::default());
    }

    #[test]
    fn test_alias_table_cached() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp);
        let first = ctx.aliases().unwrap();
        let second = ctx.aliases().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_run_state_commit_and_lookup() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp);
        assert!(ctx.last_run(StageId::Script).is_none());

        let started = SystemTime::now() - Duration::from_secs(5);
        ctx.commit_run(StageId::Script, started);
        assert_eq!(ctx.last_run(StageId::Script), Some(started));
        assert!(ctx.last_run(StageId::Assets).is_none());
    }
}
