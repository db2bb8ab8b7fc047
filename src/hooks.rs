//! Extension hook registry.
//!
//! Each build stage invokes a named hook before doing its own work.
//! Registered callbacks run in registration order, may mutate the
//! stage's configuration in place, and may answer [`HookAction::Skip`]
//! to veto the stage. A vetoed stage is logged as paused, not failed;
//! this is the cooperative early-exit mechanism extensions use to
//! replace a stage's built-in behavior.
//!
//! Callbacks cannot be loaded from a data file in Rust, so extension
//! sources are registered through the library API before the first
//! build. With no sources registered every hook answers
//! [`HookAction::Continue`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::build::style::StylePlugin;
use crate::config::schema::{BuildConfig, ScriptConfig, StyleConfig, StyleVariant};

/// Named extension points, one per build stage plus the shared style
/// plugin chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    Clean,
    BuildScript,
    BuildLess,
    BuildScss,
    BuildCss,
    /// The passthrough asset stage. Deliberately its own hook.
    BuildAssets,
    /// Runs once, when the style plugin chain is first assembled.
    StylePlugins,
}

impl HookName {
    /// The hook owned by a stylesheet variant.
    pub fn for_style(variant: StyleVariant) -> Self {
        match variant {
            StyleVariant::Less => HookName::BuildLess,
            StyleVariant::Scss => HookName::BuildScss,
            StyleVariant::Css => HookName::BuildCss,
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookName::Clean => "clean",
            HookName::BuildScript => "build-script",
            HookName::BuildLess => "build-less",
            HookName::BuildScss => "build-scss",
            HookName::BuildCss => "build-css",
            HookName::BuildAssets => "build-assets",
            HookName::StylePlugins => "style-plugins",
        };
        f.write_str(name)
    }
}

/// What a hook callback decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    /// Let the stage (and later callbacks) proceed.
    Continue,
    /// Veto the stage. No further callbacks run for this invocation.
    Skip,
}

impl HookAction {
    pub fn is_skip(self) -> bool {
        matches!(self, HookAction::Skip)
    }
}

/// Arguments passed to every callback of a hook invocation.
///
/// The configuration references are mutable on purpose: the pipeline
/// uses the hook-mutated value, never a stale copy.
pub enum HookArgs<'a> {
    Clean,
    Script {
        config: &'a mut ScriptConfig,
        /// The single changed file in watch mode; `None` means the
        /// whole mask.
        file: Option<&'a Path>,
    },
    Style {
        variant: StyleVariant,
        config: &'a mut StyleConfig,
        file: Option<&'a Path>,
    },
    Assets {
        file: Option<&'a Path>,
    },
    StylePlugins {
        plugins: &'a mut Vec<Box<dyn StylePlugin>>,
    },
}

/// A registered hook callback.
pub type HookFn = Box<dyn Fn(&mut HookArgs<'_>) -> HookAction>;

/// An ordered set of hook callbacks declared by one extension source.
#[derive(Default)]
pub struct HookSet {
    callbacks: Vec<(HookName, HookFn)>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for a hook. Registration order is preserved.
    pub fn on<F>(mut self, name: HookName, callback: F) -> Self
    where
        F: Fn(&mut HookArgs<'_>) -> HookAction + 'static,
    {
        self.callbacks.push((name, Box::new(callback)));
        self
    }
}

/// One extension source: a plain hook set, or a factory invoked once
/// with the resolved configuration.
pub enum ExtensionSource {
    Set(HookSet),
    Factory(Box<dyn Fn(&BuildConfig) -> HookSet>),
}

/// The merged, per-hook callback lists. Built lazily on first use and
/// immutable afterwards.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<HookName, Vec<HookFn>>,
}

impl HookRegistry {
    /// Merge extension sources into a registry.
    ///
    /// The relative order across sources is preserved, as is the
    /// registration order within each source. Factories are invoked
    /// exactly once, here.
    pub fn build(sources: Vec<ExtensionSource>, config: &BuildConfig) -> Self {
        let mut registry = Self::default();
        for source in sources {
            let set = match source {
                ExtensionSource::Set(set) => set,
                ExtensionSource::Factory(factory) => factory(config),
            };
            for (name, callback) in set.callbacks {
                registry.hooks.entry(name).or_default().push(callback);
            }
        }
        registry
    }

    /// Run a hook with short-circuit evaluation.
    ///
    /// The first callback answering `Skip` stops the invocation and the
    /// verdict is `Skip`; otherwise `Continue`. Callback panics are not
    /// caught and fail the whole build.
    pub fn run(&self, name: HookName, args: &mut HookArgs<'_>) -> HookAction {
        let Some(callbacks) = self.hooks.get(&name) else {
            return HookAction::Continue;
        };
        for callback in callbacks {
            if callback(args).is_skip() {
                return HookAction::Skip;
            }
        }
        HookAction::Continue
    }

    /// Number of callbacks registered for a hook.
    pub fn callback_count(&self, name: HookName) -> usize {
        self.hooks.get(&name).map_or(0, Vec::len)
    }
}
