//! Full-build sequencing.
//!
//! A [`Pipeline`] binds the transform seams (script transform, one
//! preprocessor per stylesheet variant) to a [`BuildContext`] and runs
//! the stages in their fixed order: clean, script, scss, less, css,
//! assets. The watcher reuses the same pipeline for single-stage runs.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::build::context::BuildContext;
use crate::build::script::{self, IdentityTransform, ScriptTransform};
use crate::build::stage::{StageId, StageOutcome};
use crate::build::style::{self, CssPassthrough, LessPreprocessor, Preprocessor, ScssPreprocessor};
use crate::build::{assets, BuildError};
use crate::config::schema::StyleVariant;
use crate::hooks::{HookArgs, HookName};

/// Stage order of a full build.
pub const STAGE_ORDER: [StageId; 5] = [
    StageId::Script,
    StageId::Style(StyleVariant::Scss),
    StageId::Style(StyleVariant::Less),
    StageId::Style(StyleVariant::Css),
    StageId::Assets,
];

/// What a full build did, stage by stage.
#[derive(Debug)]
pub struct BuildSummary {
    pub stages: Vec<(StageId, StageOutcome)>,
    pub duration: Duration,
}

impl BuildSummary {
    /// Total output files written across all stages.
    pub fn output_count(&self) -> usize {
        self.stages.iter().map(|(_, outcome)| outcome.outputs().len()).sum()
    }
}

/// The build pipeline: a context plus the pluggable transform seams.
pub struct Pipeline<'a> {
    ctx: &'a BuildContext,
    script: Box<dyn ScriptTransform>,
    less: Box<dyn Preprocessor>,
    scss: Box<dyn Preprocessor>,
    css: Box<dyn Preprocessor>,
}

impl<'a> Pipeline<'a> {
    /// A pipeline with the default seams: identity script transform,
    /// alias-rewriting stylesheet passthrough.
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self {
            ctx,
            script: Box::new(IdentityTransform),
            less: Box::new(LessPreprocessor),
            scss: Box::new(ScssPreprocessor),
            css: Box::new(CssPassthrough),
        }
    }

    /// Replace the script transform seam.
    pub fn with_script_transform(mut self, transform: Box<dyn ScriptTransform>) -> Self {
        self.script = transform;
        self
    }

    /// Replace one stylesheet variant's preprocessor seam.
    pub fn with_preprocessor(
        mut self,
        variant: StyleVariant,
        preprocessor: Box<dyn Preprocessor>,
    ) -> Self {
        match variant {
            StyleVariant::Less => self.less = preprocessor,
            StyleVariant::Scss => self.scss = preprocessor,
            StyleVariant::Css => self.css = preprocessor,
        }
        self
    }

    fn preprocessor(&self, variant: StyleVariant) -> &dyn Preprocessor {
        match variant {
            StyleVariant::Less => self.less.as_ref(),
            StyleVariant::Scss => self.scss.as_ref(),
            StyleVariant::Css => self.css.as_ref(),
        }
    }

    /// Run one stage, optionally scoped to a single changed file.
    pub fn run_stage(
        &self,
        stage: StageId,
        file: Option<&Path>,
    ) -> Result<StageOutcome, BuildError> {
        match stage {
            StageId::Script => script::run(self.ctx, self.script.as_ref(), file),
            StageId::Style(variant) => {
                style::run(self.ctx, variant, self.preprocessor(variant), file)
            }
            StageId::Assets => assets::run(self.ctx, file),
        }
    }

    /// Empty the output directory.
    ///
    /// Inert (and the `clean` hook is never consulted) when cleaning is
    /// disabled or the source root doubles as the output root. Deletes
    /// the directory's contents, never the directory itself.
    pub fn clean(&self) -> Result<StageOutcome, BuildError> {
        let reporter = self.ctx.reporter();
        let config = self.ctx.config();
        if !config.clean_enabled() {
            reporter.info("clean skipped.");
            return Ok(StageOutcome::Built(Vec::new()));
        }

        reporter.info("clean esm...");
        if self.ctx.run_hook(HookName::Clean, &mut HookArgs::Clean).is_skip() {
            reporter.info("clean paused.");
            return Ok(StageOutcome::Paused);
        }

        if config.out_dir.exists() {
            for entry in fs::read_dir(&config.out_dir)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    fs::remove_dir_all(entry.path())?;
                } else {
                    fs::remove_file(entry.path())?;
                }
            }
        }
        Ok(StageOutcome::Built(Vec::new()))
    }

    /// Full build: clean, then every stage in order.
    ///
    /// A clean veto skips the deletion only; the stages still run.
    pub fn build(&self) -> Result<BuildSummary, BuildError> {
        let started = Instant::now();
        self.clean()?;
        let summary = self.run_stages(started)?;
        self.ctx
            .reporter()
            .info(&format!("build finished in {}ms.", summary.duration.as_millis()));
        Ok(summary)
    }

    /// Every stage in order, without cleaning first. Used by the watcher
    /// when a directory appears.
    pub fn build_stages(&self) -> Result<BuildSummary, BuildError> {
        self.run_stages(Instant::now())
    }

    fn run_stages(&self, started: Instant) -> Result<BuildSummary, BuildError> {
        let mut stages = Vec::with_capacity(STAGE_ORDER.len());
        for stage in STAGE_ORDER {
            let outcome = self.run_stage(stage, None)?;
            stages.push((stage, outcome));
        }
        Ok(BuildSummary { stages, duration: started.elapsed() })
    }
}
