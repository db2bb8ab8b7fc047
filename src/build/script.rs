//! Script transform stage.
//!
//! The orchestrator does not transpile anything itself; it feeds each
//! selected source through a [`ScriptTransform`] and manages the output
//! lifecycle (mirrored `.js` path, optional `.map` sibling). The default
//! transform emits modules unchanged.
//!
//! A transform failure fails the whole stage, unlike the stylesheet
//! stages which skip the offending file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::build::context::BuildContext;
use crate::build::stage::{self, StageId, StageOutcome};
use crate::build::BuildError;
use crate::config::schema::ScriptConfig;
use crate::hooks::{HookArgs, HookName};

/// A transformed script: the emitted module code and, when sourcemap
/// emission is enabled, the serialized map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedScript {
    pub code: String,
    pub map: Option<String>,
}

/// External script transform seam (a babel-style transpiler chain).
pub trait ScriptTransform {
    /// Transform one module.
    ///
    /// `rel_path` is the source path relative to the source root.
    /// Errors fail the stage.
    fn transform(
        &self,
        source: &str,
        config: &ScriptConfig,
        rel_path: &Path,
        sourcemap: bool,
    ) -> Result<TransformedScript, String>;
}

/// Default transform: emit the module unchanged, with an empty v3
/// sourcemap when requested.
#[derive(Debug, Default)]
pub struct IdentityTransform;

impl ScriptTransform for IdentityTransform {
    fn transform(
        &self,
        source: &str,
        _config: &ScriptConfig,
        rel_path: &Path,
        sourcemap: bool,
    ) -> Result<TransformedScript, String> {
        let map = sourcemap.then(|| {
            serde_json::json!({
                "version": 3,
                "file": rel_path
                    .with_extension("js")
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                "sources": [rel_path.to_string_lossy()],
                "names": [],
                "mappings": "",
            })
            .to_string()
        });
        Ok(TransformedScript { code: source.to_string(), map })
    }
}

/// The `.map` sibling path for a script output.
pub fn map_sibling(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".map");
    PathBuf::from(name)
}

/// Run the script stage, optionally scoped to a single changed file.
pub fn run(
    ctx: &BuildContext,
    transform: &dyn ScriptTransform,
    file: Option<&Path>,
) -> Result<StageOutcome, BuildError> {
    let reporter = ctx.reporter();
    reporter.info("build js start...");

    let mut config = ctx.script_config()?;
    let verdict =
        ctx.run_hook(HookName::BuildScript, &mut HookArgs::Script { config: &mut config, file });
    if verdict.is_skip() {
        reporter.info("build paused.");
        return Ok(StageOutcome::Paused);
    }

    let started = SystemTime::now();
    let inputs = stage::select_inputs(ctx, StageId::Script, file)?;
    let build_config = ctx.config();
    let mut outputs = Vec::new();

    for source in &inputs {
        let contents = fs::read_to_string(source)?;
        let rel = source.strip_prefix(&build_config.src_dir).unwrap_or(source);
        let transformed = transform
            .transform(&contents, &config, rel, build_config.sourcemap)
            .map_err(|message| BuildError::Transform { file: source.clone(), message })?;

        let Some(target) = stage::output_path(build_config, source, Some("js")) else {
            continue;
        };
        let mut code = transformed.code;
        if let Some(map) = transformed.map {
            let map_path = map_sibling(&target);
            if let Some(map_name) = map_path.file_name() {
                code.push_str(&format!("\n//# sourceMappingURL={}\n", map_name.to_string_lossy()));
            }
            stage::write_output(&map_path, map.as_bytes())?;
            outputs.push(map_path);
        }
        stage::write_output(&target, code.as_bytes())?;
        outputs.push(target);
    }

    ctx.commit_run(StageId::Script, started);
    reporter.info("build js end.");
    Ok(StageOutcome::Built(outputs))
}
