//! Passthrough asset stage.
//!
//! Copies static files (images, json, svg) byte-for-byte to their
//! mirrored output paths. Same protocol as the other stages: hook, since
//! filter, mirrored outputs.

use std::path::Path;
use std::time::SystemTime;

use crate::build::context::BuildContext;
use crate::build::stage::{self, StageId, StageOutcome};
use crate::build::BuildError;
use crate::hooks::{HookArgs, HookName};

/// Run the asset stage, optionally scoped to a single changed file.
pub fn run(ctx: &BuildContext, file: Option<&Path>) -> Result<StageOutcome, BuildError> {
    let reporter = ctx.reporter();
    reporter.info("build others start...");

    let verdict = ctx.run_hook(HookName::BuildAssets, &mut HookArgs::Assets { file });
    if verdict.is_skip() {
        reporter.info("build paused.");
        return Ok(StageOutcome::Paused);
    }

    let started = SystemTime::now();
    let inputs = stage::select_inputs(ctx, StageId::Assets, file)?;
    let mut outputs = Vec::new();
    for source in &inputs {
        if let Some(target) = stage::copy_through(ctx.config(), source)? {
            outputs.push(target);
        }
    }

    ctx.commit_run(StageId::Assets, started);
    reporter.info("build others end.");
    Ok(StageOutcome::Built(outputs))
}
