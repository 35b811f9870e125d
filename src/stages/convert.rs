use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, error, info};

use super::{ErrorKind, RunContext, StageError, StageSummary};
use crate::config::CONVERTER_ENV;
use crate::project::{sample_id, SourceKind};

/// Converter invocation for one capture: `<bin> <cyz> --raw --output <json>`
pub fn converter_command(converter: &Path, cyz: &Path, output: &Path) -> Command {
    let mut command = Command::new(converter);
    command.arg(cyz).arg("--raw").arg("--output").arg(output);
    command
}

/// Converter binary from `[converter] path`, else the environment
pub fn resolve_converter(ctx: &RunContext) -> Result<PathBuf, StageError> {
    let configured = if ctx.project.config_file().is_file() {
        ctx.load_config()?.converter_path()
    } else {
        std::env::var_os(CONVERTER_ENV).map(PathBuf::from)
    };
    configured.ok_or(StageError::ConverterNotConfigured)
}

/// Convert every `raw/*.cyz` capture to `converted/<sample>.json`.
///
/// A capture whose document exists is skipped unless forced. The converter
/// writes into a staging directory and the document is renamed into place,
/// so a failed conversion never leaves a partial file. Failures are logged
/// with the converter's stderr and the next capture is processed.
pub fn convert(ctx: &RunContext, converter: &Path) -> Result<StageSummary, StageError> {
    let mut summary = StageSummary::start("convert", ctx);

    let captures = ctx.project.sample_files(SourceKind::Cyz, ctx.sample())?;
    if captures.is_empty() {
        return summary.finish(ErrorKind::MalformedSource);
    }
    info!("Found {} .cyz file(s) to convert", captures.len());
    debug!("Using converter {}", converter.display());

    let converted_dir = ctx.project.converted_dir();
    std::fs::create_dir_all(&converted_dir)?;

    for cyz in captures {
        let Some(sample) = sample_id(&cyz) else {
            continue;
        };
        let target = ctx.project.json_file(&sample);
        if target.exists() && !ctx.force {
            summary.skip(&sample, &target);
            continue;
        }

        info!("Converting {} to {}", cyz.display(), target.display());
        match convert_capture(converter, &cyz, &converted_dir, &target) {
            Ok(()) => summary.written.push(sample),
            Err(reason) => {
                error!("Failed to convert {}: {}", cyz.display(), reason);
                summary.failed.push((sample, reason));
            }
        }
    }

    summary.finish(ErrorKind::MalformedSource)
}

fn convert_capture(converter: &Path, cyz: &Path, staging_root: &Path, target: &Path) -> Result<(), String> {
    let staging = tempfile::Builder::new()
        .prefix(".convert-")
        .tempdir_in(staging_root)
        .map_err(|e| e.to_string())?;
    let staged = staging.path().join(target.file_name().unwrap_or_default());

    let mut command = converter_command(converter, cyz, &staged);
    debug!("Running {:?}", command);
    let output = command
        .output()
        .map_err(|e| format!("could not run {}: {}", converter.display(), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("converter exited with {}: {}", output.status, stderr.trim()));
    }
    if !staged.is_file() {
        return Err("converter produced no output".to_string());
    }

    std::fs::rename(&staged, target).map_err(|e| e.to_string())?;
    staging.close().map_err(|e| e.to_string())
}
