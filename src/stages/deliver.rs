use std::time::Duration;

use log::{info, warn};

use super::{
    compute_features, convert, extract_cyto, extract_images, extract_meta, remediation,
    resolve_converter, summarise_pulses, ErrorKind, RunContext, StageError, StageSummary,
};
use crate::export::{self, ExportOptions};
use crate::upload::{
    authenticate, find_bundles, upload_bundles, CredentialPrompt, Credentials, EcotaxaApi,
    TokenStore, UploadError,
};

/// Command line options of `upload`
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub credentials: Credentials,
    /// Overrides `[ecotaxa] project_id`
    pub project_id: Option<i64>,
}

/// Assemble the EcoTaxa bundle (or bare table with `only_tsv`) of every sample
pub fn prepare(ctx: &RunContext, only_tsv: bool) -> Result<StageSummary, StageError> {
    let mut summary = StageSummary::start("prepare", ctx);
    let config = ctx.load_config()?;

    let options = ExportOptions {
        force: ctx.force,
        only_tsv,
    };
    let exported = export::prepare(&ctx.project, &config.export, ctx.sample(), options)?;

    summary.written = exported.written;
    summary.skipped = exported.skipped;
    summary.failed = exported.failed;
    summary.finish(ErrorKind::ExtractionFailure)
}

/// Upload the prepared bundles to the configured EcoTaxa project.
///
/// Authentication failures abort; any other failure is recorded per bundle.
pub fn upload<A, S, P>(
    ctx: &RunContext,
    api: &A,
    store: &S,
    prompt: &P,
    options: &UploadOptions,
) -> Result<StageSummary, StageError>
where
    A: EcotaxaApi + ?Sized,
    S: TokenStore + ?Sized,
    P: CredentialPrompt + ?Sized,
{
    let mut summary = StageSummary::start("upload", ctx);
    let config = ctx.load_config()?;
    let project_id = options
        .project_id
        .or(config.ecotaxa.project_id)
        .ok_or(UploadError::MissingProjectId)?;

    let dir = ctx.project.ecotaxa_dir();
    let bundles = if dir.is_dir() {
        find_bundles(&dir, ctx.sample())?
    } else {
        Vec::new()
    };
    if bundles.is_empty() {
        return Err(StageError::MissingInput {
            what: "EcoTaxa bundles".to_string(),
            path: dir,
            remediation: remediation(ctx, "prepare"),
        });
    }
    info!("Found {} bundle(s) to upload", bundles.len());

    let token = authenticate(api, store, &options.credentials, prompt)?;
    let interval = Duration::from_secs_f64(config.ecotaxa.poll_interval_secs);
    let uploaded = upload_bundles(api, &token, project_id, &bundles, interval)?;

    summary.written = uploaded.imported;
    summary.skipped = uploaded.skipped;
    summary.failed = uploaded.failed;
    summary.finish(ErrorKind::Remote)
}

/// Run every processing stage, then the upload, in order.
///
/// A stage whose samples partially failed does not stop the run: the
/// following stages process what is available and the failures are reported
/// together at the end. Any other error aborts immediately.
pub fn run_all<A, S, P>(
    ctx: &RunContext,
    api: &A,
    store: &S,
    prompt: &P,
    options: &UploadOptions,
) -> Result<Vec<StageSummary>, StageError>
where
    A: EcotaxaApi + ?Sized,
    S: TokenStore + ?Sized,
    P: CredentialPrompt + ?Sized,
{
    let converter = resolve_converter(ctx)?;
    let mut summaries = Vec::new();
    let mut failed = Vec::new();
    let mut kind = ErrorKind::ExtractionFailure;

    let mut record = |result: Result<StageSummary, StageError>| -> Result<(), StageError> {
        match result {
            Ok(summary) => {
                summaries.push(summary);
                Ok(())
            }
            Err(StageError::Failures {
                stage,
                kind: stage_kind,
                failed: stage_failed,
            }) => {
                warn!("{} finished with {} failure(s), continuing", stage, stage_failed.len());
                kind = stage_kind;
                failed.extend(
                    stage_failed
                        .into_iter()
                        .map(|(sample, reason)| (sample, format!("{}: {}", stage, reason))),
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    };

    record(convert(ctx, &converter))?;
    record(extract_meta(ctx, false))?;
    record(extract_cyto(ctx, false))?;
    record(summarise_pulses(ctx, None))?;
    record(extract_images(ctx))?;
    record(compute_features(ctx, None))?;
    record(prepare(ctx, false))?;
    record(upload(ctx, api, store, prompt, options))?;

    if failed.is_empty() {
        info!("All stages completed");
        Ok(summaries)
    } else {
        Err(StageError::Failures {
            stage: "all",
            kind,
            failed,
        })
    }
}
