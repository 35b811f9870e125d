//! # EcoTaxa Upload
//!
//! Pushes `ecotaxa_<sample>.zip` bundles into an EcoTaxa project.
//!
//! Each bundle moves through
//! `Authenticated → Uploaded → ImportStarted → Polling` and ends in one of
//! [`ImportOutcome::Succeeded`], [`ImportOutcome::Failed`] or
//! [`ImportOutcome::NeedsManualIntervention`]. Bundles whose sample already
//! exists in the project are skipped, and a failing bundle never stops the
//! batch. Only authentication is fatal.
//!
//! The remote side sits behind [`EcotaxaApi`]; [`HttpApi`] is the real client.

mod api;
mod error;
mod token;

#[cfg(test)]
mod tests;

pub use api::{EcotaxaApi, HttpApi, JobState, JobStatus, ProjectInfo, UserInfo};
pub use error::UploadError;
pub use token::{ConsolePrompt, CredentialPrompt, FileTokenStore, TokenStore};

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, error, info, warn};

/// Prefix of bundle file names
pub const BUNDLE_PREFIX: &str = "ecotaxa_";

/// Credentials given on the command line
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Terminal state of one import job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Succeeded,
    /// Job ended in error, with the remote error list
    Failed(Vec<String>),
    /// Job waits for answers on the EcoTaxa web interface
    NeedsManualIntervention,
}

/// Per-bundle results of [`upload_bundles`]
#[derive(Debug, Default)]
pub struct UploadSummary {
    pub imported: Vec<String>,
    /// Samples already present in the project
    pub skipped: Vec<String>,
    /// Samples that failed, with the cause
    pub failed: Vec<(String, String)>,
}

/// Sample id of a bundle: `ecotaxa_<sample>.zip` gives `<sample>`
pub fn bundle_sample_id(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    Some(stem.strip_prefix(BUNDLE_PREFIX).unwrap_or(stem).to_string())
}

/// Bundles in `dir`, sorted, optionally restricted to one sample
pub fn find_bundles(dir: &Path, sample: Option<&str>) -> Result<Vec<PathBuf>, UploadError> {
    let mut bundles = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_bundle = path.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some("zip")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(BUNDLE_PREFIX));
        if is_bundle {
            bundles.push(path);
        }
    }
    if let Some(sample) = sample {
        bundles.retain(|b| bundle_sample_id(b).as_deref() == Some(sample));
    }
    bundles.sort();
    Ok(bundles)
}

/// Obtain a valid token.
///
/// A cached token is used when the server still accepts it and cleared when it
/// does not. Otherwise credentials come from `credentials`, then `prompt`,
/// and the new token is cached.
pub fn authenticate<A, S, P>(
    api: &A,
    store: &S,
    credentials: &Credentials,
    prompt: &P,
) -> Result<String, UploadError>
where
    A: EcotaxaApi + ?Sized,
    S: TokenStore + ?Sized,
    P: CredentialPrompt + ?Sized,
{
    if let Some(token) = store.load() {
        match api.user_info(&token) {
            Ok(Some(user)) => {
                info!(
                    "Authenticated as: {} ({})",
                    user.name.as_deref().unwrap_or("Unknown"),
                    user.email.as_deref().unwrap_or("Unknown")
                );
                return Ok(token);
            }
            Ok(None) => {
                info!("Stored token is invalid, need to re-authenticate");
                store.clear();
            }
            Err(e) => warn!("Could not validate the stored token: {}", e),
        }
    }

    let username = match &credentials.username {
        Some(username) => username.clone(),
        None => prompt.username()?,
    };
    if username.is_empty() {
        return Err(UploadError::AuthenticationFailed("EcoTaxa username is required".to_string()));
    }
    let password = match &credentials.password {
        Some(password) => password.clone(),
        None => prompt.password()?,
    };
    if password.is_empty() {
        return Err(UploadError::AuthenticationFailed("EcoTaxa password is required".to_string()));
    }

    let token = api
        .login(&username, &password)
        .map_err(|e| UploadError::AuthenticationFailed(e.to_string()))?;

    match store.store(&token) {
        Ok(()) => info!("Authentication token cached"),
        Err(e) => warn!("Could not cache the authentication token: {}", e),
    }
    if let Ok(Some(user)) = api.user_info(&token) {
        info!("Authenticated as: {}", user.email.as_deref().unwrap_or("Unknown"));
    }

    Ok(token)
}

/// Poll a job every `interval` until it finishes, fails or asks for input
pub fn monitor_job<A: EcotaxaApi + ?Sized>(
    api: &A,
    token: &str,
    job_id: i64,
    interval: Duration,
) -> Result<ImportOutcome, UploadError> {
    let mut last_progress = None;
    loop {
        let status = api.job_status(token, job_id)?;

        if status.progress_pct != last_progress {
            info!(
                "  Progress: {}% - {}",
                status.progress_pct.unwrap_or(0.0),
                status.progress_msg.as_deref().unwrap_or("")
            );
            last_progress = status.progress_pct;
        }

        match status.state() {
            JobState::Finished => return Ok(ImportOutcome::Succeeded),
            JobState::Error => return Ok(ImportOutcome::Failed(status.error_messages())),
            JobState::Asking => return Ok(ImportOutcome::NeedsManualIntervention),
            JobState::Pending | JobState::Running => {}
            JobState::Unknown(code) => debug!("Job {} in unknown state '{}'", job_id, code),
        }

        std::thread::sleep(interval);
    }
}

/// Upload one bundle, import it and wait for the job
pub fn upload_bundle<A: EcotaxaApi + ?Sized>(
    api: &A,
    token: &str,
    project_id: i64,
    bundle: &Path,
    poll_interval: Duration,
) -> Result<ImportOutcome, UploadError> {
    let server_path = api.upload_file(token, bundle)?;
    info!("  Uploaded to {}", server_path);

    // Imports address the upload by its server-side stem
    let source_path = Path::new(&server_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&server_path)
        .to_string();
    let job_id = api.start_import(token, project_id, &source_path)?;
    info!("  Import job started (ID: {}), monitoring progress", job_id);

    monitor_job(api, token, job_id, poll_interval)
}

/// Upload every bundle whose sample is not yet in the project
pub fn upload_bundles<A: EcotaxaApi + ?Sized>(
    api: &A,
    token: &str,
    project_id: i64,
    bundles: &[PathBuf],
    poll_interval: Duration,
) -> Result<UploadSummary, UploadError> {
    match api.project_info(token, project_id) {
        Ok(project) => info!(
            "Uploading to EcoTaxa project '{}' [{}]",
            project.title.as_deref().unwrap_or("Unknown"),
            project_id
        ),
        Err(e) => warn!("Could not retrieve project {} information: {}", project_id, e),
    }

    let existing = api.existing_samples(token, project_id).unwrap_or_else(|e| {
        warn!("Could not list the samples of project {}: {}", project_id, e);
        Default::default()
    });
    info!("Found {} existing sample(s) in project", existing.len());

    let mut summary = UploadSummary::default();
    for (i, bundle) in bundles.iter().enumerate() {
        let name = bundle.display();
        let Some(sample) = bundle_sample_id(bundle) else {
            warn!("Skipping {}: not a bundle name", name);
            continue;
        };

        if existing.contains(&sample) {
            info!(
                "[{}/{}] Skipping {} (sample '{}' already exists)",
                i + 1,
                bundles.len(),
                name,
                sample
            );
            summary.skipped.push(sample);
            continue;
        }

        info!("[{}/{}] Processing {}", i + 1, bundles.len(), name);
        match upload_bundle(api, token, project_id, bundle, poll_interval) {
            Ok(ImportOutcome::Succeeded) => {
                info!("  Import of '{}' completed successfully", sample);
                summary.imported.push(sample);
            }
            Ok(ImportOutcome::Failed(errors)) => {
                error!("  Import of '{}' failed: {}", sample, errors.join("; "));
                summary.failed.push((sample, UploadError::Remote(errors).to_string()));
            }
            Ok(ImportOutcome::NeedsManualIntervention) => {
                error!("  Import of '{}' requires user input on the EcoTaxa web interface", sample);
                summary
                    .failed
                    .push((sample, "import requires manual intervention".to_string()));
            }
            Err(e) => {
                error!("  Upload of '{}' failed: {}", sample, e);
                summary.failed.push((sample, e.to_string()));
            }
        }
    }

    Ok(summary)
}
