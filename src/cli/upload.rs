use anyhow::{Context, Result};
use log::info;

use cytoprocess::stages::{self, RunContext, UploadOptions};
use cytoprocess::upload::{ConsolePrompt, Credentials, FileTokenStore, HttpApi};

use super::{print_summary, CredentialArgs};

impl From<CredentialArgs> for UploadOptions {
    fn from(args: CredentialArgs) -> Self {
        UploadOptions {
            credentials: Credentials {
                username: args.username,
                password: args.password,
            },
            project_id: args.project_id,
        }
    }
}

fn client(ctx: &RunContext) -> Result<(HttpApi, FileTokenStore)> {
    let config = ctx.load_config()?;
    let api = HttpApi::new(&config.ecotaxa).context("Failed to create the HTTP client")?;
    let store = FileTokenStore::default_location()?;
    info!("EcoTaxa API: {}", config.ecotaxa.api_url);
    Ok((api, store))
}

/// Upload the prepared archives
pub fn run(ctx: RunContext, options: UploadOptions) -> Result<()> {
    info!("CytoProcess - upload to EcoTaxa");
    let (api, store) = client(&ctx)?;

    let summary =
        stages::upload(&ctx, &api, &store, &ConsolePrompt, &options).context("Upload failed")?;
    print_summary(&summary);
    Ok(())
}

/// Run every stage, then upload
pub fn all(ctx: RunContext, options: UploadOptions) -> Result<()> {
    info!("CytoProcess - full pipeline");
    let (api, store) = client(&ctx)?;

    let summaries = stages::run_all(&ctx, &api, &store, &ConsolePrompt, &options)
        .context("Processing failed")?;
    for summary in &summaries {
        print_summary(summary);
    }
    Ok(())
}
