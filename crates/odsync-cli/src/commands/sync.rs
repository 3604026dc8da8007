//! Sync command - Mirror a local directory and a OneDrive folder
//!
//! Provides the `odsync sync` CLI command which:
//! 1. Merges command-line flags over the loaded configuration
//! 2. Loads tokens from the key file, refreshing them when a client ID is set
//! 3. Creates the Graph and filesystem adapters
//! 4. Runs the SyncEngine until the queue drains or Ctrl-C is pressed

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use tracing::{info, warn};

use odsync_core::config::{Config, ConfigBuilder};
use odsync_core::domain::{RemotePath, SyncDirection};
use odsync_core::ports::ICloudProvider;
use odsync_graph::auth::{KeyFileTokenStore, OAuth2Config, TokenRefresher};
use odsync_graph::{GraphClient, GraphCloudProvider};
use odsync_sync::{readable_file_size, LocalFileSystemAdapter, SyncEngine, SyncOptions};

use crate::output::{get_formatter, print_summary, OutputFormat};

/// Which side is the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    /// Local directory to OneDrive
    #[value(alias = "upload")]
    Up,
    /// OneDrive to local directory
    #[value(alias = "download")]
    Down,
}

impl From<DirectionArg> for SyncDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Up => SyncDirection::Upload,
            DirectionArg::Down => SyncDirection::Download,
        }
    }
}

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Local directory
    #[arg(long)]
    pub local: PathBuf,

    /// OneDrive folder, e.g. /Documents
    #[arg(long, default_value = "/")]
    pub remote: String,

    /// Sync direction (defaults to the configured one)
    #[arg(long, value_enum)]
    pub direction: Option<DirectionArg>,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Number of worker tasks
    #[arg(long)]
    pub threads: Option<usize>,

    /// Skip files larger than this many KB
    #[arg(long, value_name = "KB")]
    pub max_size: Option<u64>,

    /// Compare checksums even when size and dates match
    #[arg(long)]
    pub hash_compare: bool,

    /// Keep destination items that are missing on the source side
    #[arg(long)]
    pub no_mirror: bool,

    /// JSON file holding the OAuth tokens
    #[arg(long)]
    pub key_file: Option<PathBuf>,
}

impl SyncCommand {
    /// Applies the flags that were given on top of `config`
    fn merge(&self, config: Config) -> Config {
        let mut builder = ConfigBuilder::from_config(config);
        if let Some(direction) = self.direction {
            builder = builder.sync_direction(direction.into());
        }
        if let Some(threads) = self.threads {
            builder = builder.sync_threads(threads);
        }
        if self.max_size.is_some() {
            builder = builder.sync_max_size_kb(self.max_size);
        }
        if self.hash_compare {
            builder = builder.sync_hash_compare(true);
        }
        if self.no_mirror {
            builder = builder.sync_mirror_deletes(false);
        }
        if let Some(key_file) = &self.key_file {
            builder = builder.auth_key_file(key_file.clone());
        }
        builder.build()
    }

    fn connect(config: &Config) -> Result<GraphCloudProvider> {
        let refresher = config
            .auth
            .client_id
            .as_deref()
            .map(|id| TokenRefresher::new(&OAuth2Config::new(id)))
            .transpose()?;
        if refresher.is_none() {
            warn!("No auth.client_id configured, expired tokens cannot be refreshed");
        }

        let store = KeyFileTokenStore::load(&config.auth.key_file, refresher)
            .context("Failed to load OAuth tokens")?;
        Ok(GraphCloudProvider::new(GraphClient::from_token_source(
            Arc::new(store),
        )))
    }

    /// Execute the sync command
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let config = self.merge(config);
        let errors = config.validate();
        if !errors.is_empty() {
            for error in &errors {
                formatter.error(&error.to_string());
            }
            bail!("Invalid configuration ({} error(s))", errors.len());
        }

        let remote_path = RemotePath::new(self.remote.clone())?;
        let cloud = Arc::new(Self::connect(&config)?);

        let drive = cloud.drive_info().await.context("Failed to query drive")?;
        info!(
            drive_id = %drive.id,
            drive_type = %drive.drive_type,
            used = %readable_file_size(drive.quota_used),
            total = %readable_file_size(drive.quota_total),
            "Connected to OneDrive"
        );

        let root = cloud
            .get_path(&remote_path)
            .await
            .with_context(|| format!("Failed to resolve remote folder {remote_path}"))?;

        let mut options = SyncOptions::from_config(&config);
        options.dry_run = self.dry_run;

        let engine = SyncEngine::new(cloud, Arc::new(LocalFileSystemAdapter::new()), options);

        let cancel = engine.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, waiting for running tasks");
                cancel.cancel();
            }
        });

        let summary = engine.run(root, self.local.clone()).await?;
        print_summary(formatter.as_ref(), format, &summary);

        if !summary.is_success() {
            bail!("Sync did not complete successfully");
        }
        Ok(())
    }
}
