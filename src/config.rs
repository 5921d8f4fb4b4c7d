use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, ValueEnum};

use crate::blob_store::{BlobStore, DEFAULT_GCS_API_BASE, GcsStore, LocalStore, MemoryStore};
use crate::http_client::build_client;
use crate::season::{Season, today};
use crate::snapshot_store::SnapshotStore;
use crate::stats_api::{DEFAULT_STATS_BASE_URL, default_stats_headers};

const DEFAULT_BUCKET: &str = "nba-data";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Gcs,
    Local,
    Memory,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Bucket holding raw and gold tables
    #[arg(long, global = true, env = "NBA_BUCKET", default_value = DEFAULT_BUCKET)]
    pub bucket: String,

    /// Object store backend
    #[arg(long, global = true, env = "NBA_STORE_BACKEND", value_enum, default_value = "gcs")]
    pub store: StoreKind,

    /// Root directory for the local backend (one subdirectory per bucket)
    #[arg(long, global = true, env = "NBA_LOCAL_ROOT", default_value = "data")]
    pub local_root: PathBuf,

    /// Cloud Storage JSON API base URL
    #[arg(long, global = true, env = "GCS_API_BASE", default_value = DEFAULT_GCS_API_BASE)]
    pub gcs_api_base: String,

    /// OAuth bearer token for Cloud Storage
    #[arg(long, global = true, env = "GCS_ACCESS_TOKEN", hide_env_values = true)]
    pub gcs_access_token: Option<String>,

    /// Stats API base URL
    #[arg(long, global = true, env = "NBA_STATS_BASE_URL", default_value = DEFAULT_STATS_BASE_URL)]
    pub stats_base_url: String,

    /// Extra PEM bundle trusted for outbound TLS (corporate proxies)
    #[arg(long, global = true, env = "NBA_CA_BUNDLE")]
    pub ca_bundle: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "NBA_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub http_timeout_secs: u64,

    /// Season protected from backfill unless explicitly included
    /// (default: the season in progress today)
    #[arg(long, global = true, env = "NBA_CURRENT_SEASON")]
    pub current_season: Option<Season>,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub ca_bundle: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Gcs {
        api_base: String,
        access_token: Option<String>,
    },
    Local {
        root: PathBuf,
    },
    Memory,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub bucket: String,
    pub store: StoreBackend,
    pub http: HttpConfig,
    pub stats_base_url: String,
    pub stats_headers: Vec<(String, String)>,
    pub current_season: Season,
}

impl PipelineConfig {
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let bucket = args.bucket.trim().to_string();
        if bucket.is_empty() {
            return Err(anyhow!("bucket name must not be empty"));
        }
        if args.http_timeout_secs == 0 {
            return Err(anyhow!("http timeout must be at least one second"));
        }
        if let Some(path) = args.ca_bundle.as_ref()
            && !path.exists()
        {
            return Err(anyhow!("ca bundle not found at {}", path.display()));
        }

        let store = match args.store {
            StoreKind::Gcs => StoreBackend::Gcs {
                api_base: args.gcs_api_base.clone(),
                access_token: args
                    .gcs_access_token
                    .as_ref()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
            },
            StoreKind::Local => StoreBackend::Local {
                root: args.local_root.clone(),
            },
            StoreKind::Memory => StoreBackend::Memory,
        };

        Ok(Self {
            bucket,
            store,
            http: HttpConfig {
                timeout: Duration::from_secs(args.http_timeout_secs),
                ca_bundle: args.ca_bundle.clone(),
            },
            stats_base_url: args.stats_base_url.trim_end_matches('/').to_string(),
            stats_headers: default_stats_headers(),
            current_season: args
                .current_season
                .unwrap_or_else(|| Season::containing(today())),
        })
    }

    pub fn open_store(&self) -> Result<SnapshotStore<Box<dyn BlobStore>>> {
        let blobs: Box<dyn BlobStore> = match &self.store {
            StoreBackend::Gcs {
                api_base,
                access_token,
            } => {
                let client = build_client(&self.http, &[]).context("build storage client")?;
                Box::new(GcsStore::new(
                    client,
                    api_base,
                    &self.bucket,
                    access_token.clone(),
                )?)
            }
            StoreBackend::Local { root } => Box::new(LocalStore::new(root, &self.bucket)),
            StoreBackend::Memory => Box::new(MemoryStore::new()),
        };
        Ok(SnapshotStore::new(blobs))
    }
}
