//! Descheduler policy and command-line settings
//!
//! The policy file is read with the `config` crate, `DESCHEDULER__`-prefixed
//! environment variables override it, and command-line flags override both.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use descheduler_lib::config::DeschedulerStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Prefix of environment variables overriding policy keys
pub const ENV_PREFIX: &str = "DESCHEDULER";

/// Separator between nested policy keys in environment variables
pub const ENV_SEPARATOR: &str = "__";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

/// Bin-packing descheduler
#[derive(Debug, Parser)]
#[command(name = "descheduler")]
#[command(author, version, about = "Evicts pods from the least utilized node so they can be packed elsewhere", long_about = None)]
pub struct Cli {
    /// Policy file (YAML, JSON or TOML)
    #[arg(long, env = "DESCHEDULER_POLICY_CONFIG_FILE")]
    pub policy_config_file: Option<PathBuf>,

    /// Simulate evictions without removing any pod
    #[arg(long)]
    pub dry_run: bool,

    /// Also evict pods that use node-local storage
    #[arg(long)]
    pub evict_local_storage_pods: bool,

    /// Seconds between runs; 0 runs once and exits
    #[arg(long)]
    pub descheduling_interval: Option<u64>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Eviction API group version, e.g. policy/v1
    #[arg(long)]
    pub policy_group_version: Option<String>,

    /// Per-run deadline in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Only consider nodes matching this label selector
    #[arg(long)]
    pub node_selector: Option<String>,

    /// Port serving /healthz, /readyz and /metrics
    #[arg(long, env = "DESCHEDULER_API_PORT", default_value_t = 8080)]
    pub api_port: u16,

    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Overlay the flags that were given on top of `policy`
    pub fn apply(&self, policy: &mut DeschedulerPolicy) {
        if self.dry_run {
            policy.bin_packing.dry_run = true;
        }
        if self.evict_local_storage_pods {
            policy.bin_packing.evict_local_storage_pods = true;
        }
        if let Some(interval) = self.descheduling_interval {
            policy.descheduling_interval_secs = interval;
        }
        if let Some(version) = &self.policy_group_version {
            policy.bin_packing.policy_group_version = version.clone();
        }
        if let Some(timeout) = self.timeout {
            policy.timeout_secs = timeout;
        }
        if let Some(selector) = &self.node_selector {
            policy.node_selector = Some(selector.clone());
        }
    }
}

/// Contents of the policy file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeschedulerPolicy {
    #[serde(default)]
    pub bin_packing: DeschedulerStrategy,

    /// Seconds between runs; 0 runs once
    #[serde(default)]
    pub descheduling_interval_secs: u64,

    /// Per-run deadline in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub node_selector: Option<String>,
}

fn default_timeout() -> u64 {
    300
}

impl Default for DeschedulerPolicy {
    fn default() -> Self {
        Self {
            bin_packing: DeschedulerStrategy::default(),
            descheduling_interval_secs: 0,
            timeout_secs: default_timeout(),
            node_selector: None,
        }
    }
}

impl DeschedulerPolicy {
    /// Load from an optional policy file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Load from an optional policy file and the given environment
    ///
    /// `None` reads the process environment.
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env),
        );

        let policy = builder
            .build()
            .context("failed to read descheduler policy")?
            .try_deserialize::<Self>()
            .context("failed to parse descheduler policy")?;

        Ok(policy)
    }

    /// Resolve the full policy: file, environment, then flags
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut policy = Self::load(cli.policy_config_file.as_deref())?;
        cli.apply(&mut policy);
        policy.validate()?;
        Ok(policy)
    }

    /// Reject a policy the strategy would refuse to run
    pub fn validate(&self) -> Result<()> {
        if self.bin_packing.enabled {
            self.bin_packing
                .validate()
                .context("invalid bin_packing strategy")?;
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
