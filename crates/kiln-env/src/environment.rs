//! Environment creation: fetch, solve, plan and apply in one call.

use std::sync::Arc;

use futures_util::future::try_join_all;

use crate::config::Config;
use crate::error::{EnvError, Result};
use crate::installer::OperationExecutor;
use crate::lock::{LockFile, LockFileBuilder};
use crate::package::{Channel, MatchSpec, Platform};
use crate::repository::{
    ChannelData, ChannelFetcher, InstalledState, InstalledStateReader, RepositoryIndex, VirtualPackage,
};
use crate::solver::{CancellationToken, Request, Solver, SolverResult, Transaction};

/// What to create
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Channels in priority order; empty means the configured defaults
    pub channels: Vec<String>,
    /// Match specs to install
    pub specs: Vec<String>,
    /// Plan without executing
    pub dry_run: bool,
    /// Target platform; the host platform when `None`
    pub platform: Option<String>,
    /// Virtual package descriptors (`__name=version[=build]`) added on top of
    /// the detected ones
    pub virtual_packages: Vec<String>,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channels.push(channel.into());
        self
    }

    pub fn with_spec(mut self, spec: impl Into<String>) -> Self {
        self.specs.push(spec.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_virtual_package(mut self, descriptor: impl Into<String>) -> Self {
        self.virtual_packages.push(descriptor.into());
        self
    }
}

/// The outcome of [`create_environment`]
#[derive(Debug, Clone)]
pub struct EnvironmentReport {
    pub platform: Platform,
    /// Canonical names of the channels solved against, in priority order
    pub channels: Vec<String>,
    pub solved: SolverResult,
    pub transaction: Transaction,
    pub dry_run: bool,
}

impl EnvironmentReport {
    /// Lock the solved records under `environment` for the solved platform
    pub fn lock_file(&self, environment: &str) -> LockFile {
        LockFileBuilder::new()
            .with_channels(environment, self.channels.iter().cloned())
            .with_solved(environment, self.platform, &self.solved)
            .finish()
    }
}

/// Configuration plus the collaborators environment creation talks to
pub struct Environment {
    pub config: Config,
    fetcher: Arc<dyn ChannelFetcher>,
    installed: Arc<dyn InstalledStateReader>,
    executor: Option<Arc<dyn OperationExecutor>>,
}

impl Environment {
    /// Create a builder for an environment
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    /// Run [`create_environment`] against this environment
    pub async fn create(&self, options: &CreateOptions) -> Result<EnvironmentReport> {
        create_environment(options, self).await
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("config", &self.config)
            .field("executor", &self.executor.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for creating Environment instances.
#[derive(Default)]
pub struct EnvironmentBuilder {
    config: Option<Config>,
    fetcher: Option<Arc<dyn ChannelFetcher>>,
    installed: Option<Arc<dyn InstalledStateReader>>,
    executor: Option<Arc<dyn OperationExecutor>>,
}

impl EnvironmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ChannelFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_installed(mut self, installed: Arc<dyn InstalledStateReader>) -> Self {
        self.installed = Some(installed);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn OperationExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Build the environment. A fetcher is required; without an installed
    /// state reader the environment starts empty.
    pub fn build(self) -> Result<Environment> {
        let fetcher = self
            .fetcher
            .ok_or_else(|| EnvError::Config("No channel fetcher configured".to_string()))?;

        Ok(Environment {
            config: self.config.unwrap_or_default(),
            fetcher,
            installed: self
                .installed
                .unwrap_or_else(|| Arc::new(InstalledState::new())),
            executor: self.executor,
        })
    }
}

/// Resolve `options.specs` against `options.channels` and bring the
/// environment to the solved state.
///
/// Every spec is parsed before anything is fetched. All (channel, subdir)
/// pairs are fetched concurrently and the solve runs on the blocking pool.
/// With `dry_run` the plan is returned without calling the executor.
pub async fn create_environment(options: &CreateOptions, env: &Environment) -> Result<EnvironmentReport> {
    let start = std::time::Instant::now();
    let config = &env.config;

    let specs = options
        .specs
        .iter()
        .map(|spec| spec.parse::<MatchSpec>())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let requested_platform = options
        .platform
        .as_deref()
        .map(str::parse::<Platform>)
        .transpose()?;
    let platform = requested_platform.unwrap_or_else(Platform::current);

    let channel_names = if options.channels.is_empty() {
        &config.default_channels
    } else {
        &options.channels
    };
    let channels = channel_names
        .iter()
        .map(|name| Channel::parse(name, &config.channel_alias))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let extra_virtual = options
        .virtual_packages
        .iter()
        .map(|descriptor| descriptor.parse::<VirtualPackage>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut virtual_packages = VirtualPackage::detect(requested_platform, &config.virtual_package_overrides);
    VirtualPackage::merge(&mut virtual_packages, &extra_virtual);

    log::debug!(
        "Creating environment for {} from {} with {} specs",
        platform,
        channels.iter().map(|c| c.name()).collect::<Vec<_>>().join(", "),
        specs.len()
    );

    let channel_data = fetch_channels(env.fetcher.as_ref(), &channels, platform).await?;
    let mut index = RepositoryIndex::load(channel_data, platform);
    index.add_virtual_packages(&virtual_packages);

    let mut installed = env.installed.read().map_err(EnvError::InstalledState)?;
    installed.canonicalize_channels(&config.channel_alias);
    let installed = Arc::new(installed);

    let mut request = Request::new();
    for spec in specs {
        request.install(spec);
    }
    request.installed(installed.clone()).keep_explicit(config.keep_explicit);
    if let Some(timeout) = config.solve_timeout_duration() {
        request.cancellation(CancellationToken::with_timeout(timeout));
    }

    let index = Arc::new(index);
    let policy = config.policy();
    let solved = tokio::task::spawn_blocking(move || Solver::new(&index, &policy).solve(&request)).await??;

    let transaction = Transaction::plan(&solved, &installed)?;

    if options.dry_run {
        log::info!("Dry run: {}", transaction.summary());
    } else if !transaction.is_empty() {
        let executor = env
            .executor
            .as_ref()
            .ok_or_else(|| EnvError::Config("No operation executor configured".to_string()))?;
        executor.execute(&transaction).await.map_err(EnvError::Execute)?;
    }

    log::info!(
        "Environment for {} ready in {:.3} seconds",
        platform,
        start.elapsed().as_secs_f64()
    );

    Ok(EnvironmentReport {
        platform,
        channels: channels.iter().map(|channel| channel.name().to_string()).collect(),
        solved,
        transaction,
        dry_run: options.dry_run,
    })
}

/// Fetch `platform` and `noarch` of every channel, keeping channel order
async fn fetch_channels(
    fetcher: &dyn ChannelFetcher,
    channels: &[Channel],
    platform: Platform,
) -> Result<Vec<ChannelData>> {
    let mut subdirs = vec![platform];
    if platform != Platform::NoArch {
        subdirs.push(Platform::NoArch);
    }

    let pairs: Vec<(&Channel, Platform)> = channels
        .iter()
        .flat_map(|channel| subdirs.iter().map(move |subdir| (channel, *subdir)))
        .collect();

    let fetches = pairs.into_iter().map(|(channel, subdir)| async move {
        let records = fetcher.fetch(channel, subdir).await.map_err(|source| EnvError::Fetch {
            channel: channel.name().to_string(),
            subdir: subdir.to_string(),
            source,
        })?;
        log::debug!("Fetched {} records from {}/{}", records.len(), channel, subdir);
        Ok::<_, EnvError>(ChannelData::new(channel.name(), subdir.as_str(), records))
    });

    try_join_all(fetches).await
}
