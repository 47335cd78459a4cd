use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use extdata::link::link_path;
use extdata::{Config, DataEntity, Manager, ResolvedLink, run_downloads};
use extdata_fetch::{Client, PoolClient, StorageClient};
use tracing::info;

use super::{App, Commands, GlobalArgs};

/// Applies command line overrides on top of the layered config.
pub fn load_config(global: &GlobalArgs) -> anyhow::Result<Config> {
    let mut config = Config::load(global.config.as_deref()).context("loading configuration")?;
    if let Some(root) = &global.data_root {
        config.data_root = root.clone();
    }
    if let Some(url) = &global.artifacts_url {
        config.artifacts_url = url.clone();
    }
    if !global.servers.is_empty() {
        config.servers = global.servers.clone();
    }
    if let Some(n) = global.parallelism {
        config.parallelism = n;
    }
    Ok(config)
}

pub async fn run(app: App) -> anyhow::Result<()> {
    let config = load_config(&app.global)?;
    match app.cmd {
        Commands::Prepare(args) => prepare(&config, &args.entities),
        Commands::Fetch(args) => fetch(&config, &args.entities).await,
        Commands::Purgeable => purgeable(&config),
        Commands::Status => status(&config).await,
        Commands::Verify(args) => verify(&config, &args.file),
    }
}

fn manager(config: &Config) -> anyhow::Result<Manager> {
    Manager::new(&config.data_root, &config.artifacts_url)
        .with_context(|| format!("scanning {}", config.data_root.display()))
}

fn prepare(config: &Config, entities: &[DataEntity]) -> anyhow::Result<()> {
    let manager = manager(config)?;
    let (jobs, release) = manager.prepare_downloads(entities);
    for job in &jobs {
        println!("{}", job.link.computed_url());
        for dest in &job.dests {
            println!("  -> {}", dest.display());
        }
    }
    for (dest, msg) in manager.failures(entities) {
        println!("error: {}: {msg}", dest.display());
    }
    release.release();
    Ok(())
}

async fn fetch(config: &Config, entities: &[DataEntity]) -> anyhow::Result<()> {
    let manager = manager(config)?;
    let (jobs, release) = manager.prepare_downloads(entities);

    let report = if config.servers.is_empty() {
        let client = StorageClient::with_endpoint(&config.storage_endpoint)?;
        download(config, &manager, jobs, client).await
    } else {
        let pool = PoolClient::connect(&config.servers, config.pool_options()).await?;
        info!("{}", pool.status());
        download(config, &manager, jobs, pool).await
    };

    let failures = manager.failures(entities);
    for (dest, msg) in &failures {
        eprintln!("{}: {msg}", dest.display());
    }
    release.release();

    println!(
        "{} of {} downloads succeeded ({} bytes)",
        report.succeeded,
        report.total(),
        report.bytes
    );
    if !failures.is_empty() {
        bail!("{} external data files are unavailable", failures.len());
    }
    Ok(())
}

async fn download<C: Client + 'static>(
    config: &Config,
    manager: &Manager,
    jobs: Vec<extdata::DownloadJob>,
    client: C,
) -> extdata::DownloadReport {
    run_downloads(
        manager.data_root(),
        jobs,
        Arc::new(client),
        &config.download_options(),
    )
    .await
}

fn purgeable(config: &Config) -> anyhow::Result<()> {
    for path in manager(config)?.purgeable() {
        println!("{}", path.display());
    }
    Ok(())
}

async fn status(config: &Config) -> anyhow::Result<()> {
    if config.servers.is_empty() {
        bail!("no backend servers configured");
    }
    let pool = PoolClient::connect(&config.servers, config.pool_options()).await?;
    println!("{}", pool.status());
    if pool.up_servers().is_empty() {
        bail!("no backend servers are up");
    }
    Ok(())
}

fn verify(config: &Config, file: &Path) -> anyhow::Result<()> {
    let sidecar = link_path(file);
    let link = ResolvedLink::load(&sidecar, &config.artifacts_url)?
        .with_context(|| format!("{} has no link sidecar", file.display()))?;
    extdata::verify(file, &link).with_context(|| format!("verifying {}", file.display()))?;
    println!("{}: OK", file.display());
    Ok(())
}
