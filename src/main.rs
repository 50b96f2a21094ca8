// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use loadout::cache::AdvertisingCache;
use loadout::feed::HttpPackageFeed;
use loadout::fetcher::download_packages;
use loadout::manifest::WorkloadDefinition;
use loadout::provider::{
    ManifestSource, SDK_VERSION_ENV, SdkDirectoryManifestProvider, resolve_host_version,
};
use loadout::stager::extract_to_temp;
use loadout::updater::{UpdateStage, calculate_updates};
use std::env;
use tracing::info;

#[derive(Parser)]
#[command(name = "loadout")]
#[command(author, version, about = "Workload manifest resolver and updater for modular SDK installations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output verbosity for the search command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Verbosity {
    Quiet,
    Minimal,
    Normal,
    Detailed,
    Diagnostic,
}

impl Verbosity {
    fn is_detailed_or_diagnostic(self) -> bool {
        matches!(self, Verbosity::Detailed | Verbosity::Diagnostic)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List workloads available for the host SDK version
    Search {
        /// Workload id substring to match (optional, shows all if omitted)
        filter: Option<String>,
        /// Host SDK version (defaults to LOADOUT_SDK_VERSION)
        #[arg(short, long)]
        sdk_version: Option<String>,
        /// Installed manifest root directory
        #[arg(short, long, default_value = "/usr/lib/loadout/sdk-manifests")]
        manifest_root: String,
        /// Output verbosity
        #[arg(short, long, value_enum, default_value_t = Verbosity::Normal)]
        verbosity: Verbosity,
    },
    /// Download and stage newer workload manifests
    Update {
        /// Base URL of the workload package feed
        #[arg(long)]
        feed_url: String,
        /// Host SDK version (defaults to LOADOUT_SDK_VERSION)
        #[arg(short, long)]
        sdk_version: Option<String>,
        /// Installed manifest root directory
        #[arg(short, long, default_value = "/usr/lib/loadout/sdk-manifests")]
        manifest_root: String,
        /// Advertising cache store path
        #[arg(long, default_value = "/var/lib/loadout/advertising.db")]
        cache_path: String,
        /// Directory for downloaded manifest packages
        #[arg(long, default_value = "/var/cache/loadout/downloads")]
        download_path: String,
        /// Staging root for extracted packages
        #[arg(long, default_value = "/var/cache/loadout/staging")]
        temp_root: String,
        /// Consider preview manifest versions
        #[arg(long)]
        include_preview: bool,
        /// Refresh the advertising cache even if it is fresh
        #[arg(short, long)]
        force_refresh: bool,
    },
}

fn load_installed_manifests(
    manifest_root: &str,
    sdk_version: Option<&str>,
) -> Result<Vec<loadout::manifest::WorkloadManifest>> {
    let env_version = env::var(SDK_VERSION_ENV).ok();
    let host_version = resolve_host_version(sdk_version, env_version.as_deref())?;
    info!("Resolved host SDK version: {}", host_version);

    let provider = SdkDirectoryManifestProvider::new(manifest_root);
    Ok(provider.load_manifests(&host_version.to_string())?)
}

fn print_workloads(workloads: &[&WorkloadDefinition], verbosity: Verbosity) {
    if workloads.is_empty() {
        println!("No workloads found.");
        return;
    }

    let id_width = workloads
        .iter()
        .map(|w| w.id.as_str().len())
        .max()
        .unwrap_or(0)
        .max("Workload ID".len());

    println!();
    if verbosity.is_detailed_or_diagnostic() {
        println!("{:<id_width$}  {:<9}  {:<6}  Description", "Workload ID", "Abstract", "Kind");
        for workload in workloads {
            println!(
                "{:<id_width$}  {:<9}  {:<6}  {}",
                workload.id,
                workload.is_abstract,
                workload.kind,
                workload.description
            );
        }
    } else {
        println!("{:<id_width$}  Description", "Workload ID");
        for workload in workloads {
            println!("{:<id_width$}  {}", workload.id, workload.description);
        }
    }
    println!();
}

fn run_search(
    filter: Option<&str>,
    sdk_version: Option<&str>,
    manifest_root: &str,
    verbosity: Verbosity,
) -> Result<()> {
    let manifests = load_installed_manifests(manifest_root, sdk_version)?;
    let available = loadout::resolver::resolve(&manifests)?;

    let workloads = available.query_available(filter);
    print_workloads(&workloads, verbosity);

    // Exit 0 whether the filter matched zero, one, or many entries
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_update(
    feed_url: &str,
    sdk_version: Option<&str>,
    manifest_root: &str,
    cache_path: &str,
    download_path: &str,
    temp_root: &str,
    include_preview: bool,
    force_refresh: bool,
) -> Result<()> {
    let installed = load_installed_manifests(manifest_root, sdk_version)?;
    let cache = AdvertisingCache::open(cache_path)?;
    let feed = HttpPackageFeed::new(feed_url)?;

    info!("Update stage: {}", UpdateStage::Refreshing);
    cache.refresh(&feed, include_preview, force_refresh)?;

    let plan = calculate_updates(&installed, &cache)?;
    info!("Update stage: {}", UpdateStage::PlanCalculated);

    if plan.is_empty() {
        println!("All workload manifests are up to date.");
        return Ok(());
    }

    println!("Manifest updates available:");
    for delta in &plan {
        println!("  {}: {} -> {}", delta.id, delta.from, delta.to);
    }

    info!("Update stage: {}", UpdateStage::Downloading);
    let downloads = download_packages(&feed, &plan, download_path.as_ref())?;

    let staging = extract_to_temp(&downloads.downloaded, temp_root.as_ref())?;
    info!("Update stage: {}", UpdateStage::Staged);

    for package in &staging.staged {
        println!(
            "Staged {} {} at {}",
            package.id,
            package.version,
            package.path.display()
        );
    }

    // Partial failures: successfully staged packages stay usable for
    // installation, so report per-manifest and exit non-zero.
    let mut failures = Vec::new();
    failures.extend(downloads.failed.iter().map(|(id, e)| (id, e)));
    failures.extend(staging.failed.iter().map(|(id, e)| (id, e)));

    if !failures.is_empty() {
        for (id, error) in &failures {
            eprintln!("Failed {}: {}", id, error);
        }
        anyhow::bail!(
            "{} of {} manifest updates failed; staged packages remain valid",
            failures.len(),
            plan.len()
        );
    }

    println!(
        "\n{} manifest package(s) staged for installation under {}",
        staging.staged.len(),
        temp_root
    );
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Search {
            filter,
            sdk_version,
            manifest_root,
            verbosity,
        }) => run_search(
            filter.as_deref(),
            sdk_version.as_deref(),
            &manifest_root,
            verbosity,
        ),
        Some(Commands::Update {
            feed_url,
            sdk_version,
            manifest_root,
            cache_path,
            download_path,
            temp_root,
            include_preview,
            force_refresh,
        }) => {
            let result = run_update(
                &feed_url,
                sdk_version.as_deref(),
                &manifest_root,
                &cache_path,
                &download_path,
                &temp_root,
                include_preview,
                force_refresh,
            );
            if result.is_err() {
                info!("Update stage: {}", UpdateStage::Idle);
            }
            result
        }
        None => {
            // No command provided, show help
            println!("Loadout Workload Engine v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'loadout --help' for usage information");
            Ok(())
        }
    }
}
