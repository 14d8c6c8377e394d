//! NAR-Harvest main entry point
//!
//! This is the command-line interface for discovering and downloading
//! extension bundles from a remote directory listing.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use nar_harvest::config::load_properties;
use nar_harvest::{HttpsResourceProvider, ResourceDescriptor};
use std::path::PathBuf;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

/// NAR-Harvest: remote extension bundle discovery
///
/// Crawls an HTTP directory listing (HTML table or JSON array) breadth-first
/// and lists or downloads the bundles it finds.
#[derive(Parser, Debug)]
#[command(name = "nar-harvest")]
#[command(version)]
#[command(about = "Discover and fetch bundles from an HTTP directory listing", long_about = None)]
struct Cli {
    /// Path to TOML provider properties
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the listing and print every discovered resource
    List {
        /// Print descriptors as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Download one resource by its location
    Fetch {
        /// Resource location as printed by `list`
        #[arg(value_name = "LOCATION")]
        location: String,

        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Validate the configuration and print the effective settings
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading properties from: {}", cli.config.display());
    let properties = load_properties(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let provider =
        HttpsResourceProvider::from_properties(&properties).context("Invalid provider properties")?;

    match cli.command {
        Command::List { json } => handle_list(&provider, json).await,
        Command::Fetch { location, output } => handle_fetch(&provider, location, output).await,
        Command::Check => handle_check(&provider),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("nar_harvest=info,warn"),
            1 => EnvFilter::new("nar_harvest=debug,info"),
            2 => EnvFilter::new("nar_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles `list`: crawls and prints one descriptor per line
async fn handle_list(provider: &HttpsResourceProvider, json: bool) -> Result<()> {
    let descriptors = provider
        .list_resources()
        .await
        .context("Failed to list resources")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
    } else {
        for descriptor in &descriptors {
            println!("{}\t{}", descriptor.last_modified, descriptor.location);
        }
    }

    Ok(())
}

/// Handles `fetch`: streams one resource to a file or stdout
async fn handle_fetch(
    provider: &HttpsResourceProvider,
    location: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let descriptor = ResourceDescriptor::new(location, 0);

    let written = match &output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Cannot create {}", path.display()))?;
            copy_resource(provider, &descriptor, &mut file).await?
        }
        None => copy_resource(provider, &descriptor, &mut tokio::io::stdout()).await?,
    };

    tracing::info!("Fetched {} ({} bytes)", descriptor.location, written);
    Ok(())
}

async fn copy_resource<W>(
    provider: &HttpsResourceProvider,
    descriptor: &ResourceDescriptor,
    sink: &mut W,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut stream = provider
        .fetch(descriptor)
        .await
        .with_context(|| format!("Failed to fetch {}", descriptor.location))?;

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        sink.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    sink.flush().await?;

    Ok(written)
}

/// Handles `check`: prints the validated settings
fn handle_check(provider: &HttpsResourceProvider) -> Result<()> {
    let settings = provider.settings()?;

    println!("=== NAR-Harvest Configuration ===\n");
    println!("Base URL: {}", settings.base_url);
    if !settings.nar_location.is_empty() {
        println!("NAR location: {}", settings.nar_location);
    }
    println!("Filter: {}", settings.filter_pattern);
    println!("Listing format: {}", settings.format);

    println!("\nLocators:");
    println!("  Entry list: {}", settings.parser.file_list_identifier);
    println!("  Location: {}", settings.parser.location_identifier);
    println!("  Last modified: {}", settings.parser.last_modification_identifier);
    println!("  Directory: {}", settings.parser.directory_identifier);
    println!("  Date-time format: {}", settings.parser.date_time_format);

    let transport = &settings.transport;
    println!("\nTransport:");
    println!("  User: {}", transport.credentials.user);
    println!("  Connect timeout: {:?}", transport.connect_timeout);
    println!("  Read timeout: {:?}", transport.read_timeout);
    match &transport.proxy {
        Some(proxy) => println!(
            "  Proxy: {}{}",
            proxy.url(),
            if proxy.credentials.is_some() {
                " (authenticated)"
            } else {
                ""
            }
        ),
        None => println!("  Proxy: none"),
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}
