//! Command-line entry point: download every new document of an epost folder.

use anyhow::Context;
use clap::Parser;
use epost_download::{Client, DownloadReport};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Longest cookie string echoed in full.
const COOKIE_DISPLAY_MAX: usize = 78;
/// Characters kept when a cookie string is shortened for display.
const COOKIE_DISPLAY_KEEP: usize = 75;

#[derive(Parser, Debug)]
#[command(name = "epost-download")]
#[command(version)]
#[command(about = "Download Canada Post epost documents using existing session cookies", long_about = None)]
struct Cli {
    /// epost session cookies
    #[arg(
        short,
        long,
        env = "EPOST_COOKIES",
        hide_env_values = true,
        value_name = "COOKIE_VALUES"
    )]
    cookies: String,

    /// Destination for downloads
    #[arg(short, long, default_value = ".", value_name = "DEST")]
    dest: PathBuf,

    /// epost folder id (0 is the inbox)
    #[arg(short, long, default_value_t = 0, value_name = "FOLDER_ID")]
    folder: u64,

    /// Proxy URL for all requests
    #[arg(long, value_name = "URL")]
    proxy: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Override the browser-like user agent
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Print the run report as JSON instead of status lines
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn display_cookies(cookies: &str) -> String {
    if cookies.chars().count() > COOKIE_DISPLAY_MAX {
        let kept: String = cookies.chars().take(COOKIE_DISPLAY_KEEP).collect();
        format!("{kept}...")
    } else {
        cookies.to_string()
    }
}

fn display_folder(folder: u64) -> String {
    if folder == 0 {
        "Inbox (0)".to_string()
    } else {
        folder.to_string()
    }
}

fn print_report(report: &DownloadReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for result in &report.results {
        println!("{result}");
    }
    println!(
        "Processed {} of {}! Downloaded {} new documents. 🎉",
        report.processed, report.total, report.downloaded
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("Processing epost document download with the following arguments:");
    println!("  --cookies : {}", display_cookies(&cli.cookies));
    println!("  --dest    : {}", cli.dest.display());
    println!("  --folder  : {}", display_folder(cli.folder));

    let mut builder = Client::builder(cli.cookies.as_str()).dest(cli.dest.clone());
    if let Some(proxy) = &cli.proxy {
        builder = builder.proxy(proxy.as_str());
    }
    if let Some(secs) = cli.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(user_agent) = &cli.user_agent {
        builder = builder.user_agent(user_agent.as_str());
    }

    let client = builder.build().await.context("opening epost session")?;

    let mut report = DownloadReport::default();
    let outcome = client.download_into(cli.folder, &mut report).await;
    client.close();

    print_report(&report, cli.json)?;
    outcome.with_context(|| format!("downloading epost folder {}", display_folder(cli.folder)))?;
    Ok(())
}
