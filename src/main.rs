//! drive_inventory CLI - List owned and shared Google Drive files as a report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use drive_inventory::report::{self, RunTimer};
use drive_inventory::{
    DriveClient, FileTokenStore, InstalledAppAuthenticator, ServiceAccountAuthenticator,
    TokenSource, Traverser,
};

/// CLI tool that reports ownership and sharing of Google Drive files.
#[derive(Parser)]
#[command(name = "drive_inventory")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// OAuth client secret JSON, used for the first-run consent flow.
    #[arg(long, env = "GOOGLE_CLIENT_SECRET_FILE", default_value = "credentials.json")]
    client_secret: PathBuf,

    /// Where the user token is stored between runs.
    #[arg(long, env = "GOOGLE_TOKEN_FILE", default_value = "token.json")]
    token_file: PathBuf,

    /// Service account JSON; when set, user OAuth is skipped.
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    service_account: Option<PathBuf>,

    /// CSV report path.
    #[arg(long, short = 'o', default_value = "google_drive_files.csv")]
    output: PathBuf,

    /// Items requested per API page (1-1000).
    #[arg(long, default_value_t = 100)]
    page_size: u32,

    /// Do not print the table to the console.
    #[arg(long)]
    no_table: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let timer = RunTimer::start();
    println!("{}", timer.start_line());

    let auth: Arc<dyn TokenSource> = match &cli.service_account {
        Some(path) => Arc::new(
            ServiceAccountAuthenticator::from_file(path)
                .with_context(|| format!("Failed to load service account from {:?}", path))?,
        ),
        None => Arc::new(InstalledAppAuthenticator::new(
            FileTokenStore::new(&cli.token_file),
            &cli.client_secret,
        )),
    };

    auth.access_token()
        .await
        .context("Failed to obtain Google Drive credentials")?;

    let client = DriveClient::new(auth).with_page_size(cli.page_size);
    let traverser = Traverser::new(&client);

    let root_files = traverser
        .list_root_files()
        .await
        .context("Failed to list root files")?;
    let tree_files = traverser
        .list_files_recursively(None, "")
        .await
        .context("Failed to list folder tree")?;
    let shared_files = traverser
        .list_shared_with_me_files_recursively(None, "")
        .await
        .context("Failed to list shared with me")?;

    let records = report::combine(root_files, tree_files, shared_files);
    info!(total = records.len(), "collected records");

    report::write_csv(&cli.output, &records)
        .with_context(|| format!("Failed to write CSV to {:?}", cli.output))?;

    if !cli.no_table {
        print!("{}", report::render_table(&records));
    }

    let summary = timer.finish();
    println!("{}", summary.end_line());
    println!("{}", summary.duration_line());

    Ok(())
}
