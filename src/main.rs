//! drive_zip CLI - Download a Google Drive file or folder into a zip archive.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::builder::TypedValueParser;
use clap::Parser;
use log::info;

use drive_zip::config::{self, DEFAULT_DOWNLOAD_PATH};
use drive_zip::logger::setup_logging;
use drive_zip::models::format_size;
use drive_zip::traversal::DEFAULT_MAX_IN_FLIGHT;
use drive_zip::{extract_id, ArchiveSink, Authenticator, DriveClient, Traversal};

/// Recursively download a Google Drive file or folder into one zip archive.
#[derive(Parser)]
#[command(name = "drive_zip")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Sharable link or ID of the file or folder to download.
    source: String,

    /// Path to a service account JSON credentials file. When unset, the
    /// JSON blob in GOOGLE_CREDENTIALS is used.
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Pre-issued OAuth access token; skips the service account exchange.
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Shared Drive ID to scope folder listings to.
    #[arg(long, env = "SHARED_DRIVE_ID")]
    drive_id: Option<String>,

    /// Base directory; each run writes to a fresh subdirectory.
    #[arg(long, env = "DRIVE_ZIP_OUTPUT_DIR", default_value = DEFAULT_DOWNLOAD_PATH)]
    output_dir: PathBuf,

    /// Maximum number of files downloading, and of folders being listed, at once.
    #[arg(
        long,
        env = "DRIVE_ZIP_MAX_IN_FLIGHT",
        default_value_t = DEFAULT_MAX_IN_FLIGHT,
        value_parser = clap::value_parser!(u16).range(1..).map(usize::from)
    )]
    max_in_flight: usize,

    /// Enable debug logging.
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let root_id = extract_id(&cli.source)
        .with_context(|| format!("Invalid file or folder URL or ID: {}", cli.source))?;

    let auth = build_authenticator(&cli)?;
    let client = DriveClient::new(auth).with_drive_id(cli.drive_id.clone());

    let destination = config::prepare_destination(&cli.output_dir)
        .with_context(|| format!("Failed to prepare {:?}", cli.output_dir))?;
    let sink = ArchiveSink::create(&destination)
        .await
        .with_context(|| format!("Failed to create archive {:?}", destination))?;

    let result = Traversal::new(&client, &sink, cli.max_in_flight)
        .run(&root_id)
        .await;

    let tree = match result {
        Ok(tree) => tree,
        Err(e) => {
            sink.abort().await;
            return Err(e).with_context(|| format!("Failed to archive {}", root_id));
        }
    };

    let total = sink
        .finalize()
        .await
        .with_context(|| format!("Failed to finalize archive {:?}", destination))?;
    info!("{} total bytes", total);

    println!(
        "Archived {} file(s) ({}) to {:?}",
        tree.file_count(),
        format_size(total),
        destination
    );

    Ok(())
}

fn build_authenticator(cli: &Cli) -> Result<Authenticator> {
    if let Some(token) = &cli.access_token {
        return Ok(Authenticator::from_access_token(token.clone()));
    }

    let scopes = config::scopes();
    match &cli.credentials {
        Some(path) => Authenticator::from_file(path, scopes)
            .with_context(|| format!("Failed to load credentials from {:?}", path)),
        None => Authenticator::from_json(&config::credentials_json(), scopes)
            .with_context(|| format!("Failed to parse {}", config::CREDENTIALS_ENV)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "drive_zip",
            "https://drive.google.com/drive/folders/abc",
            "--max-in-flight",
            "3",
            "--output-dir",
            "/tmp/out",
            "--access-token",
            "tok",
        ])
        .unwrap();
        assert_eq!(cli.max_in_flight, 3);
        assert_eq!(cli.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cli.access_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_cli_rejects_zero_in_flight() {
        let parsed = Cli::try_parse_from(["drive_zip", "abc", "--max-in-flight", "0"]);
        assert!(parsed.is_err());
    }
}
