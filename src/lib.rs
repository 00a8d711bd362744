//! drive_zip - Mirror a Google Drive file or folder tree into one zip archive.
//!
//! The library is split along the pipeline:
//! - [`gateway`] is the interface to the remote store, implemented for
//!   Google Drive by [`DriveClient`]
//! - [`traversal`] walks the tree and streams each file into the archive
//! - [`archive`] writes the zip, one entry at a time
//! - [`path_namer`] decides where each file lands inside the archive
//!
//! # Example
//!
//! ```no_run
//! use drive_zip::{ArchiveSink, Authenticator, DriveClient, Traversal};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_file("service-account.json", vec![
//!         "https://www.googleapis.com/auth/drive.readonly".to_string(),
//!     ])?;
//!     let client = DriveClient::new(auth);
//!     let sink = ArchiveSink::create("google-drive.zip").await?;
//!
//!     let result = Traversal::new(&client, &sink, 8).run("folder-id").await;
//!     match result {
//!         Ok(tree) => {
//!             let bytes = sink.finalize().await?;
//!             println!("{} files, {} bytes", tree.file_count(), bytes);
//!         }
//!         Err(e) => {
//!             sink.abort().await;
//!             return Err(e.into());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logger;
pub mod models;
pub mod path_namer;
pub mod traversal;
pub mod url_parser;

// Re-exports for convenience
pub use archive::{ArchiveSink, EntryHandle};
pub use auth::Authenticator;
pub use client::DriveClient;
pub use error::{DriveError, Result};
pub use gateway::{ByteStream, ContentStream, RemoteGateway};
pub use models::{ObjectKind, RemoteObject};
pub use traversal::{Traversal, TraversalNode};
pub use url_parser::extract_id;
