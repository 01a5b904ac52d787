//! drive_inventory - Report on files in a Google Drive account.
//!
//! This library provides functionality to:
//! - Authenticate as a user (stored token, refresh, browser consent) or a service account
//! - List files at root level, in the full folder tree, and in "Shared with me"
//! - Flatten owner and sharing metadata into records
//! - Write the records as CSV and as a console table
//!
//! # Example
//!
//! ```no_run
//! use drive_inventory::{report, DriveClient, FileTokenStore, InstalledAppAuthenticator, Traverser};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = InstalledAppAuthenticator::new(FileTokenStore::new("token.json"), "credentials.json");
//!     let client = DriveClient::new(auth);
//!     let traverser = Traverser::new(&client);
//!
//!     let root = traverser.list_root_files().await?;
//!     let tree = traverser.list_files_recursively(None, "").await?;
//!     let shared = traverser.list_shared_with_me_files_recursively(None, "").await?;
//!
//!     let records = report::combine(root, tree, shared);
//!     report::write_csv("google_drive_files.csv", &records)?;
//!     print!("{}", report::render_table(&records));
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod query;
pub mod report;
pub mod token_store;
pub mod traverse;

// Re-exports for convenience
pub use auth::{InstalledAppAuthenticator, ServiceAccountAuthenticator, TokenSource};
pub use client::{DriveClient, FileSource};
pub use error::{DriveError, Result};
pub use models::{DriveFile, FileRecord};
pub use token_store::{FileTokenStore, TokenStore};
pub use traverse::Traverser;
