//! epost document downloader
//!
//! An async client that walks a Canada Post epost folder page by page and saves
//! every document it has not saved before. Authentication reuses cookies copied
//! from a logged-in browser session.
//!
//! # Example
//! ```no_run
//! use epost_download::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), epost_download::Error> {
//!     let client = Client::builder("SESSION=...; XSRF=...")
//!         .dest("./epost")
//!         .build()
//!         .await?;
//!
//!     let report = client.download(0).await?;
//!     for result in &report.results {
//!         println!("{result}");
//!     }
//!     println!(
//!         "Processed {} of {}, downloaded {}",
//!         report.processed, report.total, report.downloaded
//!     );
//!
//!     client.close();
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod models;
mod retry;
mod token;

pub use client::{Client, ClientBuilder};
pub use config::{ListingFields, ServiceConfig};
pub use error::Error;
pub use models::{DownloadReport, FolderItem, ItemResult, ItemStatus, ListingPage};
pub use retry::RetryPolicy;
pub use token::extract_sso_token;

/// Result type alias for epost operations.
///
/// This is equivalent to `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
