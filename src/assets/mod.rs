/// Zip extraction into the repository root
pub mod extract;
/// Remote archive download
pub mod fetch;
/// Existence checks and download-if-missing
pub mod provision;

pub use fetch::{ArchiveFetcher, HttpFetcher};
pub use provision::{ensure_assets, ProvisionError};
