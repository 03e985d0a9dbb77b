//! onview - NFT collection gallery pipeline
//!
//! This crate turns a wallet address or ENS name (or a list of them) into a
//! curated gallery: wallets are resolved, their tokens fetched from the
//! token API, and the result grouped by curatorial tier and project.

pub mod gallery;
pub mod types;

// Re-export main types for convenience
pub use gallery::{GalleryBuilder, GalleryError, GalleryPipeline};
pub use types::{Address, ResolvedInput, ResolvedWallet};
