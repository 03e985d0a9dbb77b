//! Data model for tokens, projects and pipeline configuration.

use crate::gallery::error::GalleryError;
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Project metadata as returned alongside every token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project title
    pub name: String,
    /// Artist name
    #[serde(default)]
    pub artist_name: String,
    /// Curation status, e.g. "Curated" or "Factory"
    #[serde(default)]
    pub curation_status_display: Option<String>,
    /// Vertical, e.g. "curated", "ab500", "collaborations"
    #[serde(default)]
    pub vertical_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Maximum edition size
    #[serde(default)]
    pub max_invocations: Option<u64>,
    /// Editions minted so far
    #[serde(default)]
    pub invocations: Option<u64>,
    #[serde(default)]
    pub aspect_ratio: Option<f64>,
    #[serde(default)]
    pub slug: Option<String>,
    /// Lowest current listing, only used for ordering
    #[serde(default)]
    pub lowest_listing: Option<f64>,
}

/// A token owned by a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Unique identifier (`<contract>-<token_id>`)
    pub id: String,
    /// On-chain token id
    pub token_id: String,
    pub project_name: String,
    /// Primary media URL
    #[serde(default)]
    pub media_url: Option<String>,
    /// Fallback preview URL
    #[serde(default)]
    pub preview_asset_url: Option<String>,
    /// Edition index within the project
    pub invocation: u64,
    pub project: Project,
}

impl Token {
    /// Media to display: primary media, falling back to the preview asset.
    pub fn display_media_url(&self) -> Option<&str> {
        self.media_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or_else(|| self.preview_asset_url.as_deref().filter(|url| !url.is_empty()))
    }
}

/// Extended project metadata returned by the token detail query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub base: Project,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub script_type_and_version: Option<String>,
}

/// Full detail for a single token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDetail {
    pub id: String,
    pub token_id: String,
    pub project_name: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub preview_asset_url: Option<String>,
    /// Interactive render of the token
    #[serde(default)]
    pub live_view_url: Option<String>,
    pub invocation: u64,
    /// Token seed hash
    #[serde(default)]
    pub hash: Option<String>,
    /// Trait map
    #[serde(default)]
    pub features: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub minted_at: Option<String>,
    #[serde(default)]
    pub owner_address: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    pub project: ProjectDetail,
}

/// Public profile linked to one or more wallets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub twitter_username: Option<String>,
    #[serde(default)]
    pub instagram_username: Option<String>,
    #[serde(default)]
    pub external_website: Option<String>,
}

/// Profile lookup result. Always lists at least the queried wallet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedWallets {
    pub profile: Option<UserProfile>,
    pub linked_wallets: Vec<Address>,
    pub display_name: Option<String>,
}

impl LinkedWallets {
    /// Result used when no profile information is available.
    pub fn only(address: &Address, display_name: Option<String>) -> Self {
        Self {
            profile: None,
            linked_wallets: vec![address.clone()],
            display_name,
        }
    }
}

/// Shared cancellation flag for one load.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<(), GalleryError> {
        if self.is_cancelled() {
            Err(GalleryError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Report `Cancelled` in place of whatever failed once the flag is set.
    pub(crate) fn mask<T>(&self, result: Result<T, GalleryError>) -> Result<T, GalleryError> {
        match result {
            Err(_) if self.is_cancelled() => Err(GalleryError::Cancelled),
            result => result,
        }
    }
}

/// Progress of a multi-wallet fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    /// Items fetched so far across all wallets (before deduplication)
    pub tokens_fetched: usize,
    /// Wallets whose full history has been fetched
    pub wallets_completed: usize,
    pub total_wallets: usize,
}

/// Backoff policy shared by every paginated request.
///
/// Delays grow exponentially from `base_delay_ms`, capped at `max_delay_ms`.
/// Rate-limited attempts additionally wait `rate_limit_delay_ms * attempt`.
/// Rate limiting consumes the same attempt budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub rate_limit_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Delays between consecutive attempts (`max_attempts - 1` entries).
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let base = self.base_delay_ms;
        let cap = self.max_delay_ms;
        (0..self.max_attempts.saturating_sub(1) as u32).map(move |n| {
            let delay = base.saturating_mul(1u64 << n.min(32));
            Duration::from_millis(delay.min(cap))
        })
    }

    /// Extra wait after a rate-limited attempt (1-based).
    pub fn rate_limit_delay(&self, attempt: usize) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms.saturating_mul(attempt as u64))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            rate_limit_delay_ms: 1000,
            max_delay_ms: 8000,
        }
    }
}

/// Response format of a name-resolution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderFlavor {
    /// `GET {base}/{query}` returning `{address, ens}`
    EnsData,
    /// `GET {base}/ens/resolve/{query}` returning `{address, name}`
    EnsIdeas,
}

/// One name-resolution service, tried in configured order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameProviderConfig {
    pub flavor: ProviderFlavor,
    pub base_url: String,
}

/// Configuration for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// GraphQL endpoint of the token API
    pub endpoint: String,
    /// Items requested per page
    pub page_size: usize,
    /// Wallets fetched concurrently per batch
    pub wallet_concurrency: usize,
    pub retry: RetryPolicy,
    /// Outbound request quota against the token API
    pub requests_per_second: u32,
    pub request_timeout_secs: u64,
    /// Timeout per name-provider attempt
    pub name_lookup_timeout_secs: u64,
    pub name_providers: Vec<NameProviderConfig>,
    /// Expand each wallet into the wallets linked to its profile
    pub include_linked_wallets: bool,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://data.artblocks.io/v1/graphql".to_string(),
            page_size: 100,
            wallet_concurrency: 3,
            retry: RetryPolicy::default(),
            requests_per_second: 10,
            request_timeout_secs: 30,
            name_lookup_timeout_secs: 5,
            name_providers: vec![
                NameProviderConfig {
                    flavor: ProviderFlavor::EnsData,
                    base_url: "https://api.ensdata.net".to_string(),
                },
                NameProviderConfig {
                    flavor: ProviderFlavor::EnsIdeas,
                    base_url: "https://api.ensideas.com".to_string(),
                },
            ],
            include_linked_wallets: false,
        }
    }
}
