//! Gallery module - wallet resolution, token acquisition and curatorial grouping.
//!
//! Data flows raw input -> [`NameResolver`] -> canonical addresses ->
//! [`TokenFetcher`] -> deduplicated tokens -> [`group_tokens`] -> ordered
//! tier/project/token tree. [`GalleryPipeline`] runs the whole flow.

pub mod error;
pub mod grouping;
pub mod identity;
pub mod pipeline;
pub mod rate_limit;
pub mod token_fetcher;
pub mod transport;
pub mod types;

// Re-export main public types and the pipeline
pub use error::GalleryError;
pub use grouping::{group_tokens, GallerySummary, ProjectGroup, Tier, TierGroup};
pub use identity::{is_multi_wallet, is_name, to_url_path, HttpNameProvider, NameProvider, NameResolver};
pub use pipeline::{Gallery, GalleryPipeline, LoadOutcome, LoadStatus};
pub use token_fetcher::{dedupe_tokens, TokenFetcher};
pub use transport::{GraphqlRequest, GraphqlTransport, HttpTransport, TransportResponse};
pub use types::{
    CancelFlag, FetchProgress, GalleryConfig, LinkedWallets, NameProviderConfig, Project, ProviderFlavor,
    RetryPolicy, Token, TokenDetail, UserProfile,
};

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Pipeline builder for convenient construction with sensible defaults.
pub struct GalleryBuilder {
    config: GalleryConfig,
}

impl GalleryBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: GalleryConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: GalleryConfig) -> Self {
        Self { config }
    }

    /// Set the GraphQL endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Set how many wallets are fetched concurrently.
    pub fn with_wallet_concurrency(mut self, concurrency: usize) -> Self {
        self.config.wallet_concurrency = concurrency;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the outbound request quota.
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.config.requests_per_second = requests_per_second;
        self
    }

    pub fn with_request_timeout(mut self, timeout_secs: u64) -> Self {
        self.config.request_timeout_secs = timeout_secs;
        self
    }

    /// Set the name providers, tried in the given order.
    pub fn with_name_providers(mut self, providers: Vec<NameProviderConfig>) -> Self {
        self.config.name_providers = providers;
        self
    }

    pub fn with_name_lookup_timeout(mut self, timeout_secs: u64) -> Self {
        self.config.name_lookup_timeout_secs = timeout_secs;
        self
    }

    /// Expand wallets into the wallets linked to their profiles.
    pub fn with_linked_wallets(mut self, enabled: bool) -> Self {
        self.config.include_linked_wallets = enabled;
        self
    }

    /// Build the configuration.
    pub fn build_config(self) -> GalleryConfig {
        self.config
    }

    /// Build a pipeline talking to the configured HTTP services.
    pub fn build(self) -> anyhow::Result<GalleryPipeline> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("onview/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        let transport = HttpTransport::new(
            http_client.clone(),
            self.config.endpoint.clone(),
            self.config.requests_per_second,
            Duration::from_secs(self.config.request_timeout_secs),
        );
        let resolver = NameResolver::from_config(http_client, &self.config);

        Ok(self.build_with(Arc::new(transport), resolver))
    }

    /// Build a pipeline over caller-supplied transport and resolver.
    pub fn build_with(self, transport: Arc<dyn GraphqlTransport>, resolver: NameResolver) -> GalleryPipeline {
        let fetcher = TokenFetcher::new(transport, &self.config);
        GalleryPipeline::new(resolver, fetcher, self.config.include_linked_wallets)
    }
}

impl Default for GalleryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
