//! Identity resolution: raw user input to canonical wallet addresses.
//!
//! Input is a `,`/`+` separated list of addresses or ENS names. Names are
//! resolved forward through an ordered chain of name providers; addresses
//! get a best-effort reverse lookup for display.

use crate::gallery::error::GalleryError;
use crate::gallery::types::{GalleryConfig, NameProviderConfig, ProviderFlavor};
use crate::types::{Address, ResolvedInput, ResolvedWallet, NAME_SUFFIX};
use async_trait::async_trait;
use futures::future::try_join_all;
use nonempty::NonEmpty;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Whether an input part names a wallet through the name service.
pub fn is_name(input: &str) -> bool {
    input.ends_with(NAME_SUFFIX)
}

pub fn is_multi_wallet(input: &str) -> bool {
    input.contains(',') || input.contains('+')
}

/// Split raw input into trimmed, non-empty parts.
pub fn split_input(input: &str) -> Vec<&str> {
    input
        .split([',', '+'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// URL-friendly form of an input, joined with `+`.
pub fn to_url_path(input: &str) -> String {
    split_input(input).join("+")
}

/// A name-resolution service.
#[async_trait]
pub trait NameProvider: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Forward lookup: name to address. `Ok(None)` when the name is unknown.
    async fn resolve_name(&self, name: &str) -> Result<Option<Address>, GalleryError>;

    /// Reverse lookup: address to primary name.
    async fn lookup_address(&self, address: &Address) -> Result<Option<String>, GalleryError>;
}

#[derive(Debug, Deserialize)]
struct ProviderRecord {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ens: Option<String>,
}

/// HTTP name provider speaking one of the supported response formats.
pub struct HttpNameProvider {
    http_client: Client,
    config: NameProviderConfig,
}

impl HttpNameProvider {
    pub fn new(http_client: Client, config: NameProviderConfig) -> Self {
        Self { http_client, config }
    }

    fn url(&self, query: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.flavor {
            ProviderFlavor::EnsData => format!("{base}/{query}"),
            ProviderFlavor::EnsIdeas => format!("{base}/ens/resolve/{query}"),
        }
    }

    async fn fetch_record(&self, query: &str) -> Result<Option<ProviderRecord>, GalleryError> {
        let response = self.http_client.get(self.url(query)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.json::<ProviderRecord>().await?))
    }
}

#[async_trait]
impl NameProvider for HttpNameProvider {
    fn name(&self) -> &str {
        &self.config.base_url
    }

    async fn resolve_name(&self, name: &str) -> Result<Option<Address>, GalleryError> {
        let record = self.fetch_record(name).await?;
        Ok(record
            .and_then(|record| record.address)
            .and_then(|address| Address::parse(&address).ok())
            .filter(|address| !address.is_zero()))
    }

    async fn lookup_address(&self, address: &Address) -> Result<Option<String>, GalleryError> {
        let record = self.fetch_record(address.as_str()).await?;
        Ok(record
            .and_then(|record| record.name.or(record.ens))
            .filter(|name| !name.is_empty()))
    }
}

/// Resolves raw input using an ordered provider chain.
pub struct NameResolver {
    providers: Vec<Arc<dyn NameProvider>>,
    attempt_timeout: Duration,
}

impl NameResolver {
    pub fn new(providers: Vec<Arc<dyn NameProvider>>, attempt_timeout: Duration) -> Self {
        Self {
            providers,
            attempt_timeout,
        }
    }

    /// Build HTTP providers from configuration.
    pub fn from_config(http_client: Client, config: &GalleryConfig) -> Self {
        let providers = config
            .name_providers
            .iter()
            .cloned()
            .map(|provider| Arc::new(HttpNameProvider::new(http_client.clone(), provider)) as Arc<dyn NameProvider>)
            .collect();
        Self::new(providers, Duration::from_secs(config.name_lookup_timeout_secs))
    }

    /// Resolve a name to an address. Fails when no provider returns one.
    #[instrument(skip(self))]
    pub async fn resolve_name(&self, name: &str) -> Result<Address, GalleryError> {
        for provider in &self.providers {
            match tokio::time::timeout(self.attempt_timeout, provider.resolve_name(name)).await {
                Ok(Ok(Some(address))) => {
                    debug!("{} resolved {} to {}", provider.name(), name, address);
                    return Ok(address);
                }
                Ok(Ok(None)) => debug!("{} has no record for {}", provider.name(), name),
                Ok(Err(e)) => warn!("{} failed to resolve {}: {}", provider.name(), name, e),
                Err(_) => warn!("{} timed out resolving {}", provider.name(), name),
            }
        }

        Err(GalleryError::Resolution {
            name: name.to_string(),
        })
    }

    /// Best-effort reverse lookup. Every failure yields `None`.
    #[instrument(skip(self, address), fields(address = %address))]
    pub async fn lookup_address(&self, address: &Address) -> Option<String> {
        for provider in &self.providers {
            match tokio::time::timeout(self.attempt_timeout, provider.lookup_address(address)).await {
                Ok(Ok(Some(name))) => return Some(name),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => debug!("{} reverse lookup failed: {}", provider.name(), e),
                Err(_) => debug!("{} reverse lookup timed out", provider.name()),
            }
        }
        None
    }

    /// Resolve one input part.
    pub async fn resolve_single(&self, part: &str) -> Result<ResolvedWallet, GalleryError> {
        let part = part.trim().to_lowercase();

        if is_name(&part) {
            let address = self.resolve_name(&part).await?;
            return Ok(ResolvedWallet {
                address,
                name: Some(part),
            });
        }

        let address = Address::parse(&part)?;
        let name = self.lookup_address(&address).await;
        Ok(ResolvedWallet { address, name })
    }

    /// Resolve a full input string. Parts resolve concurrently; order is kept.
    #[instrument(skip(self))]
    pub async fn resolve_input(&self, input: &str) -> Result<ResolvedInput, GalleryError> {
        let parts = split_input(input);
        let wallets = try_join_all(parts.iter().map(|part| self.resolve_single(part))).await?;

        let wallets = NonEmpty::from_vec(wallets).ok_or_else(|| GalleryError::InvalidInput {
            input: input.trim().to_string(),
        })?;
        Ok(ResolvedInput { wallets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ALICE: &str = "0x00000000000000000000000000000000000a11ce";

    #[derive(Default)]
    struct FakeProvider {
        label: &'static str,
        names: HashMap<String, String>,
        fail: bool,
        hang: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NameProvider for FakeProvider {
        fn name(&self) -> &str {
            self.label
        }

        async fn resolve_name(&self, name: &str) -> Result<Option<Address>, GalleryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail {
                return Err(GalleryError::Http { status: 502 });
            }
            Ok(self.names.get(name).map(|a| Address::parse(a).unwrap()))
        }

        async fn lookup_address(&self, address: &Address) -> Result<Option<String>, GalleryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GalleryError::Http { status: 502 });
            }
            Ok(self
                .names
                .iter()
                .find(|(_, a)| a.as_str() == address.as_str())
                .map(|(n, _)| n.clone()))
        }
    }

    fn alice_provider() -> Arc<dyn NameProvider> {
        Arc::new(FakeProvider {
            label: "fake",
            names: HashMap::from([("alice.eth".to_string(), ALICE.to_string())]),
            ..Default::default()
        })
    }

    #[test]
    fn test_input_helpers() {
        assert!(is_name("foo.eth"));
        assert!(!is_name("0xabc"));
        assert!(is_multi_wallet("a.eth,b.eth"));
        assert!(is_multi_wallet("a.eth+b.eth"));
        assert!(!is_multi_wallet("a.eth"));
        assert_eq!(split_input(" a.eth , b.eth+ +c.eth,"), vec!["a.eth", "b.eth", "c.eth"]);
        assert_eq!(to_url_path("a.eth, b.eth"), "a.eth+b.eth");
    }

    #[tokio::test]
    async fn test_fallback_to_next_provider() {
        let failing = Arc::new(FakeProvider { label: "down", fail: true, ..Default::default() });
        let resolver = NameResolver::new(
            vec![failing.clone() as Arc<dyn NameProvider>, alice_provider()],
            Duration::from_secs(1),
        );

        let address = resolver.resolve_name("alice.eth").await.unwrap();

        assert_eq!(address.as_str(), ALICE);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_falls_through() {
        let slow: Arc<dyn NameProvider> =
            Arc::new(FakeProvider { label: "slow", hang: true, ..Default::default() });
        let resolver = NameResolver::new(
            vec![slow, alice_provider()],
            Duration::from_millis(20),
        );

        assert_eq!(resolver.resolve_name("alice.eth").await.unwrap().as_str(), ALICE);
    }

    #[tokio::test]
    async fn test_unresolvable_name() {
        let resolver = NameResolver::new(vec![alice_provider()], Duration::from_secs(1));

        assert_eq!(
            resolver.resolve_single("nobody.eth").await,
            Err(GalleryError::Resolution { name: "nobody.eth".to_string() })
        );
    }

    #[tokio::test]
    async fn test_reverse_lookup_failure_is_absorbed() {
        let failing: Arc<dyn NameProvider> =
            Arc::new(FakeProvider { label: "down", fail: true, ..Default::default() });
        let resolver = NameResolver::new(vec![failing], Duration::from_secs(1));

        let wallet = resolver.resolve_single(ALICE).await.unwrap();

        assert_eq!(wallet.address.as_str(), ALICE);
        assert_eq!(wallet.name, None);
    }

    #[tokio::test]
    async fn test_invalid_part() {
        let resolver = NameResolver::new(vec![alice_provider()], Duration::from_secs(1));

        assert_eq!(
            resolver.resolve_input("alice.eth,not-an-address").await,
            Err(GalleryError::InvalidInput { input: "not-an-address".to_string() })
        );
    }

    #[tokio::test]
    async fn test_empty_input() {
        let resolver = NameResolver::new(vec![], Duration::from_secs(1));

        assert!(matches!(
            resolver.resolve_input(" , + ").await,
            Err(GalleryError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_input_keeps_order() {
        let resolver = NameResolver::new(vec![alice_provider()], Duration::from_secs(1));
        let other = "0x00000000000000000000000000000000000000b0";

        let resolved = resolver
            .resolve_input(&format!("{other}+ALICE.ETH"))
            .await
            .unwrap();

        assert_eq!(resolved.wallet_count(), 2);
        assert_eq!(resolved.primary().address.as_str(), other);
        assert_eq!(resolved.primary().name, None);
        let second = &resolved.wallets.tail[0];
        assert_eq!(second.address.as_str(), ALICE);
        assert_eq!(second.name.as_deref(), Some("alice.eth"));
    }
}
