//! End-to-end gallery loading: resolve, fetch, group.
//!
//! Callers observe progress through [`LoadStatus`] and may abandon a load
//! through a [`CancelFlag`]; the flag is checked after every suspension
//! point so a stale load never reports further status.

use crate::gallery::error::GalleryError;
use crate::gallery::grouping::{group_tokens, GallerySummary, TierGroup};
use crate::gallery::identity::NameResolver;
use crate::gallery::token_fetcher::TokenFetcher;
use crate::gallery::types::{CancelFlag, FetchProgress, Token, TokenDetail};
use crate::types::{Address, ResolvedInput, ResolvedWallet};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, instrument};

/// Progress of a load, in order of occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Resolving,
    Fetching { message: String },
    Grouping { count: usize },
}

/// A fully loaded gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gallery {
    pub primary: ResolvedWallet,
    pub wallet_count: usize,
    pub groups: Vec<TierGroup>,
    pub summary: GallerySummary,
}

impl Gallery {
    /// Page title, e.g. `alice.eth (12 pieces)`.
    pub fn title(&self) -> String {
        format!("{} ({} pieces)", self.primary.display_name(), self.summary.total_tokens)
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Done(Gallery),
    /// The wallets own no tokens
    Empty { primary: ResolvedWallet },
}

/// Wires the resolver, fetcher and grouping engine together.
pub struct GalleryPipeline {
    resolver: NameResolver,
    fetcher: TokenFetcher,
    include_linked_wallets: bool,
}

impl GalleryPipeline {
    pub fn new(resolver: NameResolver, fetcher: TokenFetcher, include_linked_wallets: bool) -> Self {
        Self {
            resolver,
            fetcher,
            include_linked_wallets,
        }
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    pub fn fetcher(&self) -> &TokenFetcher {
        &self.fetcher
    }

    /// Resolve `input`, fetch every wallet's tokens and group them.
    ///
    /// Once `cancel` is set the load stops at its next suspension point and
    /// returns [`GalleryError::Cancelled`], whatever else went wrong.
    #[instrument(skip(self, observer, cancel))]
    pub async fn load<O>(&self, input: &str, observer: O, cancel: &CancelFlag) -> Result<LoadOutcome, GalleryError>
    where
        O: Fn(&LoadStatus),
    {
        let report = |status: LoadStatus| {
            if !cancel.is_cancelled() {
                observer(&status);
            }
        };

        let outcome = self.run(input, &report, cancel).await;
        cancel.mask(outcome)
    }

    async fn run<R>(&self, input: &str, report: &R, cancel: &CancelFlag) -> Result<LoadOutcome, GalleryError>
    where
        R: Fn(LoadStatus),
    {
        report(LoadStatus::Resolving);
        let mut resolved = self.resolver.resolve_input(input).await?;
        cancel.check()?;

        let addresses = if self.include_linked_wallets {
            self.expand_linked_wallets(&mut resolved, cancel).await?
        } else {
            resolved.addresses()
        };

        let tokens = self.fetch_tokens(&addresses, report, cancel).await?;
        cancel.check()?;

        let primary = resolved.primary().clone();
        if tokens.is_empty() {
            info!("No tokens found for {}", primary.address);
            return Ok(LoadOutcome::Empty { primary });
        }

        report(LoadStatus::Grouping { count: tokens.len() });
        let groups = group_tokens(&tokens);
        let summary = GallerySummary::from_groups(&groups);
        cancel.check()?;

        info!(
            "Loaded {} tokens in {} projects across {} tiers",
            summary.total_tokens, summary.total_projects, summary.tier_count
        );
        Ok(LoadOutcome::Done(Gallery {
            primary,
            wallet_count: addresses.len(),
            groups,
            summary,
        }))
    }

    pub async fn fetch_token_detail(&self, id: &str) -> Result<Option<TokenDetail>, GalleryError> {
        self.fetcher.fetch_token_detail(id).await
    }

    async fn fetch_tokens<R>(
        &self,
        addresses: &[Address],
        report: &R,
        cancel: &CancelFlag,
    ) -> Result<Vec<Token>, GalleryError>
    where
        R: Fn(LoadStatus),
    {
        if let [address] = addresses {
            report(LoadStatus::Fetching {
                message: "Fetching collection...".to_string(),
            });
            return self
                .fetcher
                .fetch_wallet_tokens(address, cancel, |count| {
                    report(LoadStatus::Fetching {
                        message: format!("Fetched {count} pieces..."),
                    })
                })
                .await;
        }

        report(LoadStatus::Fetching {
            message: format!("Fetching from {} wallets...", addresses.len()),
        });
        self.fetcher
            .fetch_multi_wallet_tokens(addresses, cancel, |progress: FetchProgress| {
                let current = (progress.wallets_completed + 1).min(progress.total_wallets);
                report(LoadStatus::Fetching {
                    message: format!(
                        "Wallet {}/{} - {} pieces so far...",
                        current, progress.total_wallets, progress.tokens_fetched
                    ),
                })
            })
            .await
    }

    /// Replace each wallet by the wallets linked to its profile, keeping
    /// first-seen order. Adopts the profile name for an unnamed primary.
    async fn expand_linked_wallets(
        &self,
        resolved: &mut ResolvedInput,
        cancel: &CancelFlag,
    ) -> Result<Vec<Address>, GalleryError> {
        let mut seen = HashSet::new();
        let mut addresses = Vec::new();

        let wallets = std::iter::once(&mut resolved.wallets.head).chain(resolved.wallets.tail.iter_mut());
        for (index, wallet) in wallets.enumerate() {
            let linked = self.fetcher.fetch_user_profile(&wallet.address).await;
            cancel.check()?;
            if index == 0 && wallet.name.is_none() {
                wallet.name = linked.display_name.clone();
            }
            for address in linked.linked_wallets {
                if seen.insert(address.clone()) {
                    addresses.push(address);
                }
            }
        }

        info!("Expanded to {} linked wallets", addresses.len());
        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gallery_title() {
        let address = Address::parse("0x00000000000000000000000000000000000000aa").unwrap();
        let mut gallery = Gallery {
            primary: ResolvedWallet { address, name: None },
            wallet_count: 1,
            groups: Vec::new(),
            summary: GallerySummary::from_groups(&[]),
        };
        assert_eq!(gallery.title(), "0x0000...00aa (0 pieces)");

        gallery.primary.name = Some("alice.eth".to_string());
        assert_eq!(gallery.title(), "alice.eth (0 pieces)");
    }
}
