//! Token acquisition from the GraphQL token API.
//!
//! Wallet histories are fetched with offset pagination until a short page
//! comes back. Every page request goes through the shared retry policy;
//! multi-wallet fetches run in fixed-size concurrent batches and are
//! deduplicated by token id afterwards.

use crate::gallery::error::GalleryError;
use crate::gallery::transport::{GraphqlRequest, GraphqlTransport};
use crate::gallery::types::{
    CancelFlag, FetchProgress, GalleryConfig, LinkedWallets, RetryPolicy, Token, TokenDetail, UserProfile,
};
use crate::types::Address;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_retry::RetryIf;
use tracing::{debug, info, instrument, warn};

const TOKENS_QUERY: &str = r#"
  query WalletTokens($owner: String!, $limit: Int!, $offset: Int!) {
    tokens_metadata(
      where: { owner_address: { _eq: $owner } }
      order_by: { project_name: asc }
      limit: $limit
      offset: $offset
    ) {
      id
      token_id
      project_name
      media_url
      preview_asset_url
      invocation
      project {
        name
        artist_name
        curation_status_display
        vertical_name
        description
        max_invocations
        invocations
        aspect_ratio
        slug
        lowest_listing
      }
    }
  }
"#;

const TOKEN_DETAIL_QUERY: &str = r#"
  query TokenDetail($id: String!) {
    tokens_metadata(where: { id: { _eq: $id } }, limit: 1) {
      id
      token_id
      project_name
      media_url
      preview_asset_url
      live_view_url
      invocation
      hash
      features
      minted_at
      owner_address
      contract_address
      project {
        name
        artist_name
        curation_status_display
        vertical_name
        description
        max_invocations
        invocations
        aspect_ratio
        slug
        website
        license
        script_type_and_version
      }
    }
  }
"#;

const USER_PROFILE_QUERY: &str = r#"
  query UserProfile($address: String!) {
    users(where: { public_address: { _eq: $address } }) {
      public_address
      display_name
      profile_id
      profile_by_id {
        id
        username
        name
        bio
        twitter_username
        instagram_username
        external_website
      }
    }
  }
"#;

const LINKED_WALLETS_QUERY: &str = r#"
  query LinkedWallets($profileId: Int!) {
    users(where: { profile_id: { _eq: $profileId } }) {
      public_address
      display_name
    }
  }
"#;

#[derive(Debug, Deserialize)]
struct TokensData<T> {
    tokens_metadata: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct UsersData {
    users: Vec<UserRow>,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    public_address: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    profile_id: Option<i64>,
    #[serde(default)]
    profile_by_id: Option<UserProfile>,
}

/// Fetches tokens, token details and profiles from the token API.
pub struct TokenFetcher {
    transport: Arc<dyn GraphqlTransport>,
    page_size: usize,
    wallet_concurrency: usize,
    retry: RetryPolicy,
}

impl TokenFetcher {
    pub fn new(transport: Arc<dyn GraphqlTransport>, config: &GalleryConfig) -> Self {
        Self {
            transport,
            page_size: config.page_size.max(1),
            wallet_concurrency: config.wallet_concurrency.max(1),
            retry: config.retry.clone(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch a wallet's full token history.
    ///
    /// `on_progress` receives the running total after every successful page.
    /// `cancel` is checked before and after every page request.
    #[instrument(skip_all, fields(owner = %owner))]
    pub async fn fetch_wallet_tokens<F>(
        &self,
        owner: &Address,
        cancel: &CancelFlag,
        on_progress: F,
    ) -> Result<Vec<Token>, GalleryError>
    where
        F: Fn(usize),
    {
        let mut all_tokens = Vec::new();
        let mut offset = 0;

        loop {
            cancel.check()?;
            let page = cancel.mask(self.fetch_page(owner, offset, cancel).await)?;
            cancel.check()?;

            let page_len = page.len();
            all_tokens.extend(page);
            on_progress(all_tokens.len());

            if page_len < self.page_size {
                break;
            }
            offset += self.page_size;
        }

        info!("Fetched {} tokens for {}", all_tokens.len(), owner);
        Ok(all_tokens)
    }

    /// Fetch several wallets in batches of `wallet_concurrency`, then
    /// deduplicate by token id keeping the first occurrence.
    ///
    /// `on_progress` fires after every page and again as each wallet
    /// completes. Any wallet failing aborts the whole fetch.
    pub async fn fetch_multi_wallet_tokens<F>(
        &self,
        addresses: &[Address],
        cancel: &CancelFlag,
        on_progress: F,
    ) -> Result<Vec<Token>, GalleryError>
    where
        F: Fn(FetchProgress),
    {
        let total_wallets = addresses.len();
        let completed = AtomicUsize::new(0);
        let mut all_tokens: Vec<Token> = Vec::new();

        for batch in addresses.chunks(self.wallet_concurrency) {
            cancel.check()?;

            let fetched_before = all_tokens.len();
            let in_flight: Vec<AtomicUsize> = batch.iter().map(|_| AtomicUsize::new(0)).collect();
            let in_flight = &in_flight;
            let completed = &completed;
            let on_progress = &on_progress;
            let report = move || {
                let batch_total: usize = in_flight.iter().map(|c| c.load(Ordering::SeqCst)).sum();
                on_progress(FetchProgress {
                    tokens_fetched: fetched_before + batch_total,
                    wallets_completed: completed.load(Ordering::SeqCst),
                    total_wallets,
                });
            };
            let report = &report;

            let fetches = batch.iter().enumerate().map(|(slot, address)| async move {
                let tokens = self
                    .fetch_wallet_tokens(address, cancel, |count| {
                        in_flight[slot].store(count, Ordering::SeqCst);
                        report();
                    })
                    .await?;
                completed.fetch_add(1, Ordering::SeqCst);
                report();
                Ok::<_, GalleryError>(tokens)
            });

            for tokens in try_join_all(fetches).await? {
                all_tokens.extend(tokens);
            }
        }

        let fetched = all_tokens.len();
        let tokens = dedupe_tokens(all_tokens);
        info!(
            "Fetched {} tokens from {} wallets ({} duplicates dropped)",
            tokens.len(),
            total_wallets,
            fetched - tokens.len()
        );
        Ok(tokens)
    }

    /// Look up a single token with extended detail. `None` when no such token exists.
    #[instrument(skip(self))]
    pub async fn fetch_token_detail(&self, id: &str) -> Result<Option<TokenDetail>, GalleryError> {
        let request = GraphqlRequest {
            query: TOKEN_DETAIL_QUERY,
            variables: json!({ "id": id }),
        };
        let data: TokensData<TokenDetail> = self.execute_with_retries(&request, &CancelFlag::new()).await?;
        Ok(data.tokens_metadata.into_iter().next())
    }

    /// Look up the profile behind an address and every wallet linked to it.
    ///
    /// Best-effort: any failure degrades to the queried address alone.
    #[instrument(skip(self, address), fields(address = %address))]
    pub async fn fetch_user_profile(&self, address: &Address) -> LinkedWallets {
        let request = GraphqlRequest {
            query: USER_PROFILE_QUERY,
            variables: json!({ "address": address.as_str() }),
        };
        let users: UsersData = match self.execute_once(&request).await {
            Ok(users) => users,
            Err(e) => {
                warn!("Profile lookup failed for {}: {}", address, e);
                return LinkedWallets::only(address, None);
            }
        };

        let Some(user) = users.users.into_iter().next() else {
            return LinkedWallets::only(address, None);
        };
        let Some(profile_id) = user.profile_id else {
            return LinkedWallets::only(address, user.display_name);
        };

        let display_name = user
            .profile_by_id
            .as_ref()
            .and_then(|profile| profile.name.clone())
            .or(user.display_name);

        let request = GraphqlRequest {
            query: LINKED_WALLETS_QUERY,
            variables: json!({ "profileId": profile_id }),
        };
        let linked_wallets = match self.execute_once::<UsersData>(&request).await {
            Ok(linked) => linked
                .users
                .iter()
                .filter_map(|row| Address::parse(&row.public_address).ok())
                .collect(),
            Err(e) => {
                warn!("Linked wallet lookup failed for profile {}: {}", profile_id, e);
                Vec::new()
            }
        };

        debug!("Profile {} links {} wallets", profile_id, linked_wallets.len());
        LinkedWallets {
            profile: user.profile_by_id,
            linked_wallets: if linked_wallets.is_empty() {
                vec![address.clone()]
            } else {
                linked_wallets
            },
            display_name,
        }
    }

    #[instrument(skip(self, owner, cancel), fields(owner = %owner))]
    async fn fetch_page(&self, owner: &Address, offset: usize, cancel: &CancelFlag) -> Result<Vec<Token>, GalleryError> {
        let request = GraphqlRequest {
            query: TOKENS_QUERY,
            variables: json!({
                "owner": owner.as_str(),
                "limit": self.page_size,
                "offset": offset,
            }),
        };
        let data: TokensData<Token> = self.execute_with_retries(&request, cancel).await?;
        debug!("Page at offset {} returned {} tokens", offset, data.tokens_metadata.len());
        Ok(data.tokens_metadata)
    }

    /// Run a request under the retry policy. Every token API failure is
    /// retried until the attempt budget runs out or `cancel` is set.
    async fn execute_with_retries<T: DeserializeOwned>(
        &self,
        request: &GraphqlRequest,
        cancel: &CancelFlag,
    ) -> Result<T, GalleryError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        RetryIf::start(
            self.retry.delays(),
            || {
                attempt += 1;
                self.execute_attempt(request, attempt, max_attempts, cancel)
            },
            |err: &GalleryError| {
                let retryable = err.is_retryable() && !cancel.is_cancelled();
                if retryable {
                    warn!("Retrying token API request after error: {}", err);
                }
                retryable
            },
        )
        .await
    }

    async fn execute_attempt<T: DeserializeOwned>(
        &self,
        request: &GraphqlRequest,
        attempt: usize,
        max_attempts: usize,
        cancel: &CancelFlag,
    ) -> Result<T, GalleryError> {
        cancel.check()?;
        match self.execute_once(request).await {
            Err(err @ GalleryError::RateLimited { .. }) if attempt < max_attempts => {
                let wait = self.retry.rate_limit_delay(attempt);
                debug!("Rate limited on attempt {}, backing off {:?}", attempt, wait);
                tokio::time::sleep(wait).await;
                Err(err)
            }
            result => result,
        }
    }

    async fn execute_once<T: DeserializeOwned>(&self, request: &GraphqlRequest) -> Result<T, GalleryError> {
        self.transport.post(request).await?.into_data()
    }
}

/// Drop tokens whose id was already seen, preserving first-occurrence order.
pub fn dedupe_tokens(tokens: Vec<Token>) -> Vec<Token> {
    let mut seen = HashSet::with_capacity(tokens.len());
    tokens
        .into_iter()
        .filter(|token| seen.insert(token.id.clone()))
        .collect()
}
