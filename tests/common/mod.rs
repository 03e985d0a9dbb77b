//! Shared in-memory fakes for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use onview::gallery::{
    GalleryError, GraphqlRequest, GraphqlTransport, NameProvider, NameResolver, Project, Token,
    TransportResponse,
};
use onview::Address;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn address(suffix: u32) -> Address {
    Address::parse(&format!("0x{:040x}", suffix)).expect("valid test address")
}

pub fn project(name: &str, curation: &str, floor: Option<f64>, edition_size: Option<u64>) -> Project {
    Project {
        name: name.to_string(),
        artist_name: format!("{name} artist"),
        curation_status_display: Some(curation.to_string()),
        vertical_name: Some(curation.to_lowercase()),
        description: None,
        max_invocations: edition_size,
        invocations: edition_size,
        aspect_ratio: Some(1.0),
        slug: Some(name.to_lowercase().replace(' ', "-")),
        lowest_listing: floor,
    }
}

pub fn token(id: &str, invocation: u64, project: &Project) -> Token {
    Token {
        id: id.to_string(),
        token_id: id.to_string(),
        project_name: project.name.clone(),
        media_url: Some(format!("https://media.example/{id}.png")),
        preview_asset_url: None,
        invocation,
        project: project.clone(),
    }
}

/// Serves paginated token lists per owner and profile lookups, and
/// records peak request concurrency.
#[derive(Default)]
pub struct FakeTokenApi {
    pub wallets: HashMap<String, Vec<Token>>,
    /// Owners whose every request fails with this status
    pub failing: HashMap<String, u16>,
    /// Profile id and profile name per address
    pub profiles: HashMap<String, (i64, Option<String>)>,
    pub latency: Duration,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub requests: Mutex<Vec<Value>>,
}

impl FakeTokenApi {
    pub fn with_wallet(mut self, owner: &Address, tokens: Vec<Token>) -> Self {
        self.wallets.insert(owner.to_string(), tokens);
        self
    }

    pub fn with_profile(mut self, owner: &Address, profile_id: i64, name: Option<&str>) -> Self {
        self.profiles
            .insert(owner.to_string(), (profile_id, name.map(str::to_string)));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, variables: &Value) -> TransportResponse {
        if let Some(owner) = variables.get("owner").and_then(Value::as_str) {
            if let Some(status) = self.failing.get(owner) {
                return TransportResponse::status(*status);
            }
            let limit = variables["limit"].as_u64().unwrap_or(100) as usize;
            let offset = variables["offset"].as_u64().unwrap_or(0) as usize;
            let page: Vec<&Token> = self
                .wallets
                .get(owner)
                .map(|tokens| tokens.iter().skip(offset).take(limit).collect())
                .unwrap_or_default();
            return TransportResponse::ok(json!({ "data": { "tokens_metadata": page } }));
        }

        if let Some(address) = variables.get("address").and_then(Value::as_str) {
            let users = match self.profiles.get(address) {
                Some((id, name)) => json!([{
                    "public_address": address,
                    "display_name": null,
                    "profile_id": id,
                    "profile_by_id": { "id": id, "name": name }
                }]),
                None => json!([]),
            };
            return TransportResponse::ok(json!({ "data": { "users": users } }));
        }

        if let Some(profile_id) = variables.get("profileId").and_then(Value::as_i64) {
            let mut linked: Vec<&String> = self
                .profiles
                .iter()
                .filter(|(_, (id, _))| *id == profile_id)
                .map(|(address, _)| address)
                .collect();
            linked.sort();
            let users: Vec<Value> = linked
                .into_iter()
                .map(|address| json!({ "public_address": address, "display_name": null }))
                .collect();
            return TransportResponse::ok(json!({ "data": { "users": users } }));
        }

        TransportResponse::ok(json!({ "data": { "tokens_metadata": [] } }))
    }
}

#[async_trait]
impl GraphqlTransport for FakeTokenApi {
    async fn post(&self, request: &GraphqlRequest) -> Result<TransportResponse, GalleryError> {
        self.requests.lock().unwrap().push(request.variables.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let response = self.respond(&request.variables);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(response)
    }
}

/// Name provider backed by a fixed table.
pub struct FakeNames {
    pub names: HashMap<String, Address>,
}

#[async_trait]
impl NameProvider for FakeNames {
    fn name(&self) -> &str {
        "fake"
    }

    async fn resolve_name(&self, name: &str) -> Result<Option<Address>, GalleryError> {
        Ok(self.names.get(name).cloned())
    }

    async fn lookup_address(&self, address: &Address) -> Result<Option<String>, GalleryError> {
        Ok(self
            .names
            .iter()
            .find(|(_, a)| *a == address)
            .map(|(name, _)| name.clone()))
    }
}

pub fn resolver(names: &[(&str, &Address)]) -> NameResolver {
    let provider: Arc<dyn NameProvider> = Arc::new(FakeNames {
        names: names
            .iter()
            .map(|(name, address)| (name.to_string(), (*address).clone()))
            .collect(),
    });
    NameResolver::new(vec![provider], Duration::from_secs(1))
}
