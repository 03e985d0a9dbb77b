//! Curatorial grouping of a token list.
//!
//! Tokens are bucketed into tiers, then into projects within each tier.
//! The result is a pure function of the input: classification is fixed
//! precedence, project groups keep first-seen order before a stable sort,
//! and every tie is broken explicitly.

use crate::gallery::types::{Project, Token};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Edition size assumed when a project reports none, so it sorts last.
const UNKNOWN_EDITION_SIZE: u64 = u64::MAX;

/// Curatorial tier. Variant order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Tier {
    #[serde(rename = "Curated")]
    Curated,
    #[serde(rename = "Presents")]
    Presents,
    #[serde(rename = "Heritage")]
    Heritage,
    #[serde(rename = "Art Blocks 500")]
    ArtBlocks500,
    #[serde(rename = "Explorations")]
    Explorations,
    #[serde(rename = "Flex")]
    Flex,
    #[serde(rename = "Playground")]
    Playground,
    #[serde(rename = "Collaborations")]
    Collaborations,
    #[serde(rename = "Other")]
    Other,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Curated => "Curated",
            Tier::Presents => "Presents",
            Tier::Heritage => "Heritage",
            Tier::ArtBlocks500 => "Art Blocks 500",
            Tier::Explorations => "Explorations",
            Tier::Flex => "Flex",
            Tier::Playground => "Playground",
            Tier::Collaborations => "Collaborations",
            Tier::Other => "Other",
        }
    }

    /// Fixed sort rank; `Other` is 99.
    pub fn rank(&self) -> u8 {
        match self {
            Tier::Curated => 0,
            Tier::Presents => 1,
            Tier::Heritage => 2,
            Tier::ArtBlocks500 => 3,
            Tier::Explorations => 4,
            Tier::Flex => 5,
            Tier::Playground => 6,
            Tier::Collaborations => 7,
            Tier::Other => 99,
        }
    }

    /// Classify a project. First match wins, comparisons ignore case.
    pub fn classify(project: &Project) -> Tier {
        let curation = project
            .curation_status_display
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        let vertical = project
            .vertical_name
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        let either = |value: &str| curation == value || vertical == value;

        if either("curated") {
            Tier::Curated
        } else if either("presents") {
            Tier::Presents
        } else if either("heritage") {
            Tier::Heritage
        } else if vertical == "ab500" {
            Tier::ArtBlocks500
        } else if either("explorations") || curation == "factory" {
            Tier::Explorations
        } else if either("flex") {
            Tier::Flex
        } else if either("playground") {
            Tier::Playground
        } else if vertical == "collaborations" {
            Tier::Collaborations
        } else {
            Tier::Other
        }
    }
}

/// One project's tokens within a tier, ordered by edition index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectGroup {
    pub project_name: String,
    pub artist_name: String,
    pub curation_status: Option<String>,
    pub slug: Option<String>,
    pub tokens: Vec<Token>,
}

impl ProjectGroup {
    fn project(&self) -> Option<&Project> {
        self.tokens.first().map(|token| &token.project)
    }

    /// Lowest listing of the project, 0 when unknown.
    pub fn floor_price(&self) -> f64 {
        self.project()
            .and_then(|project| project.lowest_listing)
            .unwrap_or(0.0)
    }

    /// Maximum edition size; unknown or zero sorts last.
    pub fn edition_size(&self) -> u64 {
        self.project()
            .and_then(|project| project.max_invocations)
            .filter(|size| *size > 0)
            .unwrap_or(UNKNOWN_EDITION_SIZE)
    }
}

/// A tier with its project groups, ordered for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierGroup {
    pub tier: Tier,
    pub label: &'static str,
    pub sort_order: u8,
    pub projects: Vec<ProjectGroup>,
}

impl TierGroup {
    pub fn token_count(&self) -> usize {
        self.projects.iter().map(|project| project.tokens.len()).sum()
    }
}

/// Totals shown in the gallery header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GallerySummary {
    pub total_tokens: usize,
    pub total_projects: usize,
    pub tier_count: usize,
}

impl GallerySummary {
    pub fn from_groups(groups: &[TierGroup]) -> Self {
        Self {
            total_tokens: groups.iter().map(TierGroup::token_count).sum(),
            total_projects: groups.iter().map(|group| group.projects.len()).sum(),
            tier_count: groups.len(),
        }
    }
}

/// Key a token is grouped under: the project slug, else the project name.
fn project_key(token: &Token) -> &str {
    token
        .project
        .slug
        .as_deref()
        .filter(|slug| !slug.is_empty())
        .unwrap_or(&token.project_name)
}

fn compare_projects(a: &ProjectGroup, b: &ProjectGroup) -> Ordering {
    b.floor_price()
        .total_cmp(&a.floor_price())
        .then_with(|| a.edition_size().cmp(&b.edition_size()))
}

/// Group tokens into ordered tiers of ordered projects of ordered tokens.
pub fn group_tokens(tokens: &[Token]) -> Vec<TierGroup> {
    let mut tiers: BTreeMap<Tier, Vec<&Token>> = BTreeMap::new();
    for token in tokens {
        tiers.entry(Tier::classify(&token.project)).or_default().push(token);
    }

    tiers
        .into_iter()
        .map(|(tier, tier_tokens)| TierGroup {
            tier,
            label: tier.label(),
            sort_order: tier.rank(),
            projects: group_projects(tier_tokens),
        })
        .collect()
}

fn group_projects(tokens: Vec<&Token>) -> Vec<ProjectGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut buckets: Vec<Vec<&Token>> = Vec::new();

    for token in tokens {
        let slot = *index.entry(project_key(token)).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[slot].push(token);
    }

    let mut projects: Vec<ProjectGroup> = buckets
        .into_iter()
        .map(|mut bucket| {
            bucket.sort_by_key(|token| token.invocation);
            let first = bucket[0];
            ProjectGroup {
                project_name: first.project.name.clone(),
                artist_name: first.project.artist_name.clone(),
                curation_status: first.project.curation_status_display.clone(),
                slug: first.project.slug.clone(),
                tokens: bucket.into_iter().cloned().collect(),
            }
        })
        .collect();

    projects.sort_by(compare_projects);
    projects
}
