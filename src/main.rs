//! Command line front-end for the onview gallery pipeline.
//!
//! Resolves the given wallets, fetches their tokens and prints the grouped
//! gallery, or prints a single token's detail with `--token`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use onview::gallery::{CancelFlag, Gallery, GalleryBuilder, LoadOutcome, LoadStatus, TokenDetail};
use tracing::{info, warn, Level};

#[derive(Debug, Parser)]
#[command(name = "onview", about = "Browse an NFT collection as a curated gallery")]
struct Cli {
    /// Wallet address or ENS name; several may be joined with `,` or `+`
    input: Option<String>,

    /// Include wallets linked to the same profile
    #[arg(long)]
    linked: bool,

    /// Show one token's detail instead of a gallery
    #[arg(long)]
    token: Option<String>,

    /// Print JSON instead of a text tree
    #[arg(long)]
    json: bool,

    /// GraphQL endpoint of the token API
    #[arg(long)]
    endpoint: Option<String>,

    #[arg(long, default_value_t = 100)]
    page_size: usize,

    /// Outbound requests per second against the token API
    #[arg(long, default_value_t = 10)]
    rate_limit: u32,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let mut builder = GalleryBuilder::new()
        .with_page_size(cli.page_size)
        .with_rate_limit(cli.rate_limit)
        .with_linked_wallets(cli.linked);
    if let Some(endpoint) = &cli.endpoint {
        builder = builder.with_endpoint(endpoint.clone());
    }
    let pipeline = builder.build()?;

    if let Some(id) = &cli.token {
        let detail = pipeline
            .fetch_token_detail(id)
            .await
            .with_context(|| format!("Failed to fetch token {id}"))?;
        match detail {
            Some(detail) if cli.json => println!("{}", serde_json::to_string_pretty(&detail)?),
            Some(detail) => print_detail(&detail),
            None => bail!("Token {id} not found"),
        }
        return Ok(());
    }

    let Some(input) = cli.input.as_deref() else {
        bail!("Provide a wallet address or ENS name, or --token <ID>");
    };

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, abandoning load");
            on_interrupt.cancel();
        }
    });

    let outcome = pipeline
        .load(input, log_status, &cancel)
        .await
        .with_context(|| format!("Failed to load gallery for {input}"))?;

    match outcome {
        LoadOutcome::Done(gallery) if cli.json => println!("{}", serde_json::to_string_pretty(&gallery)?),
        LoadOutcome::Done(gallery) => print_gallery(&gallery),
        LoadOutcome::Empty { primary } => {
            println!("No Art Blocks tokens found for {}", primary.display_name());
        }
    }

    Ok(())
}

fn log_status(status: &LoadStatus) {
    match status {
        LoadStatus::Resolving => info!("Resolving wallets..."),
        LoadStatus::Fetching { message } => info!("{}", message),
        LoadStatus::Grouping { count } => info!("Grouping {} pieces...", count),
    }
}

fn print_gallery(gallery: &Gallery) {
    println!("{}", gallery.title());
    println!(
        "{} pieces, {} projects, {} wallet(s)",
        gallery.summary.total_tokens, gallery.summary.total_projects, gallery.wallet_count
    );

    for group in &gallery.groups {
        println!();
        println!("== {} ({})", group.label, group.token_count());
        for project in &group.projects {
            println!("  {} by {} ({})", project.project_name, project.artist_name, project.tokens.len());
            for token in &project.tokens {
                println!(
                    "    #{} {}",
                    token.invocation,
                    token.display_media_url().unwrap_or("-")
                );
            }
        }
    }
}

fn print_detail(detail: &TokenDetail) {
    println!("{} #{}", detail.project.base.name, detail.invocation);
    println!("by {}", detail.project.base.artist_name);
    let fields = [
        ("Owner", detail.owner_address.as_deref()),
        ("Contract", detail.contract_address.as_deref()),
        ("Minted", detail.minted_at.as_deref()),
        ("Hash", detail.hash.as_deref()),
        ("Live view", detail.live_view_url.as_deref()),
        ("Media", detail.media_url.as_deref()),
        ("Script", detail.project.script_type_and_version.as_deref()),
        ("License", detail.project.license.as_deref()),
        ("Website", detail.project.website.as_deref()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("{label}: {value}");
        }
    }
    if let Some(features) = &detail.features {
        println!("Features:");
        for (name, value) in features {
            println!("  {name}: {value}");
        }
    }
}
