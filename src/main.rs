//! dealscout command-line interface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dealscout::browser::ChallengeRenderer;
use dealscout::fallback::{self, FallbackCascade};
use dealscout::models::SearchStats;
use dealscout::{
    sites, Deal, DealDuration, EngineConfig, ProductType, Region, SearchCriteria, SearchEngine,
    SearchOutcome, SortOption, TrustFilter, TrustLevel,
};

#[derive(Parser)]
#[command(name = "dealscout")]
#[command(about = "Multi-source subscription deal price search")]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search all sources for current deals
    Search {
        /// Region filter (global, us, uk, eu, ae, tr, br, ar, in; default: all)
        #[arg(short, long, default_value = "all")]
        region: String,
        /// Product type filter (key, account; default: all)
        #[arg(short = 't', long, default_value = "all")]
        product_type: String,
        /// Duration filter in months (1, 3, 6, 12; default: all)
        #[arg(short, long, default_value = "all")]
        duration: String,
        /// Trust filter (high, medium, all)
        #[arg(long, default_value = "all")]
        trust: String,
        /// Include trial offers
        #[arg(long)]
        include_trials: bool,
        /// Result ordering (price-low, price-high, rating, trust)
        #[arg(short, long, default_value = "price-low")]
        sort: String,
        /// Skip the browser renderer for challenge-protected sites
        #[arg(long)]
        no_browser: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered sources in execution order
    Sources,

    /// Show the seller trust table
    Trust,

    /// Show reference catalog prices for a region
    Reference {
        /// Region (global, us, uk, eu, ae, tr, br, ar, in; default: all)
        #[arg(short, long, default_value = "all")]
        region: String,
        #[arg(long)]
        json: bool,
    },
}

fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let default_filter = if is_verbose() {
        "dealscout=info"
    } else {
        "dealscout=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    }
    .with_env_overrides();

    match cli.command {
        Commands::Search {
            region,
            product_type,
            duration,
            trust,
            include_trials,
            sort,
            no_browser,
            json,
        } => {
            let criteria = SearchCriteria {
                region: parse_region(&region)?,
                product_type: parse_product_type(&product_type)?,
                duration: parse_duration(&duration)?,
                trust_filter: parse_trust(&trust)?,
                exclude_trials: !include_trials,
                sort: parse_sort(&sort)?,
            };
            run_search(config, criteria, no_browser, json).await
        }
        Commands::Sources => {
            let client = dealscout::scrapers::HttpClient::new(config.pacing.clone(), None);
            let registry =
                sites::build_registry(&client, &config, None, CancellationToken::new());
            for (i, source) in registry.list().iter().enumerate() {
                let tag = if source.slow_aggregator {
                    " (aggregator)"
                } else if source.needs_challenge_render {
                    " (challenge-rendered)"
                } else {
                    ""
                };
                println!("{:2}. {}{}", i + 1, source.name, style(tag).dim());
            }
            Ok(())
        }
        Commands::Trust => {
            for seller in dealscout::models::seller::SELLERS {
                let trust = match seller.trust_level {
                    TrustLevel::High => style("high   ").green(),
                    TrustLevel::Medium => style("medium ").yellow(),
                    TrustLevel::Caution => style("caution").red(),
                };
                println!(
                    "{} {:<18} {}",
                    trust,
                    seller.name,
                    style(seller.website).dim()
                );
                println!("        {}", seller.description);
            }
            Ok(())
        }
        Commands::Reference { region, json } => {
            let region = parse_region(&region)?;
            let cascade = FallbackCascade::default();
            let criteria = SearchCriteria { region, ..SearchCriteria::default() };
            let mut deals = cascade.get_for_criteria(&criteria);
            if region != Region::All {
                deals.push(fallback::official_price(region));
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&deals)?);
            } else {
                print_deals(&deals);
            }
            Ok(())
        }
    }
}

async fn run_search(
    config: EngineConfig,
    criteria: SearchCriteria,
    no_browser: bool,
    json: bool,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let client = dealscout::scrapers::HttpClient::new(config.pacing.clone(), None);
    let renderer = make_renderer(&config, no_browser);
    let registry = sites::build_registry(&client, &config, renderer, cancel.clone());
    let total_sources = registry.len();

    let engine = SearchEngine::new(registry, config).with_cancellation(cancel);

    let bar = ProgressBar::new(total_sources as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let outcome = engine
        .search(
            &criteria,
            |progress| {
                bar.set_position(progress.sources_completed as u64);
                bar.set_message(format!(
                    "{} ({} deals)",
                    progress.current_source_label, progress.deals_found_so_far
                ));
            },
            |_partial| {},
        )
        .await;

    bar.finish_and_clear();

    match outcome {
        SearchOutcome::Success { mut deals, total_found, elapsed_ms, sources_searched } => {
            apply_sort(&mut deals, criteria.sort);
            if json {
                println!("{}", serde_json::to_string_pretty(&deals)?);
                return Ok(());
            }

            println!(
                "{} {} deals from {} sources in {:.1}s\n",
                style("Found").green().bold(),
                total_found,
                sources_searched,
                elapsed_ms as f64 / 1000.0
            );
            if dealscout::aggregate::is_all_fallback(&deals) {
                println!(
                    "{}\n",
                    style("All results are reference prices; no live fetch succeeded.").yellow()
                );
            }
            print_deals(&deals);

            if let Some(stats) = SearchStats::from_deals(&deals) {
                println!(
                    "\n{} low {:.2} / avg {:.2} / high {:.2} {} across {} sellers",
                    style("Prices:").bold(),
                    stats.lowest_price,
                    stats.average_price,
                    stats.highest_price,
                    stats.currency,
                    stats.seller_count,
                );
            }
            Ok(())
        }
        SearchOutcome::Empty => {
            // Whole-session emptiness is the caller's cue to fall back to
            // reference prices.
            let cascade = FallbackCascade::default();
            let deals = cascade.get_for_criteria(&criteria);
            if deals.is_empty() {
                println!("{}", style("No deals found.").yellow());
            } else {
                println!(
                    "{}\n",
                    style("No live deals; showing reference prices.").yellow()
                );
                if json {
                    println!("{}", serde_json::to_string_pretty(&deals)?);
                } else {
                    print_deals(&deals);
                }
            }
            Ok(())
        }
        SearchOutcome::Error { message, cause } => {
            match cause {
                Some(cause) => bail!("search failed: {} ({})", message, cause),
                None => bail!("search failed: {}", message),
            }
        }
        SearchOutcome::Loading => unreachable!("search returned before completion"),
    }
}

#[cfg(feature = "browser")]
fn make_renderer(config: &EngineConfig, no_browser: bool) -> Option<Arc<ChallengeRenderer>> {
    if no_browser {
        return None;
    }
    let factory = Arc::new(dealscout::browser::ChromiumFactory::new(config.render.clone()));
    Some(Arc::new(ChallengeRenderer::new(factory, config.render.clone())))
}

#[cfg(not(feature = "browser"))]
fn make_renderer(_config: &EngineConfig, _no_browser: bool) -> Option<Arc<ChallengeRenderer>> {
    None
}

fn print_deals(deals: &[Deal]) {
    for (i, deal) in deals.iter().enumerate() {
        let trust = match deal.trust_level {
            TrustLevel::High => style("high").green(),
            TrustLevel::Medium => style("medium").yellow(),
            TrustLevel::Caution => style("caution").red(),
        };
        let trial = if deal.is_trial { " [trial]" } else { "" };
        println!(
            "{:2}. {:>10}  {:<16} {:<8} {:<10} {}{}",
            i + 1,
            style(deal.formatted_price()).bold(),
            deal.seller_name,
            deal.region.display_name(),
            format!("{}mo", deal.duration.months()),
            trust,
            trial,
        );
        println!("    {}", style(&deal.url).dim());
    }
}

fn apply_sort(deals: &mut [Deal], sort: SortOption) {
    match sort {
        // Engine output is already (region bucket, price) ascending.
        SortOption::PriceLow => {}
        SortOption::PriceHigh => {
            deals.sort_by(|a, b| {
                b.price.partial_cmp(&a.price).unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        SortOption::Rating => {
            deals.sort_by(|a, b| {
                b.rating
                    .unwrap_or(0.0)
                    .partial_cmp(&a.rating.unwrap_or(0.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        SortOption::Trust => deals.sort_by_key(|d| d.trust_level),
    }
}

fn parse_region(value: &str) -> anyhow::Result<Region> {
    Ok(match value.to_lowercase().as_str() {
        "all" => Region::All,
        "global" | "ww" => Region::Global,
        "us" => Region::Us,
        "uk" => Region::Uk,
        "eu" => Region::Eu,
        "ae" | "uae" => Region::Uae,
        "tr" | "turkey" => Region::Turkey,
        "br" | "brazil" => Region::Brazil,
        "ar" | "argentina" => Region::Argentina,
        "in" | "india" => Region::India,
        other => bail!("unknown region: {other}"),
    })
}

fn parse_product_type(value: &str) -> anyhow::Result<ProductType> {
    Ok(match value.to_lowercase().as_str() {
        "all" => ProductType::All,
        "key" => ProductType::Key,
        "account" => ProductType::Account,
        other => bail!("unknown product type: {other}"),
    })
}

fn parse_duration(value: &str) -> anyhow::Result<DealDuration> {
    Ok(match value.to_lowercase().as_str() {
        "all" => DealDuration::All,
        "1" | "1m" => DealDuration::OneMonth,
        "3" | "3m" => DealDuration::ThreeMonths,
        "6" | "6m" => DealDuration::SixMonths,
        "12" | "12m" => DealDuration::TwelveMonths,
        other => bail!("unknown duration: {other}"),
    })
}

fn parse_trust(value: &str) -> anyhow::Result<TrustFilter> {
    Ok(match value.to_lowercase().as_str() {
        "high" => TrustFilter::HighOnly,
        "medium" => TrustFilter::HighAndMedium,
        "all" => TrustFilter::All,
        "caution" => TrustFilter::CautionInclusive,
        other => bail!("unknown trust filter: {other}"),
    })
}

fn parse_sort(value: &str) -> anyhow::Result<SortOption> {
    Ok(match value.to_lowercase().as_str() {
        "price-low" | "price" => SortOption::PriceLow,
        "price-high" => SortOption::PriceHigh,
        "rating" => SortOption::Rating,
        "trust" => SortOption::Trust,
        other => bail!("unknown sort option: {other}"),
    })
}
