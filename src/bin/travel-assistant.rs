// Interactive console driver

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use travel_assistant::orchestrator::ReportStatus;
use travel_assistant::presentation::{flight_table, hotel_table};
use travel_assistant::{AssistantConfig, SearchOrchestrator};

#[derive(Debug, Parser)]
#[command(
    name = "travel-assistant",
    about = "Find flights, hotels and attractions from a plain-language travel request"
)]
struct Cli {
    #[arg(long, help = "Language model to use (overrides GEMINI_MODEL)")]
    model: Option<String>,

    #[arg(long, help = "Per-request network timeout in seconds")]
    timeout_secs: Option<u64>,

    #[arg(long, help = "Pause after each attraction search, in seconds")]
    cooldown_secs: Option<u64>,

    #[arg(long, default_value = "travel_assistant=info", help = "Log filter used when RUST_LOG is unset")]
    log_level: String,

    #[arg(long, help = "Run flights, hotels and attractions at once for this query and exit")]
    plan: Option<String>,
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, question: &str) -> Result<String> {
    print!("{}", question);
    io::stdout().flush()?;
    let line = lines.next().transpose()?.unwrap_or_default();
    Ok(line.trim().to_string())
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_lowercase().as_str(), "yes" | "y")
}

fn print_section(title: &str) {
    println!("\n{}\n", title);
    println!("--------------------------------------\n");
}

async fn plan(orchestrator: &SearchOrchestrator, query: &str) {
    let plan = orchestrator.plan_trip(query).await;
    if plan.flights.status == ReportStatus::Found {
        print_section("🛫 Available Flights: 🛫");
        println!("{}", flight_table(&plan.flights.offers));
    }
    println!("\n{}", plan.flights);
    if plan.hotels.status == ReportStatus::Found {
        print_section("🏨 Available Hotels: 🏨");
        println!("{}", hotel_table(&plan.hotels.offers));
    }
    println!("\n{}", plan.hotels);
    print_section("🔎 The most visited tourist attractions: 🔎");
    println!("{}", plan.attractions);
}

async fn converse(orchestrator: &SearchOrchestrator) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    println!("\nHello, I'm your travel assistant. Tell me where you're going, and I'll take care of the rest! 🌍");
    let query = prompt(&mut lines, "What flight are you looking for: ")?;
    if query.is_empty() {
        println!("No request given.");
        return Ok(());
    }

    let flights = orchestrator.run_flight_search(&query).await;
    if flights.status == ReportStatus::Found {
        print_section("🛫 Available Flights: 🛫");
        println!("{}", flight_table(&flights.offers));
    }
    println!("\n{}", flights);

    let answer = prompt(&mut lines, "\nDo you want to search for hotels? (yes/no): ")?;
    if is_yes(&answer) {
        let hotels = orchestrator.run_hotel_search(&query).await;
        if hotels.status == ReportStatus::Found {
            print_section("🏨 Available Hotels: 🏨");
            println!("{}", hotel_table(&hotels.offers));
        }
        println!("\n{}", hotels);
    }

    let answer = prompt(
        &mut lines,
        "\nDo you want suggestions for tourist attractions? (yes/no): ",
    )?;
    if is_yes(&answer) {
        match orchestrator.intent_for(&query).await {
            Ok(intent) => {
                let text = orchestrator
                    .run_attraction_search(&intent.destination_city)
                    .await;
                print_section("🔎 The most visited tourist attractions: 🔎");
                println!("{}", text);
            }
            Err(e) => println!("❌ Could not understand the travel request: {}", e),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut config = AssistantConfig::from_env().context("configuration error")?;
    if let Some(model) = cli.model {
        config = config.with_model(model);
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_http_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.cooldown_secs {
        config = config.with_attraction_cooldown(Duration::from_secs(secs));
    }

    let orchestrator =
        SearchOrchestrator::from_config(&config).context("could not build the search clients")?;

    match cli.plan {
        Some(query) => plan(&orchestrator, &query).await,
        None => converse(&orchestrator).await?,
    }

    let stats = orchestrator.cache().stats();
    tracing::debug!(?stats, "identifier cache at exit");
    println!("\n👋 Goodbye! Have a great trip! 🚀");
    Ok(())
}
