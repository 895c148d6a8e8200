use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parking_fines::config::Config;
use parking_fines::lookups::{MunicipalityImageService, VehicleRegistryService};
use parking_fines::models::CheckStatus;
use parking_fines::orchestrator::CheckOrchestrator;
use parking_fines::report;
use parking_fines::validation::{digits_only, validate_check_input};

#[derive(Parser)]
#[command(name = "parking-fines")]
#[command(about = "Check for unpaid parking fines across municipalities", long_about = None)]
struct Cli {
    /// Backend base URL (overrides FINES_API_URL)
    #[arg(long, global = true, env = "FINES_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an ID number and plate for open fines
    Check {
        /// National ID number (up to 9 digits)
        #[arg(long)]
        id: String,
        /// Vehicle plate number (up to 8 digits)
        #[arg(long)]
        car: String,
        /// Wait for the complete response instead of streaming results
        #[arg(long)]
        no_stream: bool,
        /// Only show municipalities with this status (clean, fine, failed)
        #[arg(long)]
        status: Option<CheckStatus>,
        /// Print the final response as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the municipalities the backend checks
    Municipalities {
        /// Also resolve each municipality's image
        #[arg(long)]
        images: bool,
    },
    /// Look up a vehicle in the public registry
    Vehicle {
        /// Vehicle plate number
        #[arg(long)]
        car: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parking_fines=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.api_url)?;
    tracing::info!("Configuration loaded successfully");

    match cli.command {
        Commands::Check {
            id,
            car,
            no_stream,
            status,
            json,
        } => run_check(&config, &id, &car, no_stream, status, json).await,
        Commands::Municipalities { images } => list_municipalities(&config, images).await,
        Commands::Vehicle { car } => show_vehicle(&config, &car).await,
    }
}

async fn run_check(
    config: &Config,
    id: &str,
    car: &str,
    no_stream: bool,
    status: Option<CheckStatus>,
    json: bool,
) -> anyhow::Result<()> {
    let (id, car) = validate_check_input(id, car)?;
    let mut orchestrator = CheckOrchestrator::new(config)?;
    let vehicles = VehicleRegistryService::new(config)?;

    // Vehicle lookup runs alongside the check and never fails it
    let vehicle_lookup = async {
        match vehicles.lookup(&car).await {
            Ok(vehicle) => Some(vehicle),
            Err(e) => {
                tracing::warn!("Vehicle lookup failed: {}", e);
                None
            }
        }
    };

    let check = async {
        if no_stream {
            orchestrator.run_blocking_check(&id, &car).await
        } else {
            orchestrator
                .run_check_with(&id, &car, |result| {
                    if !json {
                        eprintln!("{}", report::render_result(result));
                    }
                })
                .await
        }
    };

    let (vehicle, response) = tokio::join!(vehicle_lookup, check);
    let response = response.context("Check failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if let Some(vehicle) = vehicle {
        let today = chrono::Local::now().date_naive();
        println!("{}", report::render_vehicle(&vehicle, today));
    }
    print!("{}", report::render_response(&response, status));

    Ok(())
}

async fn list_municipalities(config: &Config, images: bool) -> anyhow::Result<()> {
    let orchestrator = CheckOrchestrator::new(config)?;
    let municipalities = orchestrator.client().fetch_municipalities().await?;

    let image_map = if images {
        let names: Vec<String> = municipalities.iter().map(|m| m.name.clone()).collect();
        MunicipalityImageService::new(config)?
            .fetch_images(&names)
            .await
    } else {
        Default::default()
    };

    for info in &municipalities {
        println!(
            "{}",
            report::render_municipality(info, image_map.get(&info.name).map(String::as_str))
        );
    }
    println!("\n{} municipalities", municipalities.len());

    Ok(())
}

async fn show_vehicle(config: &Config, car: &str) -> anyhow::Result<()> {
    let car = digits_only(car);
    let vehicle = VehicleRegistryService::new(config)?
        .lookup(&car)
        .await
        .context("Vehicle lookup failed")?;

    let today = chrono::Local::now().date_naive();
    print!("{}", report::render_vehicle(&vehicle, today));
    Ok(())
}
