//! SafeNow command-line client.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use safenow_client::api::{HazardType, SafetyState, SafetyStatusUpdate};
use safenow_client::geo;
use safenow_client::{AuthState, SafeNowClient, Settings};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "safenow")]
#[command(about = "SafeNow crisis alerts from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend root, e.g. https://safenow.example/api
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Where the session is kept between runs. Defaults to ~/.safenow/session.json
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        /// Username or e-mail
        username: String,
        #[arg(long, env = "SAFENOW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session on the server and locally
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Report this device's safety status
    Status {
        device_id: String,
        /// unknown, ok, in-shelter or need-help
        #[arg(value_parser = parse_state)]
        state: SafetyState,
        #[arg(long)]
        shelter_id: Option<i64>,
    },
    /// Active alerts covering a location, with the closest shelter
    Alerts {
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lon: f64,
    },
    /// Shelters closest to a location
    Shelters {
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lon: f64,
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// What to do for a given hazard
    Instructions {
        #[arg(value_parser = parse_hazard)]
        hazard: HazardType,
        /// Seconds until you can reach shelter
        #[arg(long)]
        eta: Option<u64>,
    },
    /// Backend health and counts
    Health,
}

fn parse_state(raw: &str) -> Result<SafetyState, String> {
    match raw.to_lowercase().replace('_', "-").as_str() {
        "unknown" => Ok(SafetyState::Unknown),
        "ok" => Ok(SafetyState::Ok),
        "in-shelter" => Ok(SafetyState::InShelter),
        "need-help" => Ok(SafetyState::NeedHelp),
        other => Err(format!("unknown status '{}'", other)),
    }
}

fn parse_hazard(raw: &str) -> Result<HazardType, String> {
    HazardType::parse(raw).ok_or_else(|| format!("unknown hazard '{}'", raw))
}

fn default_session_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".safenow").join("session.json"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let mut config = Settings::new().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    if let Some(path) = cli.session_file.or_else(|| config.storage.session_file.clone()).or_else(default_session_file) {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
        }
        config.storage.session_file = Some(path);
    }
    debug!("Using backend {}", config.api.base_url);

    let app = SafeNowClient::new(config)?;
    let _listener = app.auth.spawn_logout_listener();

    match cli.command {
        Commands::Login { username, password } => {
            let user = app.auth.login(&username, &password).await?;
            println!("Logged in as {} ({})", user.display_name(), user.email);
        }
        Commands::Logout => {
            app.auth.logout().await;
            println!("Logged out");
        }
        Commands::Whoami => match app.auth.initialize().await {
            AuthState::Authenticated(user) => {
                println!("{} <{}>", user.display_name(), user.email);
                println!("username: {}", user.username);
                println!("role:     {:?}", user.role);
                if let Some(profile) = &user.profile {
                    println!("alerts:   within {} km", profile.alert_radius);
                }
            }
            _ => bail!("Not logged in"),
        },
        Commands::Status {
            device_id,
            state,
            shelter_id,
        } => {
            let ack = app
                .resources
                .update_safety_status(&SafetyStatusUpdate {
                    device_id,
                    status: state,
                    shelter_id,
                })
                .await?;
            println!("{}", ack.message);
        }
        Commands::Alerts { lat, lon } => {
            let (alerts, shelters) = futures::try_join!(
                app.resources.active_alerts(lat, lon),
                app.resources.nearby_shelters(lat, lon, Some(1)),
            )?;
            if alerts.is_empty() {
                println!("No active alerts at ({}, {})", lat, lon);
            }
            for alert in &alerts {
                let distance = geo::haversine_km(lat, lon, alert.center_lat, alert.center_lon);
                println!(
                    "[{:?}] {} from {}, {:.1} km away, until {}",
                    alert.severity,
                    alert.hazard_type,
                    alert.source,
                    distance,
                    alert.valid_until.format("%Y-%m-%d %H:%M UTC")
                );
            }
            if let Some(shelter) = shelters.first().filter(|_| !alerts.is_empty()) {
                println!(
                    "Closest shelter: {} ({}), {:.2} km, ~{} min on foot",
                    shelter.name,
                    shelter.address,
                    shelter.distance_km,
                    shelter.eta_seconds.div_ceil(60)
                );
            }
        }
        Commands::Shelters { lat, lon, limit } => {
            let shelters = app.resources.nearby_shelters(lat, lon, limit).await?;
            info!("Found {} shelters", shelters.len());
            for shelter in shelters {
                println!(
                    "{:>6.2} km  ~{:>3} min  {}{}  {}",
                    shelter.distance_km,
                    shelter.eta_seconds.div_ceil(60),
                    shelter.name,
                    if shelter.is_open_now { "" } else { " (closed)" },
                    shelter.address
                );
            }
        }
        Commands::Instructions { hazard, eta } => {
            let advice = app.resources.safety_instructions(hazard, eta).await?;
            println!("{}", advice.title);
            for (i, step) in advice.steps.iter().enumerate() {
                println!("  {}. {}", i + 1, step);
            }
            if !advice.do_not.is_empty() {
                println!("Do not:");
                for item in &advice.do_not {
                    println!("  - {}", item);
                }
            }
            if let Some(hint) = advice.eta_hint {
                println!("{}", hint);
            }
        }
        Commands::Health => {
            let health = app.resources.health().await?;
            println!("status:  {}", health.status);
            println!("version: {}", health.version);
            let mut counts: Vec<_> = health.counts.into_iter().collect();
            counts.sort();
            for (name, count) in counts {
                println!("{}: {}", name, count);
            }
        }
    }

    Ok(())
}
