use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use washflow::backend::{IdentityProvider, TableStore};
use washflow::client::SupabaseClient;
use washflow::config::EnvironmentConfig;
use washflow::dto::AcceptJobRequest;
use washflow::models::WashRequest;
use washflow::AppState;

#[derive(Parser, Debug)]
#[command(name = "washflow")]
#[command(author, version, about = "Vehicle wash scheduling client", long_about = None)]
struct Cli {
    /// Override log level
    #[arg(short, long, env = "WASHFLOW_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and cache the session
    Login {
        #[arg(long, env = "WASHFLOW_EMAIL")]
        email: String,
        #[arg(long, env = "WASHFLOW_PASSWORD")]
        password: String,
    },
    /// Sign out and clear local caches
    Logout,
    /// Show the current user
    Whoami,
    /// List wash requests visible to the current user
    Requests {
        /// Only open jobs (pending, no technician)
        #[arg(long)]
        available: bool,
    },
    /// Accept a pending job as the current technician
    Accept { id: Uuid },
    /// Start a confirmed wash
    Start { id: Uuid },
    /// Complete an in-progress wash
    Complete { id: Uuid },
    /// Cancel a pending or confirmed request
    Cancel { id: Uuid },
    /// List vehicles
    Vehicles,
    /// List locations
    Locations,
    /// Replay multi-step writes left pending
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let filter = cli
        .log_level
        .clone()
        .map(tracing_subscriber::EnvFilter::new)
        .or_else(|| tracing_subscriber::EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("washflow=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = EnvironmentConfig::from_env().context("loading configuration")?;
    let client = Arc::new(SupabaseClient::new(&config).context("creating backend client")?);
    let store: Arc<dyn TableStore> = client.clone();
    let identity: Arc<dyn IdentityProvider> = client;
    let state = AppState::new(config, store, identity);

    let session = state.session.bootstrap().await;
    info!("🔐 Sesión: autenticado={}", session.is_authenticated);
    if session.is_authenticated {
        state.reconcile_pending().await;
    }

    if let Err(e) = run(&state, cli.command).await {
        error!("❌ {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(state: &AppState, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            let user = state.session.login(&email, &password).await?;
            println!("Signed in as {} ({})", user.name, user.role);
        }
        Commands::Logout => {
            state.session.logout().await?;
            println!("Signed out");
        }
        Commands::Whoami => match state.session.current_user() {
            Some(user) => println!(
                "{} <{}> role={} org={}",
                user.name,
                user.email.unwrap_or_default(),
                user.role,
                user.organization_name.unwrap_or_else(|| "-".to_string())
            ),
            None => println!("Not signed in"),
        },
        Commands::Requests { available } => {
            let requests = if available {
                state.wash_requests.available_jobs().await?
            } else {
                state.wash_requests.refresh(true).await?;
                state.wash_requests.list()
            };
            for request in &requests {
                print_request(request);
            }
        }
        Commands::Accept { id } => {
            let user = state.session.require_user()?;
            let request = state
                .wash_requests
                .accept_job(AcceptJobRequest::new(id, user.id))
                .await?;
            print_request(&request);
        }
        Commands::Start { id } => print_request(&state.wash_requests.start_wash(id).await?),
        Commands::Complete { id } => print_request(&state.wash_requests.complete_wash(id).await?),
        Commands::Cancel { id } => print_request(&state.wash_requests.cancel(id).await?),
        Commands::Vehicles => {
            for vehicle in state.vehicles.list().await? {
                println!(
                    "{}  {}  plate={}  location={}",
                    vehicle.id,
                    vehicle.display_name(),
                    vehicle.license_plate.as_deref().unwrap_or("-"),
                    vehicle.location_id.map_or_else(|| "-".to_string(), |l| l.to_string())
                );
            }
        }
        Commands::Locations => {
            for location in state.locations.list().await? {
                println!(
                    "{}  {}{}  {}  vehicles={}",
                    location.id,
                    location.name,
                    if location.is_default { " (default)" } else { "" },
                    location.full_address(),
                    location.vehicle_count
                );
            }
        }
        Commands::Reconcile => {
            let report = state.reconcile_pending().await;
            println!(
                "replayed={} skipped={} failed={}",
                report.replayed, report.skipped, report.failed
            );
        }
    }
    Ok(())
}

fn print_request(request: &WashRequest) {
    println!(
        "{}  {}  {}  vehicles={}  tech={}  price={}  location={}",
        request.id,
        request.status,
        request.preferred_date_start.format("%Y-%m-%d %H:%M"),
        request.vehicle_ids.len(),
        request.technician_id.map_or_else(|| "-".to_string(), |t| t.to_string()),
        request.price,
        request.location.as_ref().map_or("-", |l| l.name.as_str())
    );
}
