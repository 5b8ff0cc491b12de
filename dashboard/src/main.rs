mod chart;
mod config;
mod dashboard;
mod errors;
mod export;
mod feed;
mod forecast;
mod history;
mod metrics;
mod model;
mod rest;
mod series;
mod validate;

use anyhow::Context;
use clap::Parser;
use config::{Cli, Command, ExportArgs, ForecastArgs, SensorsArgs};
use dashboard::DashboardState;
use forecast::{ForecastClient, ForecastView, SeriesToggles};
use history::HistoryStore;
use model::ForecastRequest;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = metrics::init_metrics() {
        warn!("Failed to register metrics: {}", e);
    }

    let result = match cli.command {
        Command::Forecast(args) => run_forecast(args).await,
        Command::Sensors(args) => run_sensors(args).await,
        Command::Export(args) => run_export(args).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run_forecast(args: ForecastArgs) -> anyhow::Result<()> {
    let client = ForecastClient::new(&args.forecast_url, &args.geocoding_url);
    let mut view = ForecastView::new(SeriesToggles {
        temperature: !args.no_temperature,
        humidity: !args.no_humidity,
        dewpoint: !args.no_dewpoint,
    });

    let (latitude, longitude) = match (&args.place, args.latitude, args.longitude) {
        (Some(place), _, _) => {
            let hit = client.geocode(place).await?;
            info!(
                "Using {}{} at {}, {}",
                hit.name,
                hit.country.as_deref().map(|c| format!(", {}", c)).unwrap_or_default(),
                hit.latitude,
                hit.longitude
            );
            (hit.latitude, hit.longitude)
        }
        (None, Some(latitude), Some(longitude)) => (latitude, longitude),
        _ => anyhow::bail!("Either --place or both --latitude and --longitude are required"),
    };

    let start_date = args
        .start_date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let request = ForecastRequest {
        latitude,
        longitude,
        start_date,
        end_date: args.end_date.unwrap_or(start_date),
    };

    view.apply(client.fetch(&request).await);
    print!("{}", view.render());

    if view.forecast().is_none() {
        anyhow::bail!(
            "Forecast unavailable: {}",
            view.last_error().unwrap_or("no data returned")
        );
    }
    Ok(())
}

async fn run_sensors(args: SensorsArgs) -> anyhow::Result<()> {
    let session_id = format!("dashboard-{}", uuid::Uuid::new_v4());
    info!("Starting sensor dashboard");
    info!("Feed: {}", args.url);

    let history = match &args.history_dir {
        Some(dir) => Some(
            HistoryStore::open(dir, args.history_cap)
                .await
                .with_context(|| format!("Failed to open history at {}", dir.display()))?,
        ),
        None => None,
    };

    let state = DashboardState::new(args.series_capacity);
    let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot());

    // Bounded channel between the feed reader and the dashboard
    info!("Channel capacity: {}", args.channel_capacity);
    let (tx, rx) = mpsc::channel(args.channel_capacity.max(1));

    let feed_url = args.url.clone();
    let mut feed_handle =
        tokio::spawn(async move { feed::run_feed(feed_url, session_id, tx).await });

    let print = !args.quiet;
    let dashboard_handle = tokio::spawn(async move {
        dashboard::run_dashboard(rx, state, history, snapshot_tx, print).await
    });

    if let Some(addr) = args.http_addr {
        let app = rest::create_router(snapshot_rx, args.history_dir.clone());
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!("HTTP server listening on {}", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    let feed_result = tokio::select! {
        joined = &mut feed_handle => Some(joined),
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            None
        }
    };
    if feed_result.is_none() {
        feed_handle.abort();
    }

    // The feed task owned the only sender; the dashboard drains and stops
    let final_state = dashboard_handle.await.context("Dashboard task panicked")?;
    info!("Shutting down, LED state was {}", final_state.led_state());

    if let Some(joined) = feed_result {
        joined.context("Feed task panicked")??;
    }
    Ok(())
}

async fn run_export(args: ExportArgs) -> anyhow::Result<()> {
    let logs = history::load_history(&args.history_dir)
        .await
        .with_context(|| format!("Failed to read history at {}", args.history_dir.display()))?;

    let rows = match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let rows = export::export_csv(&logs, file)?;
            info!("Exported {} rows to {}", rows, path.display());
            rows
        }
        None => export::export_csv(&logs, std::io::stdout().lock())?,
    };

    if args.clear {
        let mut store = HistoryStore::open(&args.history_dir, history::DEFAULT_HISTORY_CAP).await?;
        store.clear().await?;
        info!("Cleared history after exporting {} rows", rows);
    }

    Ok(())
}
