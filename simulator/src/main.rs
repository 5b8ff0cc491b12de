mod telemetry;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use clap::Parser;
use rand::Rng;
use std::net::SocketAddr;
use std::time::Duration;
use telemetry::Environment;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Stand-in ESP32 node serving the sensor feed over WebSocket
#[derive(Debug, Clone, Parser)]
#[command(name = "simulator", version, about)]
struct Args {
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8081")]
    listen: SocketAddr,

    /// Milliseconds between messages
    #[arg(long, env = "INTERVAL_MS", default_value_t = 2000)]
    interval_ms: u64,

    /// Probability that a field is left out of a message
    #[arg(long, env = "OMIT_RATE", default_value_t = 0.05, value_parser = parse_rate)]
    omit_rate: f64,

    /// Probability that a message is malformed
    #[arg(long, env = "MALFORMED_RATE", default_value_t = 0.0, value_parser = parse_rate)]
    malformed_rate: f64,
}

/// Probability in [0, 1]; NaN and infinities are rejected
fn parse_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.trim().parse().map_err(|e| format!("{}", e))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(format!("{} is not a probability between 0 and 1", s));
    }
    Ok(rate)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting ESP32 simulator");
    info!(
        "Listen: {}, interval: {}ms, omit rate: {}, malformed rate: {}",
        args.listen, args.interval_ms, args.omit_rate, args.malformed_rate
    );

    let (tx, _) = broadcast::channel::<String>(64);

    let producer_tx = tx.clone();
    let producer_args = args.clone();
    tokio::spawn(async move {
        produce(producer_tx, producer_args).await;
    });

    let app = Router::new().route("/ws", get(ws_handler)).with_state(tx);

    let listener = match tokio::net::TcpListener::bind(args.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };
    info!("Serving sensor feed on ws://{}/ws", args.listen);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }
}

async fn produce(tx: broadcast::Sender<String>, args: Args) {
    let omit_rate = args.omit_rate;
    let malformed_rate = args.malformed_rate;
    let mut env = Environment::default();
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut counter = 0u64;

    loop {
        ticker.tick().await;

        // ThreadRng is not Send, keep it out of the await points
        let payload = {
            let mut rng = rand::thread_rng();
            env.step(&mut rng);
            if rng.gen_bool(malformed_rate) {
                telemetry::malformed(&mut rng)
            } else {
                match serde_json::to_string(&env.reading(&mut rng, omit_rate)) {
                    Ok(p) => p,
                    Err(e) => {
                        error!("Failed to serialize reading: {}", e);
                        continue;
                    }
                }
            }
        };

        counter += 1;
        debug!("Publishing message {}: {}", counter, payload);
        // No subscribers just means nobody is connected yet
        let _ = tx.send(payload);

        if counter % 100 == 0 {
            info!("Published {} messages", counter);
        }
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(tx): State<broadcast::Sender<String>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_client(socket, tx.subscribe()))
}

async fn serve_client(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    info!("Client connected");

    loop {
        tokio::select! {
            payload = rx.recv() => {
                match payload {
                    Ok(payload) => {
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client lagging, skipped {} messages", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!("Client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("0.05"), Ok(0.05));
        assert_eq!(parse_rate("1"), Ok(1.0));
        assert!(parse_rate("NaN").is_err());
        assert!(parse_rate("inf").is_err());
        assert!(parse_rate("-0.1").is_err());
        assert!(parse_rate("1.5").is_err());
        assert!(parse_rate("often").is_err());
    }

    #[test]
    fn test_nan_rate_rejected_from_cli() {
        let args = Args::try_parse_from(["simulator", "--omit-rate", "NaN"]);
        assert!(args.is_err());

        let args = Args::try_parse_from(["simulator", "--malformed-rate", "0.2"]).unwrap();
        assert_eq!(args.malformed_rate, 0.2);
        assert_eq!(args.omit_rate, 0.05);
    }
}
