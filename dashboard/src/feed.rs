use crate::errors::{Error, Result};
use crate::metrics::{FEED_CONNECTED, INVALID_MESSAGES_TOTAL, MESSAGES_TOTAL, VALID_MESSAGES_TOTAL};
use crate::model::{LedState, Metric, SensorMessage};
use crate::validate::validate;
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

const LED_FIELD: &str = "ledState";

/// Follow the sensor feed until the connection ends.
///
/// Remote close returns `Ok`; a transport error is returned as is. Either way
/// the connection is finished, there is no reconnect.
pub async fn run_feed(
    url: String,
    session_id: String,
    tx: mpsc::Sender<SensorMessage>,
) -> Result<()> {
    info!("Connecting to sensor feed at {} ({})", url, session_id);

    let (mut stream, _response) = connect_async(url.as_str()).await?;
    FEED_CONNECTED.set(1.0);
    info!("Connected to sensor feed");

    let result = read_frames(&mut stream, &tx).await;

    FEED_CONNECTED.set(0.0);
    match &result {
        Ok(()) => info!("Disconnected from sensor feed"),
        Err(e) => error!("Sensor feed failed: {}", e),
    }
    result
}

async fn read_frames<S>(stream: &mut S, tx: &mpsc::Sender<SensorMessage>) -> Result<()>
where
    S: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => {
                for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    MESSAGES_TOTAL.inc();
                    debug!("Received message, size: {} bytes", line.len());

                    match process_message(line, Utc::now(), tx).await {
                        Ok(()) => {}
                        Err(Error::ChannelSend) => return Err(Error::ChannelSend),
                        Err(e) => {
                            warn!("Discarding malformed message: {}", e);
                            INVALID_MESSAGES_TOTAL.inc();
                        }
                    }
                }
            }
            Message::Binary(payload) => {
                debug!("Ignoring binary frame of {} bytes", payload.len());
            }
            Message::Close(frame) => {
                info!("Sensor feed closed by peer: {:?}", frame);
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Decode, validate and forward one message
async fn process_message(
    payload: &str,
    received_at: DateTime<Utc>,
    tx: &mpsc::Sender<SensorMessage>,
) -> Result<()> {
    let message = decode_message(payload, received_at)?;
    validate(&message)?;

    tx.send(message).await.map_err(|_| Error::ChannelSend)?;
    VALID_MESSAGES_TOTAL.inc();
    Ok(())
}

/// Decode one JSON message; absent or null fields stay `None`
pub fn decode_message(payload: &str, received_at: DateTime<Utc>) -> Result<SensorMessage> {
    let value: Value = serde_json::from_str(payload)?;
    let Value::Object(fields) = value else {
        return Err(Error::Validation("Message is not a JSON object".to_string()));
    };

    let mut message = SensorMessage::new(received_at);
    for metric in Metric::ALL {
        if let Some(reading) = numeric_field(&fields, metric.field())? {
            message.set_reading(metric, reading);
        }
    }
    message.led_state = led_field(&fields);

    Ok(message)
}

fn numeric_field(fields: &Map<String, Value>, name: &str) -> Result<Option<f64>> {
    let reading = match fields.get(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match reading {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(Error::Validation(format!(
            "Invalid value for {}: {}",
            name, fields[name]
        ))),
    }
}

fn led_field(fields: &Map<String, Value>) -> Option<LedState> {
    let on = match fields.get(LED_FIELD)? {
        Value::Null => return None,
        Value::String(s) => s.trim() == "1",
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::Bool(b) => *b,
        _ => false,
    };
    Some(if on { LedState::On } else { LedState::Off })
}
