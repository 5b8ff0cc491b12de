use rand::Rng;
use serde::Serialize;

/// One message as the ESP32 node sends it; absent fields are skipped
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(rename = "ledState", skip_serializing_if = "Option::is_none")]
    pub led_state: Option<String>,
}

/// Random walk around indoor conditions
#[derive(Debug, Clone)]
pub struct Environment {
    co2: f64,
    temperature: f64,
    humidity: f64,
    led_on: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            co2: 450.0,
            temperature: 21.0,
            humidity: 45.0,
            led_on: false,
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl Environment {
    pub fn step(&mut self, rng: &mut impl Rng) {
        self.co2 = (self.co2 + rng.gen_range(-25.0..25.0)).clamp(380.0, 2500.0);
        self.temperature = (self.temperature + rng.gen_range(-0.3..0.3)).clamp(15.0, 32.0);
        self.humidity = (self.humidity + rng.gen_range(-1.5..1.5)).clamp(20.0, 80.0);

        // LED follows the air quality like the firmware does
        self.led_on = self.co2 > 1000.0;
    }

    /// Current readings; each field is dropped with probability `omit`
    pub fn reading(&self, rng: &mut impl Rng, omit: f64) -> Reading {
        let mut keep = |v: f64| if rng.gen_bool(omit) { None } else { Some(round1(v)) };

        Reading {
            co2: keep(self.co2.round()),
            temperature: keep(self.temperature),
            humidity: keep(self.humidity),
            led_state: Some(if self.led_on { "1" } else { "0" }.to_string()),
        }
    }
}

/// A payload the dashboard must discard
pub fn malformed(rng: &mut impl Rng) -> String {
    match rng.gen_range(0..4) {
        0 => "{\"co2\": ".to_string(),
        1 => "{\"temperature\": \"sensor error\"}".to_string(),
        2 => "{\"humidity\": 180.0}".to_string(),
        _ => "nan".to_string(),
    }
}
