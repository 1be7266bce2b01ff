//! AQI aggregation over nearby particulate sensors.
//!
//! The sensor network (sensor.community's `airrohr` API) answers an area
//! query with a JSON array of sensors:
//!
//! - `.location.latitude` / `.location.longitude`, usually as strings
//! - `.sensordatavalues[]` with `value_type` (`"P1"` = PM10, `"P2"` = PM2.5,
//!   or unrelated channels such as `"temperature"`) and `value`
//!
//! Concentrations are converted with the EPA piecewise-linear formula and the
//! closest sensor's worse sub-index wins.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::UpstreamError;
use crate::geo;

pub const DEFAULT_RADIUS_KM: f64 = 10.0;

#[derive(Debug, Clone, Copy)]
pub struct Breakpoint {
    pub conc_lo: f64,
    pub conc_hi: f64,
    pub aqi_lo: f64,
    pub aqi_hi: f64,
}

const fn bp(conc_lo: f64, conc_hi: f64, aqi_lo: f64, aqi_hi: f64) -> Breakpoint {
    Breakpoint { conc_lo, conc_hi, aqi_lo, aqi_hi }
}

/// Concentration bands plus the open-ended hazardous row used past the last band.
pub struct BreakpointTable {
    pub bands: [Breakpoint; 6],
    pub beyond: Breakpoint,
}

pub const P1_TABLE: BreakpointTable = BreakpointTable {
    bands: [
        bp(0.0, 55.0, 0.0, 50.0),
        bp(55.0, 155.0, 51.0, 100.0),
        bp(155.0, 255.0, 101.0, 150.0),
        bp(255.0, 355.0, 151.0, 200.0),
        bp(355.0, 425.0, 201.0, 300.0),
        bp(425.0, 600.0, 301.0, 500.0),
    ],
    beyond: bp(600.0, 1000.0, 500.0, 1000.0),
};

pub const P2_TABLE: BreakpointTable = BreakpointTable {
    bands: [
        bp(0.0, 12.0, 0.0, 50.0),
        bp(12.0, 35.5, 51.0, 100.0),
        bp(35.5, 55.5, 101.0, 150.0),
        bp(55.5, 150.5, 151.0, 200.0),
        bp(150.5, 250.5, 201.0, 300.0),
        bp(250.5, 500.5, 301.0, 500.0),
    ],
    beyond: bp(500.0, 1000.0, 500.0, 1000.0),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pollutant {
    /// PM10, reported as `P1`.
    P1,
    /// PM2.5, reported as `P2`.
    P2,
}

impl Pollutant {
    pub fn from_value_type(value_type: &str) -> Option<Self> {
        match value_type {
            "P1" => Some(Pollutant::P1),
            "P2" => Some(Pollutant::P2),
            _ => None,
        }
    }

    pub fn table(self) -> &'static BreakpointTable {
        match self {
            Pollutant::P1 => &P1_TABLE,
            Pollutant::P2 => &P2_TABLE,
        }
    }

    /// Sub-index for a concentration in µg/m³. Negative readings count as 0.
    pub fn aqi(self, conc: f64) -> u32 {
        let conc = conc.max(0.0);
        let table = self.table();
        let b = table
            .bands
            .iter()
            .find(|b| conc <= b.conc_hi)
            .unwrap_or(&table.beyond);
        let aqi = (b.aqi_hi - b.aqi_lo) / (b.conc_hi - b.conc_lo) * (conc - b.conc_lo) + b.aqi_lo;
        aqi.round().max(0.0) as u32
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sensor {
    pub location: SensorLocation,
    #[serde(default)]
    pub sensordatavalues: Vec<SensorDataValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorLocation {
    pub latitude: serde_json::Value,
    pub longitude: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorDataValue {
    pub value_type: String,
    pub value: serde_json::Value,
}

/// The API mixes JSON numbers and numeric strings.
fn as_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl Sensor {
    fn reports_particulates(&self) -> bool {
        self.sensordatavalues
            .iter()
            .any(|v| Pollutant::from_value_type(&v.value_type).is_some())
    }

    fn concentration(&self, pollutant: Pollutant) -> Option<f64> {
        self.sensordatavalues
            .iter()
            .find(|v| Pollutant::from_value_type(&v.value_type) == Some(pollutant))
            .and_then(|v| as_number(&v.value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub latitude: f64,
    pub longitude: f64,
    pub aqi_p1: Option<u32>,
    pub aqi_p2: Option<u32>,
}

impl SensorReading {
    /// Returns `None` for non-particulate sensors and sensors without usable values.
    pub fn from_sensor(sensor: &Sensor) -> Option<Self> {
        if !sensor.reports_particulates() {
            return None;
        }
        let latitude = as_number(&sensor.location.latitude)?;
        let longitude = as_number(&sensor.location.longitude)?;
        let aqi_p1 = sensor.concentration(Pollutant::P1).map(|c| Pollutant::P1.aqi(c));
        let aqi_p2 = sensor.concentration(Pollutant::P2).map(|c| Pollutant::P2.aqi(c));
        if aqi_p1.is_none() && aqi_p2.is_none() {
            return None;
        }
        Some(SensorReading { latitude, longitude, aqi_p1, aqi_p2 })
    }

    /// The worse of the two sub-indices.
    pub fn aqi(&self) -> u32 {
        self.aqi_p1.max(self.aqi_p2).unwrap_or(0)
    }
}

/// AQI of the particulate sensor closest to `(lat, lon)`, or `None` when no
/// sensor qualifies.
pub fn nearest_aqi(lat: f64, lon: f64, sensors: &[Sensor]) -> Option<u32> {
    let closest = sensors
        .iter()
        .filter_map(SensorReading::from_sensor)
        .map(|r| (geo::distance(lat, lon, r.latitude, r.longitude), r))
        .min_by(|a, b| a.0.total_cmp(&b.0));

    let (distance, reading) = closest?;
    debug!(
        "Closest sensor at {:.3} km: p1={:?} p2={:?}",
        distance, reading.aqi_p1, reading.aqi_p2
    );
    Some(reading.aqi())
}

/// Client for the sensor network's area filter endpoint.
#[derive(Clone)]
pub struct SensorClient {
    http: reqwest::Client,
    base_url: String,
    radius_km: f64,
}

impl SensorClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, radius_km: f64) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            radius_km,
        }
    }

    pub fn area_url(&self, lat: f64, lon: f64) -> String {
        format!("{}/filter/area={},{},{}", self.base_url, lat, lon, self.radius_km)
    }

    pub async fn fetch_area(&self, lat: f64, lon: f64) -> Result<Vec<Sensor>, UpstreamError> {
        let url = self.area_url(lat, lon);
        info!("Fetching sensors: {}", url);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(UpstreamError::Status {
                service: "sensor network",
                status: resp.status(),
            });
        }
        let sensors: Vec<Sensor> = resp.json().await?;
        info!("Sensor network returned {} sensors", sensors.len());
        Ok(sensors)
    }

    /// `Ok(None)` means the area has no usable particulate sensor.
    pub async fn lookup_aqi(&self, lat: f64, lon: f64) -> Result<Option<u32>, UpstreamError> {
        let sensors = self.fetch_area(lat, lon).await?;
        Ok(nearest_aqi(lat, lon, &sensors))
    }
}

/// Shared HTTP client for the upstream services.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, UpstreamError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent("Fogifier/0.1.0")
        .build()?)
}
