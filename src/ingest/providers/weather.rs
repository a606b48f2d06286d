// src/ingest/providers/weather.rs
//! Race-weekend forecast from Open-Meteo. Failures never abort a run: they
//! come back as a `ContextData` carrying an `error` string so the prompt can
//! mention the missing forecast.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ingest::config::WeatherSpec;

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub max_temp_c: Option<f64>,
    pub min_temp_c: Option<f64>,
    pub precip_pct: Option<f64>,
    pub code: Option<i64>,
}

/// Pass-through context payload for the draft prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextData {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub days: Vec<ForecastDay>,
}

impl ContextData {
    pub fn failed(location: impl Into<String>, error: impl ToString) -> Self {
        Self {
            location: location.into(),
            error: Some(error.to_string()),
            days: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Source of the opaque context handed to the draft phase.
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Never fails; errors are folded into the payload.
    async fn fetch_context(&self) -> ContextData;
}

/// Fixed context, handy for tests and offline runs.
pub struct StaticContext(pub ContextData);

#[async_trait]
impl ContextSource for StaticContext {
    async fn fetch_context(&self) -> ContextData {
        self.0.clone()
    }
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResp {
    daily: Option<Daily>,
}

#[derive(Debug, Default, Deserialize)]
struct Daily {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    weathercode: Vec<Option<i64>>,
}

pub struct WeatherProvider {
    spec: WeatherSpec,
    client: reqwest::Client,
    base_url: String,
}

impl WeatherProvider {
    pub fn new(spec: WeatherSpec, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building weather http client")?;
        Ok(Self {
            spec,
            client,
            base_url: OPEN_METEO_URL.to_string(),
        })
    }

    /// Point at a different Open-Meteo compatible endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn try_fetch(&self) -> Result<ContextData> {
        let days = self.spec.forecast_days.to_string();
        let lat = self.spec.latitude.to_string();
        let lon = self.spec.longitude.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.as_str()),
                ("longitude", lon.as_str()),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,precipitation_probability_max,weathercode",
                ),
                ("timezone", self.spec.timezone.as_str()),
                ("forecast_days", days.as_str()),
            ])
            .send()
            .await
            .context("open-meteo get()")?
            .error_for_status()
            .context("open-meteo non-2xx")?;
        let body = resp.text().await.context("open-meteo .text()")?;
        parse_forecast(&self.spec.location, &body)
    }
}

#[async_trait]
impl ContextSource for WeatherProvider {
    async fn fetch_context(&self) -> ContextData {
        match self.try_fetch().await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, location = %self.spec.location, "weather fetch failed");
                counter!("ingest_context_errors_total").increment(1);
                ContextData::failed(&self.spec.location, format!("{e:#}"))
            }
        }
    }
}

/// Parse an Open-Meteo daily forecast body.
pub fn parse_forecast(location: &str, body: &str) -> Result<ContextData> {
    let parsed: OpenMeteoResp = serde_json::from_str(body).context("decoding open-meteo json")?;
    let daily = parsed.daily.ok_or_else(|| anyhow!("open-meteo response has no `daily` block"))?;

    let days = daily
        .time
        .iter()
        .enumerate()
        .map(|(i, date)| ForecastDay {
            date: date.clone(),
            max_temp_c: daily.temperature_2m_max.get(i).copied().flatten(),
            min_temp_c: daily.temperature_2m_min.get(i).copied().flatten(),
            precip_pct: daily.precipitation_probability_max.get(i).copied().flatten(),
            code: daily.weathercode.get(i).copied().flatten(),
        })
        .collect();

    Ok(ContextData {
        location: location.to_string(),
        error: None,
        days,
    })
}
