//! Open-Meteo weather adapter
//!
//! Maps WMO weather codes to a small icon set and a description. Any failure
//! yields [`WeatherData::unavailable`].

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::WeatherConfig;
use crate::error::{HubError, HubResult};

pub const HOURLY_LIMIT: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeatherIcon {
    Sunny,
    PartlyCloudy,
    Cloudy,
    Rain,
    Snow,
}

impl WeatherIcon {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => WeatherIcon::Sunny,
            1..=3 => WeatherIcon::PartlyCloudy,
            4..=48 => WeatherIcon::Cloudy,
            49..=67 | 80..=82 => WeatherIcon::Rain,
            71..=77 | 85..=86 => WeatherIcon::Snow,
            c if c >= 95 => WeatherIcon::Rain,
            _ => WeatherIcon::Cloudy,
        }
    }
}

pub fn describe(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        95 => "Thunderstorm",
        _ => "Unknown",
    }
}

/// Whole degrees, halves rounded up: -0.5 shows as 0, not -1.
pub fn round_half_up(celsius: f64) -> i64 {
    (celsius + 0.5).floor() as i64
}

/// "Today", "Tomorrow", else the short weekday name.
pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".into()
    } else if Some(date) == today.checked_add_signed(Duration::days(1)) {
        "Tomorrow".into()
    } else {
        date.format("%a").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyForecast {
    pub time: String,
    pub temp_c: i64,
    pub icon: WeatherIcon,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    pub day: String,
    pub date: String,
    pub temp_high_c: i64,
    pub temp_low_c: i64,
    pub icon: WeatherIcon,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherData {
    pub temperature_c: i64,
    pub description: String,
    pub icon: WeatherIcon,
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DailyForecast>,
}

impl WeatherData {
    pub fn unavailable() -> Self {
        Self {
            temperature_c: 20,
            description: "Unable to fetch weather".into(),
            icon: WeatherIcon::Cloudy,
            hourly: Vec::new(),
            daily: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Current,
    hourly: Hourly,
    daily: Daily,
}

#[derive(Debug, Deserialize)]
struct Current {
    temperature_2m: f64,
    weather_code: i64,
}

#[derive(Debug, Deserialize)]
struct Hourly {
    time: Vec<String>,
    temperature_2m: Vec<f64>,
    weather_code: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct Daily {
    time: Vec<String>,
    weather_code: Vec<i64>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
}

pub struct Weather {
    config: WeatherConfig,
    http: reqwest::Client,
}

impl Weather {
    pub fn new(config: WeatherConfig, http: reqwest::Client) -> Self { Self { config, http } }

    pub fn default_location(&self) -> (f64, f64) { (self.config.default_lat, self.config.default_lon) }

    /// Current conditions plus hourly and 7-day forecast; never fails.
    pub async fn get_weather(&self, lat: f64, lon: f64) -> WeatherData {
        match self.fetch(lat, lon).await {
            Ok(data) => data,
            Err(e) => {
                warn!(lat, lon, error = %e, "weather fetch failed, using default");
                WeatherData::unavailable()
            }
        }
    }

    async fn fetch(&self, lat: f64, lon: f64) -> HubResult<WeatherData> {
        let response = self.http.get(&self.config.api_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current", "temperature_2m,weather_code".into()),
                ("hourly", "temperature_2m,weather_code".into()),
                ("daily", "weather_code,temperature_2m_max,temperature_2m_min".into()),
                ("timezone", "auto".into()),
                ("forecast_days", "7".into()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(HubError::upstream(format!("weather API error: {}", response.status())));
        }
        let body: ForecastResponse = response.json().await?;
        Ok(shape(body, Local::now().naive_local()))
    }
}

fn shape(body: ForecastResponse, now: NaiveDateTime) -> WeatherData {
    let today = now.date();

    let hourly = body.hourly.time.iter()
        .zip(body.hourly.temperature_2m.iter().zip(body.hourly.weather_code.iter()))
        .filter_map(|(time, (temp, code))| {
            let at = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M").ok()?;
            (at.date() == today && at.hour() >= now.hour()).then(|| HourlyForecast {
                time: at.format("%-I %p").to_string(),
                temp_c: round_half_up(*temp),
                icon: WeatherIcon::from_code(*code),
            })
        })
        .take(HOURLY_LIMIT)
        .collect();

    let daily = body.daily.time.iter().enumerate()
        .filter_map(|(i, day)| {
            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
            Some(DailyForecast {
                day: day_label(date, today),
                date: date.format("%b %-d").to_string(),
                temp_high_c: round_half_up(*body.daily.temperature_2m_max.get(i)?),
                temp_low_c: round_half_up(*body.daily.temperature_2m_min.get(i)?),
                icon: WeatherIcon::from_code(*body.daily.weather_code.get(i)?),
            })
        })
        .collect();

    WeatherData {
        temperature_c: round_half_up(body.current.temperature_2m),
        description: describe(body.current.weather_code).into(),
        icon: WeatherIcon::from_code(body.current.weather_code),
        hourly,
        daily,
    }
}
