//! Election-day weather and its turnout effect.
//!
//! Resolution is three-tiered: a primary HTTP source, a secondary HTTP
//! source, and finally a static per-prefecture table keyed by the district
//! id prefix. The run never fails because of weather; the static tier
//! always answers.

use serde::Deserialize;
use tracing::{debug, warn};

use sim_core::entities::{WeatherInfo, WeatherSource};
use sim_core::ids::DistrictId;

use crate::OracleError;

/* ------------------------------- observation ------------------------------- */

/// Raw conditions as reported by either HTTP tier.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct WeatherObservation {
    pub temperature_c: f64,
    pub precipitation_mm: f64,
    pub snowfall_cm: f64,
    pub wind_speed_kmh: f64,
}

/// Additive turnout modifier for the observed conditions.
///
/// Each factor contributes its worst matching tier; mild weather earns a
/// small bonus. The total is clamped to [-0.15, +0.03].
pub fn compute_turnout_modifier(obs: &WeatherObservation) -> f64 {
    let mut modifier: f64 = 0.0;

    modifier += match obs.snowfall_cm {
        s if s >= 20.0 => -0.12,
        s if s >= 10.0 => -0.08,
        s if s >= 5.0 => -0.05,
        s if s > 0.0 => -0.02,
        _ => 0.0,
    };
    modifier += match obs.precipitation_mm {
        p if p >= 50.0 => -0.08,
        p if p >= 20.0 => -0.05,
        p if p >= 10.0 => -0.03,
        p if p >= 5.0 => -0.01,
        _ => 0.0,
    };
    modifier += match obs.temperature_c {
        t if t <= -5.0 => -0.05,
        t if t <= 0.0 => -0.03,
        t if t >= 35.0 => -0.04,
        t if t >= 30.0 => -0.02,
        _ => 0.0,
    };
    modifier += match obs.wind_speed_kmh {
        w if w >= 50.0 => -0.03,
        w if w >= 30.0 => -0.01,
        _ => 0.0,
    };

    let mild = obs.precipitation_mm < 1.0
        && obs.snowfall_cm < 1.0
        && (10.0..=25.0).contains(&obs.temperature_c)
        && obs.wind_speed_kmh < 20.0;
    if mild {
        modifier += 0.02;
    }

    modifier.clamp(-0.15, 0.03)
}

/// Human-readable summary used in prompts and reports.
pub fn describe(obs: &WeatherObservation) -> String {
    let condition = if obs.snowfall_cm >= 10.0 {
        "heavy snow"
    } else if obs.snowfall_cm > 0.0 {
        "light snow"
    } else if obs.precipitation_mm >= 20.0 {
        "heavy rain"
    } else if obs.precipitation_mm >= 1.0 {
        "rain"
    } else if obs.wind_speed_kmh >= 30.0 {
        "strong wind"
    } else {
        "clear"
    };
    format!(
        "{condition}, {:.0}C, wind {:.0} km/h",
        obs.temperature_c, obs.wind_speed_kmh
    )
}

/* -------------------------------- resolution ------------------------------- */

/// Three-tier weather resolver.
pub struct WeatherService {
    client: reqwest::Client,
    primary_url: Option<String>,
    secondary_url: Option<String>,
}

impl WeatherService {
    pub fn new(primary_url: Option<String>, secondary_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            primary_url,
            secondary_url,
        }
    }

    /// No HTTP tiers; every lookup answers from the static table.
    pub fn offline() -> Self {
        Self::new(None, None)
    }

    /// Resolve conditions for one district. Infallible by construction.
    pub async fn lookup(&self, district: &DistrictId) -> WeatherInfo {
        for (url, source) in [
            (&self.primary_url, WeatherSource::Primary),
            (&self.secondary_url, WeatherSource::Secondary),
        ] {
            let Some(base) = url else { continue };
            match self.fetch(base, district).await {
                Ok(obs) => {
                    let info = WeatherInfo {
                        turnout_modifier: compute_turnout_modifier(&obs),
                        description: describe(&obs),
                        source,
                    };
                    debug!(district = %district, source = ?info.source, modifier = info.turnout_modifier, "weather resolved");
                    return info;
                }
                Err(err) => {
                    warn!(district = %district, source = ?source, %err, "weather tier failed");
                }
            }
        }
        static_weather(district)
    }

    async fn fetch(
        &self,
        base: &str,
        district: &DistrictId,
    ) -> Result<WeatherObservation, OracleError> {
        let url = format!("{}/{}", base.trim_end_matches('/'), district);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(OracleError::RequestFailed {
                status: response.status().as_u16(),
            });
        }
        Ok(response.json::<WeatherObservation>().await?)
    }
}

/// Prefecture codes with heavy winter weather in a typical election season.
const HEAVY_SNOW_CODES: [&str; 8] = ["01", "02", "05", "06", "15", "16", "17", "18"];
const MODERATE_SNOW_CODES: [&str; 6] = ["03", "04", "07", "20", "31", "32"];

/// Static climatology fallback keyed by the prefecture-code prefix of the
/// district id (the part before the first underscore).
pub fn static_weather(district: &DistrictId) -> WeatherInfo {
    let code = district.as_str().split('_').next().unwrap_or("");
    let (modifier, description) = if HEAVY_SNOW_CODES.contains(&code) {
        (-0.10, "seasonal heavy snow (climatology)")
    } else if MODERATE_SNOW_CODES.contains(&code) {
        (-0.05, "seasonal snow (climatology)")
    } else {
        (0.0, "seasonal average (climatology)")
    };
    WeatherInfo {
        turnout_modifier: modifier,
        description: description.to_string(),
        source: WeatherSource::Static,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_day() -> WeatherObservation {
        WeatherObservation {
            temperature_c: 15.0,
            precipitation_mm: 0.0,
            snowfall_cm: 0.0,
            wind_speed_kmh: 5.0,
        }
    }

    #[test]
    fn mild_day_earns_the_bonus() {
        assert_eq!(compute_turnout_modifier(&clear_day()), 0.02);
    }

    #[test]
    fn snowfall_tiers() {
        let mut obs = clear_day();
        obs.temperature_c = 2.0;
        obs.snowfall_cm = 3.0;
        assert_eq!(compute_turnout_modifier(&obs), -0.02);
        obs.snowfall_cm = 12.0;
        assert_eq!(compute_turnout_modifier(&obs), -0.08);
        obs.snowfall_cm = 25.0;
        assert_eq!(compute_turnout_modifier(&obs), -0.12);
    }

    #[test]
    fn compound_bad_weather_clamps_at_floor() {
        let obs = WeatherObservation {
            temperature_c: -8.0,
            precipitation_mm: 60.0,
            snowfall_cm: 30.0,
            wind_speed_kmh: 55.0,
        };
        // -0.12 - 0.08 - 0.05 - 0.03 = -0.28, clamped.
        assert_eq!(compute_turnout_modifier(&obs), -0.15);
    }

    #[test]
    fn heat_and_wind_subtract() {
        let mut obs = clear_day();
        obs.temperature_c = 36.0;
        obs.wind_speed_kmh = 35.0;
        let m = compute_turnout_modifier(&obs);
        assert!((m - (-0.05)).abs() < 1e-12);
    }

    #[test]
    fn static_table_keys_on_prefecture_prefix() {
        let heavy: DistrictId = "01_3".parse().unwrap();
        let moderate: DistrictId = "20_1".parse().unwrap();
        let temperate: DistrictId = "13_5".parse().unwrap();
        assert_eq!(static_weather(&heavy).turnout_modifier, -0.10);
        assert_eq!(static_weather(&moderate).turnout_modifier, -0.05);
        assert_eq!(static_weather(&temperate).turnout_modifier, 0.0);
        assert_eq!(static_weather(&heavy).source, WeatherSource::Static);
    }

    #[tokio::test]
    async fn offline_service_answers_from_the_table() {
        let service = WeatherService::offline();
        let info = service.lookup(&"05_2".parse().unwrap()).await;
        assert_eq!(info.source, WeatherSource::Static);
        assert_eq!(info.turnout_modifier, -0.10);
    }

    #[test]
    fn description_names_the_dominant_condition() {
        let mut obs = clear_day();
        assert!(describe(&obs).starts_with("clear"));
        obs.snowfall_cm = 15.0;
        assert!(describe(&obs).starts_with("heavy snow"));
    }
}
