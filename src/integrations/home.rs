//! Home Assistant adapter. Connection config lives in the settings table so it
//! can be changed at runtime.
//!
//! Every call swallows its own errors: `None`, `false` or an empty list.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::store::{call_blocking, Store};

/// Setting keys read by the adapter.
pub mod keys {
    pub const URL: &str = "home_assistant_url";
    pub const TOKEN: &str = "home_assistant_token";
    pub const SLEEP_SCENE: &str = "home_assistant_sleep_scene";
    pub const BEDROOM_LIGHT: &str = "home_assistant_bedroom_light";
    pub const DASHBOARD_ENTITIES: &str = "home_assistant_dashboard_entities";
}

pub const DEFAULT_SLEEP_SCENE: &str = "scene.sleep_mode";
pub const DEFAULT_BEDROOM_LIGHT: &str = "light.bedroom";
pub const UNAVAILABLE: &str = "unavailable";

/// Side effects the ritual engine and the monster scanner fire and forget.
#[async_trait]
pub trait HomeEffects: Send + Sync {
    async fn trigger_sleep_mode(&self) -> bool;
    async fn trigger_monster_scan_effect(&self) -> bool;
}

/// Pauses in the scan flash: on, off, on, off, then restore.
#[derive(Debug, Clone, Copy)]
pub struct FlashTiming {
    pub first_on: Duration,
    pub off: Duration,
    pub second_on: Duration,
    pub before_restore: Duration,
}

impl Default for FlashTiming {
    fn default() -> Self {
        Self {
            first_on: Duration::from_millis(300),
            off: Duration::from_millis(200),
            second_on: Duration::from_millis(300),
            before_restore: Duration::from_millis(500),
        }
    }
}

impl FlashTiming {
    pub fn instant() -> Self {
        Self { first_on: Duration::ZERO, off: Duration::ZERO, second_on: Duration::ZERO, before_restore: Duration::ZERO }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Connection {
    base_url: String,
    token: String,
}

/// One row of `home_assistant_dashboard_entities`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    pub id: String,
    pub friendly_name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HaEntity {
    pub id: String,
    pub friendly_name: String,
    pub state: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

pub struct HomeAssistant {
    store: Arc<Store>,
    http: reqwest::Client,
    timing: FlashTiming,
}

impl HomeAssistant {
    pub fn new(store: Arc<Store>, http: reqwest::Client) -> Self {
        Self { store, http, timing: FlashTiming::default() }
    }

    pub fn with_timing(mut self, timing: FlashTiming) -> Self { self.timing = timing; self }

    async fn setting(&self, key: &'static str) -> Option<String> {
        match call_blocking(self.store.clone(), move |s| s.get_setting(key)).await {
            Ok(setting) => setting.map(|s| s.value).filter(|v| !v.trim().is_empty()),
            Err(e) => {
                error!(key, error = %e, "failed to read home assistant setting");
                None
            }
        }
    }

    async fn connection(&self) -> Option<Connection> {
        let base_url = self.setting(keys::URL).await?;
        let token = self.setting(keys::TOKEN).await?;
        Some(Connection { base_url: base_url.trim().trim_end_matches('/').to_string(), token: token.trim().to_string() })
    }

    /// True iff both base URL and token settings are present.
    pub async fn is_configured(&self) -> bool {
        self.connection().await.is_some()
    }

    pub async fn get_entity_state(&self, entity_id: &str) -> Option<String> {
        let conn = self.connection().await?;
        let url = format!("{}/api/states/{}", conn.base_url, entity_id);
        let response = match self.http.get(&url).bearer_auth(&conn.token).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(entity_id, error = %e, "home assistant state request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(entity_id, status = %response.status(), "home assistant API error");
            return None;
        }
        match response.json::<Value>().await {
            Ok(body) => body.get("state").and_then(|s| s.as_str()).map(String::from),
            Err(e) => {
                warn!(entity_id, error = %e, "home assistant state body unreadable");
                None
            }
        }
    }

    /// Generic `POST /api/services/<domain>/<service>` passthrough.
    pub async fn call_service(&self, domain: &str, service: &str, payload: Value) -> bool {
        let Some(conn) = self.connection().await else {
            info!(domain, service, "home assistant not configured, skipping service call");
            return false;
        };
        let url = format!("{}/api/services/{}/{}", conn.base_url, domain, service);
        match self.http.post(&url).bearer_auth(&conn.token).json(&payload).send().await {
            Ok(response) => {
                debug!(domain, service, status = %response.status(), "home assistant service called");
                response.status().is_success()
            }
            Err(e) => {
                warn!(domain, service, error = %e, "home assistant service call failed");
                false
            }
        }
    }

    pub async fn trigger_sleep_mode(&self) -> bool {
        let scene = self.setting(keys::SLEEP_SCENE).await.unwrap_or_else(|| DEFAULT_SLEEP_SCENE.into());
        self.call_service("scene", "turn_on", json!({"entity_id": scene})).await
    }

    /// Flash the bedroom light twice, then turn it back on if it was on.
    pub async fn trigger_monster_scan_effect(&self) -> bool {
        let light = self.setting(keys::BEDROOM_LIGHT).await.unwrap_or_else(|| DEFAULT_BEDROOM_LIGHT.into());
        let original = self.get_entity_state(&light).await;

        self.call_service("light", "turn_on", json!({"entity_id": light, "brightness": 255})).await;
        tokio::time::sleep(self.timing.first_on).await;
        self.call_service("light", "turn_off", json!({"entity_id": light})).await;
        tokio::time::sleep(self.timing.off).await;
        self.call_service("light", "turn_on", json!({"entity_id": light, "brightness": 255})).await;
        tokio::time::sleep(self.timing.second_on).await;
        self.call_service("light", "turn_off", json!({"entity_id": light})).await;

        if original.as_deref() == Some("on") {
            tokio::time::sleep(self.timing.before_restore).await;
            self.call_service("light", "turn_on", json!({"entity_id": light})).await;
        }
        true
    }

    /// Configured dashboard entities with their current state.
    pub async fn get_dashboard_entities(&self) -> Vec<HaEntity> {
        let Some(raw) = self.setting(keys::DASHBOARD_ENTITIES).await else {
            return Vec::new();
        };
        let configs: Vec<EntityConfig> = match serde_json::from_str(&raw) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "dashboard entity list is not valid JSON");
                return Vec::new();
            }
        };
        let mut entities = Vec::with_capacity(configs.len());
        for cfg in configs {
            let state = self.get_entity_state(&cfg.id).await.unwrap_or_else(|| UNAVAILABLE.into());
            entities.push(HaEntity { id: cfg.id, friendly_name: cfg.friendly_name, state, kind: cfg.kind });
        }
        entities
    }
}

#[async_trait]
impl HomeEffects for HomeAssistant {
    async fn trigger_sleep_mode(&self) -> bool { HomeAssistant::trigger_sleep_mode(self).await }
    async fn trigger_monster_scan_effect(&self) -> bool { HomeAssistant::trigger_monster_scan_effect(self).await }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> (Arc<Store>, HomeAssistant) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let ha = HomeAssistant::new(store.clone(), reqwest::Client::new()).with_timing(FlashTiming::instant());
        (store, ha)
    }

    #[tokio::test]
    async fn unconfigured_adapter_degrades() {
        let (store, ha) = adapter();
        assert!(!ha.is_configured().await);
        assert_eq!(ha.get_entity_state("light.bedroom").await, None);
        assert!(!ha.call_service("scene", "turn_on", json!({})).await);
        assert!(!ha.trigger_sleep_mode().await);
        assert!(ha.get_dashboard_entities().await.is_empty());

        // token alone is not enough
        store.set_setting(keys::TOKEN, "abc").unwrap();
        assert!(!ha.is_configured().await);
        store.set_setting(keys::URL, "http://127.0.0.1:9/").unwrap();
        assert!(ha.is_configured().await);
    }

    #[tokio::test]
    async fn invalid_entity_json_yields_empty_list() {
        let (store, ha) = adapter();
        store.set_setting(keys::DASHBOARD_ENTITIES, "{not json").unwrap();
        assert!(ha.get_dashboard_entities().await.is_empty());
    }

    #[test]
    fn entity_config_parses_camel_case() {
        let raw = r#"[{"id":"sensor.kids_room","friendlyName":"Kids room","type":"temperature"}]"#;
        let parsed: Vec<EntityConfig> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed[0].friendly_name, "Kids room");
        assert_eq!(parsed[0].kind.as_deref(), Some("temperature"));
    }
}
