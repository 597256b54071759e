//! Hub - wires the store, the ritual engine, the scanner and the adapters

use std::sync::Arc;
use tracing::info;

use crate::config::HubConfig;
use crate::error::HubResult;
use crate::integrations::{FlashTiming, GoogleCalendar, HomeAssistant, Weather};
use crate::monster::MonsterLog;
use crate::ritual::RitualEngine;
use crate::store::Store;

pub struct Hub {
    pub config: HubConfig,
    pub store: Arc<Store>,
    pub ritual: RitualEngine,
    pub monster: MonsterLog,
    pub home: Arc<HomeAssistant>,
    pub calendar: GoogleCalendar,
    pub weather: Weather,
}

impl Hub {
    /// Open the SQLite file at `config.db_path()` and build every component.
    pub fn open(config: HubConfig) -> HubResult<Self> {
        let path = config.db_path();
        let store = Store::open(&path)?;
        info!(db = %path.display(), "store opened");
        Ok(Self::with_store(config, Arc::new(store), FlashTiming::default()))
    }

    pub fn with_store(config: HubConfig, store: Arc<Store>, flash: FlashTiming) -> Self {
        let http = config.http_client();
        let home = Arc::new(HomeAssistant::new(store.clone(), http.clone()).with_timing(flash));
        Self {
            ritual: RitualEngine::new(store.clone(), home.clone()),
            monster: MonsterLog::new(store.clone(), home.clone()),
            calendar: GoogleCalendar::new(config.google.clone(), http.clone()),
            weather: Weather::new(config.weather.clone(), http),
            home,
            store,
            config,
        }
    }
}
