//! Familyhub: a family dashboard server. Bedtime and morning rituals, a
//! monster scanner for the kids' room, and a glanceable wall display.
//!
//! # Architecture
//!
//! ```text
//! Hub (entry point)
//!   │
//!   ├── Store (SQLite: ritual_completions, monster_scans, settings)
//!   │
//!   ├── RitualEngine ──► HomeEffects (sleep scene when the evening is done)
//!   ├── MonsterLog   ──► HomeEffects (bedroom light flash)
//!   │
//!   └── Adapters
//!         ├── HomeAssistant  (REST, configured through settings)
//!         ├── GoogleCalendar (OAuth refresh token + cached access token)
//!         └── Weather        (Open-Meteo)
//! ```
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/api/ritual/status?date=` | Steps completed on a date |
//! | POST | `/api/ritual/complete` | Complete a step `{date, step, totalSteps?}` |
//! | POST | `/api/ritual/reset` | Clear the evening ritual for a date |
//! | POST | `/api/ritual/trigger-sleep-mode` | Run the sleep scene now |
//! | GET/POST | `/api/morning-ritual/*` | Same, for the morning ritual |
//! | POST | `/api/monster/scan` | Log a scan, flash the light |
//! | GET | `/api/monster/history?limit=` | Newest scans first |
//! | GET | `/api/dashboard/{calendar,weather,home-status}` | Wall display feeds |
//! | GET/POST | `/api/settings` | Key/value settings |
//! | GET | `/api/auth/google[/callback]` | One-time calendar connection |
//!
//! # Usage
//!
//! ```ignore
//! use familyhub::{create_router, Hub, HubConfig};
//! use std::sync::Arc;
//!
//! let hub = Arc::new(Hub::open(HubConfig::new("familyhub").with_port(5000))?);
//! let router = create_router(hub);
//! ```

pub mod config;
pub mod error;
pub mod hub;
pub mod integrations;
pub mod logging;
pub mod monster;
pub mod ritual;
pub mod runtime;
pub mod server;
pub mod store;

pub use config::{GoogleConfig, HubConfig, WeatherConfig};
pub use error::{HubError, HubResult};
pub use hub::Hub;
pub use integrations::{FlashTiming, HomeEffects};
pub use monster::MonsterLog;
pub use ritual::{RitualEngine, Scope, StepId};
pub use runtime::{install_signal_handlers, Shutdown};
pub use server::{create_router, create_router_with_name};
pub use store::Store;
