//! External service adapters
//!
//! Each wraps one vendor HTTP API, normalizes the response into a small DTO
//! and degrades to an empty/default value instead of failing.
//!
//! | Adapter | Vendor | Config source |
//! |---------|--------|---------------|
//! | [`GoogleCalendar`] | Google Calendar v3 | env (`GOOGLE_*`) |
//! | [`HomeAssistant`] | Home Assistant REST | settings table |
//! | [`Weather`] | Open-Meteo | env / defaults |

pub mod calendar;
pub mod home;
pub mod weather;

pub use calendar::{CalendarEvent, GoogleCalendar, TokenCache};
pub use home::{FlashTiming, HaEntity, HomeAssistant, HomeEffects};
pub use weather::{Weather, WeatherData, WeatherIcon};
