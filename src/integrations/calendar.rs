//! Google Calendar adapter (v3 REST + OAuth2 refresh token)
//!
//! ```text
//! refresh_token ──► TokenCache::get_or_refresh ──► access_token
//!                                                      │
//!            users/me/calendarList ◄───────────────────┤
//!            calendars/{id}/events (per calendar) ◄────┘
//!                       │
//!                       ▼
//!          merge ─► sort by start ─► Vec<CalendarEvent>
//! ```

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::config::GoogleConfig;
use crate::error::{HubError, HubResult};

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";
pub const DEFAULT_DAYS: i64 = 3;
/// Widest window the dashboard asks for.
pub const MAX_DAYS: i64 = 365;
const MAX_RESULTS_PER_CALENDAR: &str = "20";
/// Refresh this long before the vendor's stated expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool { self.expires_at > now }
}

/// Single-slot access token cache.
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self { Self::default() }

    /// Cached value if still valid, otherwise run `refresh` and store its result.
    /// Holding the lock across the refresh keeps concurrent callers from
    /// refreshing twice.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> HubResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HubResult<CachedToken>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref() {
            if token.is_valid_at(Utc::now()) {
                return Ok(token.value.clone());
            }
        }
        let fresh = refresh().await?;
        let value = fresh.value.clone();
        *slot = Some(fresh);
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub start: String,
    pub end: String,
    pub summary: String,
    pub calendar_name: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarList {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

#[derive(Debug, Deserialize)]
struct CalendarListEntry {
    id: Option<String>,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<EventItem>,
}

#[derive(Debug, Deserialize)]
struct EventItem {
    id: Option<String>,
    summary: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl EventTime {
    fn render(time: Option<EventTime>) -> String {
        time.and_then(|t| t.date_time.or(t.date)).unwrap_or_default()
    }
}

/// Sort key for an event start: RFC 3339 instant or all-day date at midnight UTC.
fn start_instant(start: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(start).map(|d| d.with_timezone(&Utc)).ok()
        .or_else(|| NaiveDate::parse_from_str(start, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0).map(|d| d.and_utc()))
}

/// `days` query value; missing, non-numeric or non-positive means the
/// default, anything wider is capped at [`MAX_DAYS`].
pub fn parse_days(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|d| *d > 0)
        .map_or(DEFAULT_DAYS, |d| d.min(MAX_DAYS))
}

/// Ascending by start; unparseable starts sink to the end.
pub fn sort_events(events: &mut [CalendarEvent]) {
    events.sort_by_key(|e| {
        let at = start_instant(&e.start);
        (at.is_none(), at)
    });
}

pub struct GoogleCalendar {
    config: GoogleConfig,
    http: reqwest::Client,
    tokens: TokenCache,
}

impl GoogleCalendar {
    pub fn new(config: GoogleConfig, http: reqwest::Client) -> Self {
        Self { config, http, tokens: TokenCache::new() }
    }

    pub fn is_connected(&self) -> bool {
        self.config.client().is_some() && self.config.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Consent screen URL for the one-time setup flow.
    pub fn auth_url(&self) -> HubResult<String> {
        let (client_id, _) = self.config.client()
            .ok_or_else(|| HubError::Config("GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET must be set".into()))?;
        let url = Url::parse_with_params(&self.config.auth_url, &[
            ("client_id", client_id),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", CALENDAR_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ]).map_err(|e| HubError::Config(format!("auth url: {e}")))?;
        Ok(url.into())
    }

    /// Trade an authorization code for tokens; returns the refresh token.
    pub async fn exchange_code(&self, code: &str) -> HubResult<String> {
        let (client_id, client_secret) = self.config.client()
            .ok_or_else(|| HubError::Config("GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET must be set".into()))?;
        let response = self.http.post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await?;
        let body = decode::<TokenResponse>(response).await?;
        body.refresh_token.filter(|t| !t.is_empty())
            .ok_or_else(|| HubError::upstream("no refresh token returned; revoke access and try again"))
    }

    async fn refresh_access_token(&self) -> HubResult<CachedToken> {
        let (client_id, client_secret) = self.config.client()
            .ok_or_else(|| HubError::Config("Google client credentials not set".into()))?;
        let refresh_token = self.config.refresh_token.as_deref().filter(|t| !t.is_empty())
            .ok_or_else(|| HubError::Config("Google Calendar not connected".into()))?;
        debug!("refreshing google access token");
        let response = self.http.post(&self.config.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await?;
        let body = decode::<TokenResponse>(response).await?;
        let value = body.access_token.ok_or_else(|| HubError::upstream("token response without access_token"))?;
        let ttl = body.expires_in.unwrap_or(3600).saturating_sub(EXPIRY_MARGIN_SECS).max(0);
        let expires_at = Duration::try_seconds(ttl)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| HubError::upstream(format!("token lifetime of {ttl}s is out of range")))?;
        Ok(CachedToken { value, expires_at })
    }

    async fn access_token(&self) -> HubResult<String> {
        self.tokens.get_or_refresh(|| self.refresh_access_token()).await
    }

    fn endpoint(&self, segments: &[&str]) -> HubResult<Url> {
        let mut url = Url::parse(&self.config.api_base).map_err(|e| HubError::Config(format!("api base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| HubError::Config("api base cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Events from every calendar in `[now, now + days]`, sorted by start.
    /// Never fails: errors are logged and yield what could be fetched.
    pub async fn upcoming_events(&self, days: i64) -> Vec<CalendarEvent> {
        if !self.is_connected() {
            debug!("google calendar not connected");
            return Vec::new();
        }
        match self.fetch_upcoming(days).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "calendar events unavailable");
                Vec::new()
            }
        }
    }

    async fn fetch_upcoming(&self, days: i64) -> HubResult<Vec<CalendarEvent>> {
        let now = Utc::now();
        let until = Duration::try_days(days)
            .and_then(|window| now.checked_add_signed(window))
            .ok_or_else(|| HubError::invalid(format!("calendar window of {days} days is out of range")))?;
        let time_min = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let time_max = until.to_rfc3339_opts(SecondsFormat::Millis, true);
        let token = self.access_token().await?;

        let list_url = self.endpoint(&["users", "me", "calendarList"])?;
        let response = self.http.get(list_url).bearer_auth(&token).send().await?;
        let calendars = decode::<CalendarList>(response).await?.items;

        let mut events = Vec::new();
        for cal in calendars {
            let Some(id) = cal.id else { continue };
            let name = cal.summary.unwrap_or_else(|| "Calendar".into());
            match self.calendar_events(&token, &id, &time_min, &time_max).await {
                Ok(items) => events.extend(items.into_iter().filter_map(|item| {
                    Some(CalendarEvent {
                        id: item.id?,
                        summary: item.summary?,
                        start: EventTime::render(item.start),
                        end: EventTime::render(item.end),
                        calendar_name: name.clone(),
                    })
                })),
                Err(e) => error!(calendar = %id, error = %e, "failed to fetch calendar events"),
            }
        }
        sort_events(&mut events);
        Ok(events)
    }

    async fn calendar_events(&self, token: &str, calendar_id: &str, time_min: &str, time_max: &str) -> HubResult<Vec<EventItem>> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let response = self.http.get(url)
            .bearer_auth(token)
            .query(&[
                ("timeMin", time_min),
                ("timeMax", time_max),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("maxResults", MAX_RESULTS_PER_CALENDAR),
            ])
            .send()
            .await?;
        Ok(decode::<EventList>(response).await?.items)
    }
}

async fn decode<T>(response: reqwest::Response) -> HubResult<T>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(HubError::upstream(format!("http {status}: {}", body.trim())));
    }
    Ok(response.json::<T>().await?)
}
