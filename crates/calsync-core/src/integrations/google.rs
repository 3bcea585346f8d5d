//! Google Calendar v3 client implementing [`EventSource`].

use std::sync::{Mutex, PoisonError};

use serde_json::{json, Value};
use url::Url;

use super::oauth::{self, OAuthConfig, OAuthTokens};
use super::traits::{EventQuery, EventSource};
use super::transport::Transport;
use super::types::{EventTime, NewEvent, RemoteEvent};
use crate::error::{CoreError, Result};

const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// How the client obtains bearer tokens.
#[derive(Debug, Clone)]
pub enum GoogleAuth {
    /// Pre-issued access token, used as-is.
    AccessToken(String),
    /// Exchange a long-lived refresh token, caching the access token.
    RefreshToken {
        config: OAuthConfig,
        refresh_token: String,
    },
}

pub struct GoogleCalendarClient {
    transport: Transport,
    auth: GoogleAuth,
    base_url: String,
    cached_tokens: Mutex<Option<OAuthTokens>>,
}

impl GoogleCalendarClient {
    pub fn new(transport: Transport, auth: GoogleAuth) -> Self {
        Self {
            transport,
            auth,
            base_url: CALENDAR_API.to_string(),
            cached_tokens: Mutex::new(None),
        }
    }

    /// Point the client at a different API root (tests, proxies).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Return a valid access token, refreshing if expired.
    fn access_token(&self) -> Result<String> {
        let (config, refresh) = match &self.auth {
            GoogleAuth::AccessToken(token) => return Ok(token.clone()),
            GoogleAuth::RefreshToken {
                config,
                refresh_token,
            } => (config, refresh_token),
        };

        let mut cached = self
            .cached_tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(tokens) = cached.as_ref().filter(|t| !oauth::is_expired(t)) {
            return Ok(tokens.access_token.clone());
        }

        let refreshed = self
            .transport
            .block_on(oauth::refresh_token(self.transport.http(), config, refresh))?;
        let token = refreshed.access_token.clone();
        *cached = Some(refreshed);
        Ok(token)
    }

    fn events_url(&self, calendar_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            CoreError::integration("google", format!("invalid base url {}: {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| CoreError::integration("google", "base url cannot hold a path"))?
            .pop_if_empty()
            .extend(["calendars", calendar_id, "events"]);
        Ok(url)
    }

    fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        self.transport.block_on(async {
            let resp = request.send().await?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(CoreError::integration(
                    "google",
                    format!("Google Calendar API error (HTTP {status}): {text}"),
                ));
            }
            Ok::<Value, CoreError>(resp.json::<Value>().await?)
        })
    }
}

impl EventSource for GoogleCalendarClient {
    fn list_events(&self, query: &EventQuery) -> Result<Vec<RemoteEvent>> {
        let token = self.access_token()?;
        let mut url = self.events_url(&query.calendar_id)?;
        url.query_pairs_mut()
            .append_pair("timeMin", &query.time_min.to_rfc3339())
            .append_pair("maxResults", &query.max_results.to_string())
            .append_pair("singleEvents", if query.single_events { "true" } else { "false" });
        if query.single_events {
            // orderBy=startTime is only accepted together with singleEvents=true
            url.query_pairs_mut().append_pair("orderBy", "startTime");
        }

        let resp = self.send(self.transport.http().get(url).bearer_auth(&token))?;

        Ok(resp["items"]
            .as_array()
            .map(|items| items.iter().map(parse_gcal_event).collect())
            .unwrap_or_default())
    }

    fn insert_event(&self, calendar_id: &str, event: &NewEvent) -> Result<String> {
        let token = self.access_token()?;
        let url = self.events_url(calendar_id)?;
        let body = to_gcal_event(event);

        let resp = self.send(
            self.transport
                .http()
                .post(url)
                .bearer_auth(&token)
                .json(&body),
        )?;

        resp["id"]
            .as_str()
            .filter(|id| !id.is_empty())
            .map(String::from)
            .ok_or_else(|| CoreError::integration("google", "inserted event has no id"))
    }
}

fn gcal_time(value: &Value) -> Option<EventTime> {
    value["dateTime"]
        .as_str()
        .or_else(|| value["date"].as_str())
        .map(EventTime::new)
}

/// Parse a Google Calendar event resource.
pub fn parse_gcal_event(event: &Value) -> RemoteEvent {
    RemoteEvent {
        id: event["id"].as_str().filter(|s| !s.is_empty()).map(String::from),
        summary: event["summary"].as_str().map(String::from),
        start: gcal_time(&event["start"]),
        end: gcal_time(&event["end"]),
    }
}

fn gcal_time_body(time: &EventTime, all_day: bool) -> Value {
    if all_day {
        return json!({ "date": time.as_str() });
    }
    match time.instant() {
        Some(instant) if time.is_date_only() => json!({ "dateTime": instant.to_rfc3339() }),
        _ => json!({ "dateTime": time.as_str() }),
    }
}

/// Convert an insertion body to the Google Calendar event resource. Both
/// bounds are sent as `date` only when both are all-day values.
pub fn to_gcal_event(event: &NewEvent) -> Value {
    let all_day = event.is_all_day();
    json!({
        "summary": event.summary,
        "start": gcal_time_body(&event.start, all_day),
        "end": gcal_time_body(&event.end, all_day),
    })
}
