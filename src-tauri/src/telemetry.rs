//! Session telemetry: timed function events, logged errors and a final
//! session summary.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndState {
    Success,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Function {
        name: String,
        duration_ms: u64,
        ok: bool,
        at: DateTime<Utc>,
    },
    Error {
        message: String,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Serialize)]
struct SessionSummary<'a> {
    session_id: &'a str,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    end_state: EndState,
    events: &'a [Event],
}

pub struct Telemetry {
    api_key: String,
    endpoint: Option<String>,
    session_id: String,
    started_at: DateTime<Utc>,
    events: Mutex<Vec<Event>>,
    ended: Mutex<bool>,
}

impl Telemetry {
    pub fn new(api_key: impl Into<String>, endpoint: Option<String>) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(session = %session_id, "telemetry session started");
        Self {
            api_key: api_key.into(),
            endpoint,
            session_id,
            started_at: Utc::now(),
            events: Mutex::new(Vec::new()),
            ended: Mutex::new(false),
        }
    }

    /// Time `fut` and record it under `name`, passing its result through.
    pub async fn record_function<T, E, F>(&self, name: &str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let started = Instant::now();
        let result = fut.await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(function = name, duration_ms, "function completed"),
            Err(e) => tracing::warn!(function = name, duration_ms, error = %e, "function failed"),
        }
        self.events.lock().push(Event::Function {
            name: name.to_string(),
            duration_ms,
            ok: result.is_ok(),
            at: Utc::now(),
        });
        result
    }

    pub fn log_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(error = %message, "recorded error");
        self.events.lock().push(Event::Error {
            message,
            at: Utc::now(),
        });
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// `Fail` if any recorded error or failed function, else `Success`.
    pub fn outcome(&self) -> EndState {
        let failed = self.events.lock().iter().any(|e| match e {
            Event::Function { ok, .. } => !ok,
            Event::Error { .. } => true,
        });
        if failed {
            EndState::Fail
        } else {
            EndState::Success
        }
    }

    /// Close the session once. With an endpoint configured the summary is
    /// posted there; delivery failures are only logged.
    pub async fn end_session(&self, state: EndState) {
        {
            let mut ended = self.ended.lock();
            if *ended {
                return;
            }
            *ended = true;
        }

        let events = self.events();
        tracing::info!(
            session = %self.session_id,
            end_state = ?state,
            events = events.len(),
            "telemetry session ended"
        );

        let Some(endpoint) = &self.endpoint else {
            return;
        };
        let summary = SessionSummary {
            session_id: &self.session_id,
            started_at: self.started_at,
            ended_at: Utc::now(),
            end_state: state,
            events: &events,
        };
        let result = reqwest::Client::new()
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(&summary)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to deliver telemetry summary");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_function_passes_result_through() {
        let telemetry = Telemetry::new("key", None);
        let ok: Result<u32, String> = telemetry.record_function("compare", async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
        let err: Result<u32, String> = telemetry
            .record_function("chat", async { Err("boom".to_string()) })
            .await;
        assert_eq!(err, Err("boom".to_string()));

        let events = telemetry.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Event::Function { name, ok: true, .. } if name == "compare"));
        assert!(matches!(&events[1], Event::Function { ok: false, .. }));
    }

    #[test]
    fn test_outcome_reflects_errors() {
        let telemetry = Telemetry::new("key", None);
        assert_eq!(telemetry.outcome(), EndState::Success);
        telemetry.log_error("upload failed");
        assert_eq!(telemetry.outcome(), EndState::Fail);
    }

    #[tokio::test]
    async fn test_end_session_without_endpoint_is_local_only() {
        let telemetry = Telemetry::new("key", None);
        telemetry.end_session(EndState::Success).await;
        telemetry.end_session(EndState::Fail).await;
        assert!(*telemetry.ended.lock());
    }
}
