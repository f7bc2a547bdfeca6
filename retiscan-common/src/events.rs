//! Event types and the in-process event bus
//!
//! The flow controller and the session store never print or navigate
//! themselves. They emit [`AppEvent`]s; whichever front end is attached
//! (the CLI, a test) decides how to show notices and follow routes.

use crate::models::PredictionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, title: title.into(), message: message.into() }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, title: title.into(), message: message.into() }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, title: title.into(), message: message.into() }
    }
}

/// Screens a front end can be asked to show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", content = "id", rename_all = "snake_case")]
pub enum Route {
    Login,
    Upload,
    History,
    PredictionDetail(PredictionId),
}

impl Route {
    /// Route path as used by the web front end
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Upload => "/upload".to_string(),
            Route::History => "/history".to_string(),
            Route::PredictionDetail(id) => format!("/prediction/{}", id),
        }
    }
}

/// Data-less view of the upload flow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    Idle,
    ImageSelected,
    Analyzing,
    AnalysisComplete,
    Saving,
    Saved,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AppEvent {
    /// Upload flow moved between states
    FlowPhaseChanged {
        old_phase: FlowPhase,
        new_phase: FlowPhase,
        timestamp: DateTime<Utc>,
    },

    /// Session established or lost; `user_id` is `None` after sign-out
    SessionChanged {
        user_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    Notice(Notice),

    Navigate(Route),
}

/// Broadcast bus for [`AppEvent`]s
///
/// Cloning shares the underlying channel. Emitting with no subscribers is
/// not an error: front ends attach only when they care.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// `capacity` events are buffered per subscriber before the oldest are dropped
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    /// Emit to all current subscribers, returning how many received it
    pub fn emit(&self, event: AppEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(broadcast::error::SendError(event)) => {
                debug!(?event, "No subscribers for event");
                0
            }
        }
    }

    pub fn notify(&self, notice: Notice) -> usize {
        self.emit(AppEvent::Notice(notice))
    }

    pub fn navigate(&self, route: Route) -> usize {
        self.emit(AppEvent::Navigate(route))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
