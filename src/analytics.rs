//! Engagement counters fed by client tracking calls.

use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::models::popover::{intval_str, Counter};
use crate::security::nonce::{NonceKey, TRACKING_ACTION};
use crate::store::Store;

/// Close events lasting at least this long count as engaged.
pub const ENGAGEMENT_THRESHOLD_SECS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    View,
    /// Legacy dismiss event, counted separately from engaged/bounced.
    Dismissal,
    Close,
}

impl EventKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "view" => Some(EventKind::View),
            "dismissal" => Some(EventKind::Dismissal),
            "close" => Some(EventKind::Close),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::View => "view",
            EventKind::Dismissal => "dismissal",
            EventKind::Close => "close",
        }
    }
}

/// Raw tracking call parameters, exactly as received.
#[derive(Debug, Default, Clone)]
pub struct TrackRequest {
    pub event: Option<String>,
    pub nonce: Option<String>,
    pub popover_id: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackOutcome {
    pub event: EventKind,
    pub counter: Counter,
    /// Counter value after the increment.
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackError {
    InvalidNonce,
    UnknownEvent,
    InvalidPopoverId,
    NotFound,
    NotPublished,
    Store(String),
}

impl TrackError {
    pub fn status_code(&self) -> u16 {
        match self {
            TrackError::InvalidNonce => 403,
            TrackError::UnknownEvent | TrackError::InvalidPopoverId => 400,
            TrackError::NotFound => 404,
            TrackError::NotPublished => 409,
            TrackError::Store(_) => 500,
        }
    }
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::InvalidNonce => write!(f, "Invalid nonce"),
            TrackError::UnknownEvent => write!(f, "Unknown event"),
            TrackError::InvalidPopoverId => write!(f, "Invalid popover ID"),
            TrackError::NotFound => write!(f, "Popover not found"),
            TrackError::NotPublished => write!(f, "Popover not published"),
            TrackError::Store(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for TrackError {}

/// Seconds the overlay stayed open. Absent or unusable values read as 0.
pub fn parse_duration(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0)
}

pub fn close_counter(duration: f64) -> Counter {
    if duration >= ENGAGEMENT_THRESHOLD_SECS {
        Counter::Engaged
    } else {
        Counter::Bounced
    }
}

/// Validate a tracking call and bump exactly one counter.
/// Nothing is written unless the token verifies.
pub fn record_event(
    store: &dyn Store,
    key: &NonceKey,
    now: i64,
    req: &TrackRequest,
) -> Result<TrackOutcome, TrackError> {
    let nonce = req.nonce.as_deref().unwrap_or("");
    if nonce.is_empty() || key.verify(TRACKING_ACTION, nonce, now).is_none() {
        warn!("Rejected tracking call: invalid nonce");
        return Err(TrackError::InvalidNonce);
    }

    let event = req
        .event
        .as_deref()
        .and_then(EventKind::parse)
        .ok_or(TrackError::UnknownEvent)?;

    let id = req.popover_id.as_deref().map(intval_str).unwrap_or(0);
    if id <= 0 {
        return Err(TrackError::InvalidPopoverId);
    }

    let popover = store
        .popover_lookup(id)
        .map_err(TrackError::Store)?
        .ok_or(TrackError::NotFound)?;

    let (counter, published_only) = match event {
        EventKind::View => {
            if !popover.is_published() {
                return Err(TrackError::NotPublished);
            }
            (Counter::Views, true)
        }
        EventKind::Dismissal => (Counter::Dismissals, false),
        EventKind::Close => (close_counter(parse_duration(req.duration.as_deref())), false),
    };

    // The row may have been deleted or unpublished since the lookup
    let value = store
        .popover_increment(id, counter, published_only)
        .map_err(TrackError::Store)?
        .ok_or(TrackError::NotFound)?;

    debug!("popover {}: {} recorded ({:?} = {})", id, event.as_str(), counter, value);
    Ok(TrackOutcome {
        event,
        counter,
        value,
    })
}
