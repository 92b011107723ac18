//! Client-side overlay lifecycle.
//!
//! The controller owns nothing global: the page it drives and the sink that
//! receives tracking events are handed in at construction, so the same state
//! machine runs in a browser shim, a native client or a test.

use std::time::Instant;

use crate::analytics::EventKind;
use crate::models::popover::{clamp_cookie_days, intval_str};

pub mod cookie;
pub mod tracker;

pub use cookie::DismissalCookie;
pub use tracker::HttpTracker;

/// Values read from the overlay container's data attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayHandle {
    pub popover_id: i64,
    pub cookie_days: i64,
}

impl OverlayHandle {
    pub fn new(popover_id: i64, cookie_days: i64) -> Self {
        OverlayHandle {
            popover_id,
            cookie_days,
        }
    }

    /// Parse `data-popover-id` and `data-cookie-days`. An unreadable day count
    /// means no cookie and out-of-range counts are clamped. An unreadable id
    /// means there is no overlay to drive.
    pub fn from_attributes(popover_id: &str, cookie_days: &str) -> Option<Self> {
        let id = popover_id.trim().parse::<i64>().ok().filter(|id| *id > 0)?;
        Some(Self::new(id, clamp_cookie_days(intval_str(cookie_days))))
    }
}

/// The page the overlay lives in.
pub trait OverlayPage {
    fn lock_scroll(&mut self);
    fn unlock_scroll(&mut self);
    fn focus_close_control(&mut self);
    fn remove_overlay(&mut self);
    fn write_cookie(&mut self, cookie: &DismissalCookie);
    fn is_https(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackEvent {
    pub kind: EventKind,
    pub popover_id: i64,
    /// Seconds open, on close events only.
    pub duration: Option<f64>,
}

/// Receives tracking events. Must return without waiting on delivery.
pub trait EventSink {
    fn emit(&self, event: TrackEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    /// Rendered but not yet shown.
    Closed,
    Open { opened_at: Instant },
    /// Closed for the rest of the page load.
    Dismissed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    CloseButton,
    Backdrop,
    EscapeKey,
}

/// Where a pointer activation landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Backdrop,
    Content,
}

pub struct OverlayController<P: OverlayPage, S: EventSink> {
    handle: OverlayHandle,
    page: P,
    sink: S,
    state: OverlayState,
}

impl<P: OverlayPage, S: EventSink> OverlayController<P, S> {
    pub fn new(handle: OverlayHandle, page: P, sink: S) -> Self {
        OverlayController {
            handle,
            page,
            sink,
            state: OverlayState::Closed,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn handle(&self) -> OverlayHandle {
        self.handle
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Show the overlay on page ready. Happens at most once per page load.
    pub fn open(&mut self, now: Instant) -> bool {
        if self.state != OverlayState::Closed {
            return false;
        }
        self.page.lock_scroll();
        self.page.focus_close_control();
        self.state = OverlayState::Open { opened_at: now };
        self.sink.emit(TrackEvent {
            kind: EventKind::View,
            popover_id: self.handle.popover_id,
            duration: None,
        });
        true
    }

    /// Every trigger closes the same way; only the first one has any effect.
    pub fn close(&mut self, _trigger: CloseTrigger, now: Instant) -> bool {
        let opened_at = match self.state {
            OverlayState::Open { opened_at } => opened_at,
            _ => return false,
        };
        self.state = OverlayState::Dismissed;

        let duration = now.saturating_duration_since(opened_at).as_secs_f64();
        self.sink.emit(TrackEvent {
            kind: EventKind::Close,
            popover_id: self.handle.popover_id,
            duration: Some(duration),
        });

        self.page.remove_overlay();
        self.page.unlock_scroll();

        let secure = self.page.is_https();
        if let Some(cookie) =
            DismissalCookie::new(self.handle.popover_id, self.handle.cookie_days, secure)
        {
            self.page.write_cookie(&cookie);
        }
        true
    }

    /// Clicks on the popup itself never close it.
    pub fn on_pointer(&mut self, target: PointerTarget, now: Instant) -> bool {
        match target {
            PointerTarget::Backdrop => self.close(CloseTrigger::Backdrop, now),
            PointerTarget::Content => false,
        }
    }

    pub fn on_key(&mut self, key: &str, now: Instant) -> bool {
        match key {
            "Escape" | "Esc" => self.close(CloseTrigger::EscapeKey, now),
            _ => false,
        }
    }

    pub fn on_key_code(&mut self, code: u32, now: Instant) -> bool {
        if code == 27 {
            self.close(CloseTrigger::EscapeKey, now)
        } else {
            false
        }
    }
}
