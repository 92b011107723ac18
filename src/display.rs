//! Popover selection for a single page render.
//!
//! Candidates are published popovers in display order. Each one is checked for
//! location, schedule and dismissal, then offered to any registered veto
//! hooks. The first survivor is shown.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::NaiveDateTime;
use log::{debug, warn};

use crate::models::popover::{DisplayLocation, Popover};
use crate::store::Store;

pub use crate::models::popover::CandidateQuery;

pub const DISMISSAL_COOKIE_PREFIX: &str = "popm_dismissed_";

pub fn dismissal_cookie_name(popover_id: i64) -> String {
    format!("{}{}", DISMISSAL_COOKIE_PREFIX, popover_id)
}

// ── Request context ────────────────────────────────────

/// What kind of page is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// The site front page.
    FrontPage,
    /// A single static page other than the front page.
    Page,
    /// A single blog post.
    Post,
    /// Everything else: the blog index, archives, search, 404.
    Other,
}

impl PageType {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "front_page" => PageType::FrontPage,
            "page" => PageType::Page,
            "post" => PageType::Post,
            _ => PageType::Other,
        }
    }
}

/// Which surface the request is served on. Only `Public` ever shows a popover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Public,
    Admin,
    CustomizePreview,
    Login,
}

impl Surface {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "admin" => Surface::Admin,
            "preview" | "customize_preview" => Surface::CustomizePreview,
            "login" => Surface::Login,
            _ => Surface::Public,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub page_type: PageType,
    pub surface: Surface,
    /// Names of the cookies the visitor sent.
    pub cookies: HashSet<String>,
}

impl RequestContext {
    pub fn new(page_type: PageType) -> Self {
        RequestContext {
            page_type,
            surface: Surface::Public,
            cookies: HashSet::new(),
        }
    }

    pub fn with_surface(mut self, surface: Surface) -> Self {
        self.surface = surface;
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>) -> Self {
        self.cookies.insert(name.into());
        self
    }

    pub fn is_administrative(&self) -> bool {
        self.surface != Surface::Public
    }

    pub fn has_dismissed(&self, popover_id: i64) -> bool {
        self.cookies.contains(&dismissal_cookie_name(popover_id))
    }
}

// ── Extension hooks ────────────────────────────────────

/// Rewrites candidate query parameters before the store is asked.
pub trait QueryFilter: Send + Sync {
    fn filter_query(&self, query: CandidateQuery) -> CandidateQuery;
}

impl<F> QueryFilter for F
where
    F: Fn(CandidateQuery) -> CandidateQuery + Send + Sync,
{
    fn filter_query(&self, query: CandidateQuery) -> CandidateQuery {
        self(query)
    }
}

/// Gets the final say on an otherwise eligible popover.
pub trait DisplayVeto: Send + Sync {
    fn should_display(&self, popover: &Popover, ctx: &RequestContext) -> bool;
}

impl<F> DisplayVeto for F
where
    F: Fn(&Popover, &RequestContext) -> bool + Send + Sync,
{
    fn should_display(&self, popover: &Popover, ctx: &RequestContext) -> bool {
        self(popover, ctx)
    }
}

/// Registered hooks, applied in registration order.
#[derive(Default)]
pub struct DisplayHooks {
    query_filters: Vec<Box<dyn QueryFilter>>,
    vetoes: Vec<Box<dyn DisplayVeto>>,
}

impl DisplayHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_query_filter(mut self, filter: impl QueryFilter + 'static) -> Self {
        self.query_filters.push(Box::new(filter));
        self
    }

    pub fn add_veto(mut self, veto: impl DisplayVeto + 'static) -> Self {
        self.vetoes.push(Box::new(veto));
        self
    }

    pub fn apply_query(&self, query: CandidateQuery) -> CandidateQuery {
        self.query_filters
            .iter()
            .fold(query, |q, filter| filter.filter_query(q))
    }

    pub fn allows(&self, popover: &Popover, ctx: &RequestContext) -> bool {
        self.vetoes.iter().all(|v| v.should_display(popover, ctx))
    }
}

// ── Rules ──────────────────────────────────────────────

/// Total display order: higher priority first, then newer `created_at`,
/// then higher id.
pub fn display_order(a: &Popover, b: &Popover) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

pub fn location_matches(location: DisplayLocation, page_type: PageType) -> bool {
    match location {
        DisplayLocation::All => true,
        DisplayLocation::Homepage => page_type == PageType::FrontPage,
        DisplayLocation::Pages => page_type == PageType::Page,
        DisplayLocation::Posts => page_type == PageType::Post,
    }
}

/// Empty bounds are open. An inverted range is never valid.
pub fn date_range_valid(popover: &Popover, now: NaiveDateTime) -> bool {
    if matches!(popover.start_date, Some(start) if start > now) {
        return false;
    }
    if matches!(popover.end_date, Some(end) if end < now) {
        return false;
    }
    !popover.has_invalid_range()
}

/// Pick the popover to show from candidates already in display order.
pub fn select_popover<'a>(
    now: NaiveDateTime,
    ctx: &RequestContext,
    candidates: &'a [Popover],
    hooks: &DisplayHooks,
) -> Option<&'a Popover> {
    candidates.iter().find(|popover| {
        if !popover.is_published() {
            return false;
        }
        if !location_matches(popover.display_location, ctx.page_type) {
            debug!("popover {}: location {} does not match", popover.id, popover.display_location.as_str());
            return false;
        }
        if !date_range_valid(popover, now) {
            debug!("popover {}: outside its schedule", popover.id);
            return false;
        }
        if ctx.has_dismissed(popover.id) {
            debug!("popover {}: dismissed by visitor", popover.id);
            return false;
        }
        if !hooks.allows(popover, ctx) {
            debug!("popover {}: vetoed by display hook", popover.id);
            return false;
        }
        true
    })
}

/// Store-backed selection for the current request.
pub fn active_popover(
    store: &dyn Store,
    hooks: &DisplayHooks,
    ctx: &RequestContext,
    now: NaiveDateTime,
) -> Option<Popover> {
    if ctx.is_administrative() {
        return None;
    }

    let query = hooks.apply_query(CandidateQuery::default());
    let mut candidates = match store.popover_candidates(&query) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to load popover candidates: {}", e);
            return None;
        }
    };
    candidates.sort_by(display_order);

    select_popover(now, ctx, &candidates, hooks).cloned()
}
