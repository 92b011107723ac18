use std::sync::Arc;

use chrono::Utc;
use rocket::form::Form;
use rocket::http::{CookieJar, Status};
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use crate::analytics::{self, TrackRequest};
use crate::display::{self, DisplayHooks, PageType, RequestContext, Surface};
use crate::render;
use crate::security::auth::site_is_secure;
use crate::security::nonce::{NonceKey, TRACKING_ACTION};
use crate::store::Store;

pub const TRACKING_PATH: &str = "/api/track";

// ── Popover selection ──────────────────────────────────

#[get("/popover?<page_type>&<surface>")]
pub fn popover_for_page(
    store: &State<Arc<dyn Store>>,
    hooks: &State<DisplayHooks>,
    cookies: &CookieJar<'_>,
    page_type: Option<&str>,
    surface: Option<&str>,
) -> Json<Value> {
    let mut ctx = RequestContext::new(PageType::parse(page_type.unwrap_or("")))
        .with_surface(Surface::parse(surface.unwrap_or("")));
    ctx.cookies.extend(cookies.iter().map(|c| c.name().to_string()));

    let store: &dyn Store = store.inner().as_ref();
    let now = Utc::now();

    let popover = match display::active_popover(store, hooks, &ctx, now.naive_utc()) {
        Some(p) => p,
        None => return Json(json!({ "popover": null })),
    };

    let nonce = match NonceKey::from_store(store) {
        Some(key) => key.create(TRACKING_ACTION, now.timestamp()),
        None => {
            log::warn!("No nonce secret configured; tracking calls will be rejected");
            String::new()
        }
    };

    Json(json!({
        "popover": {
            "id": popover.id,
            "cookie_days": popover.cookie_days,
            "nonce": nonce,
            "tracking_url": TRACKING_PATH,
            "secure_cookies": site_is_secure(store),
            "html": render::overlay_html(&popover),
        }
    }))
}

// ── Tracking ───────────────────────────────────────────

#[derive(Debug, FromForm)]
pub struct TrackForm {
    pub event: Option<String>,
    pub nonce: Option<String>,
    pub popover_id: Option<String>,
    pub duration: Option<String>,
}

#[post("/track", data = "<form>")]
pub fn track(store: &State<Arc<dyn Store>>, form: Form<TrackForm>) -> (Status, Json<Value>) {
    let store: &dyn Store = store.inner().as_ref();
    let form = form.into_inner();
    let req = TrackRequest {
        event: form.event,
        nonce: form.nonce,
        popover_id: form.popover_id,
        duration: form.duration,
    };

    let result = match NonceKey::from_store(store) {
        Some(key) => analytics::record_event(store, &key, Utc::now().timestamp(), &req),
        None => Err(analytics::TrackError::InvalidNonce),
    };

    match result {
        Ok(_) => (Status::Ok, Json(json!({ "success": true }))),
        Err(e) => (
            Status::from_code(e.status_code()).unwrap_or(Status::BadRequest),
            Json(json!({ "success": false, "data": e.to_string() })),
        ),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![popover_for_page, track]
}
