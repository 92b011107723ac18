use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::store::Store;

const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

// ── Admin API key guard ──

/// Guard: the request carries the configured admin API key.
/// An empty `admin_api_key` setting disables the admin API entirely.
pub struct AdminUser;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let store = match request.guard::<&State<Arc<dyn Store>>>().await.succeeded() {
            Some(s) => s,
            None => return Outcome::Forward(Status::InternalServerError),
        };

        let expected = store.setting_get_or("admin_api_key", "");
        if expected.is_empty() {
            return Outcome::Forward(Status::Forbidden);
        }

        match request.headers().get_one(ADMIN_KEY_HEADER) {
            Some(key) if key_matches(key.trim(), &expected) => Outcome::Success(AdminUser),
            _ => Outcome::Forward(Status::Unauthorized),
        }
    }
}

/// Compares digests so the comparison time does not depend on the key prefix.
fn key_matches(given: &str, expected: &str) -> bool {
    Sha256::digest(given.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// Whether cookies for this site should carry the `Secure` attribute.
/// Only the site URL scheme decides; browsers drop `Secure` cookies set over
/// plain HTTP.
pub fn site_is_secure(store: &dyn Store) -> bool {
    let site_url = store.setting_get_or("site_url", "");
    url::Url::parse(site_url.trim())
        .map(|u| u.scheme() == "https")
        .unwrap_or(false)
}
