#[macro_use]
extern crate rocket;

pub mod analytics;
pub mod boot;
pub mod db;
pub mod display;
pub mod models;
pub mod overlay;
pub mod render;
pub mod routes;
pub mod security;
pub mod store;


use std::sync::Arc;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket};
use serde_json::{json, Value};

use display::DisplayHooks;
use store::Store;

/// Selection depends on visitor cookies and tokens expire, so nothing under
/// the API prefixes may be cached.
pub struct NoCacheApi;

#[rocket::async_trait]
impl Fairing for NoCacheApi {
    fn info(&self) -> Info {
        Info { name: "No-Cache API Responses", kind: Kind::Response }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut rocket::Response<'r>) {
        let path = req.uri().path();
        if path.starts_with("/api") || path.starts_with("/admin") {
            res.set_header(Header::new("Cache-Control", "no-store, no-cache, must-revalidate, max-age=0"));
            res.set_header(Header::new("Pragma", "no-cache"));
        }
    }
}

fn error_body(status: u16, message: &str) -> Json<Value> {
    Json(json!({ "success": false, "status": status, "error": message }))
}

#[catch(401)]
fn unauthorized() -> Json<Value> {
    error_body(401, "Unauthorized")
}

#[catch(403)]
fn forbidden() -> Json<Value> {
    error_body(403, "Forbidden")
}

#[catch(404)]
fn not_found() -> Json<Value> {
    error_body(404, "Not found")
}

#[catch(422)]
fn unprocessable() -> Json<Value> {
    error_body(422, "Malformed request body")
}

#[catch(500)]
fn server_error() -> Json<Value> {
    error_body(500, "Internal server error")
}

/// Assemble the service around an already-migrated store.
pub fn build_rocket(store: Arc<dyn Store>, hooks: DisplayHooks) -> Rocket<Build> {
    rocket::build()
        .manage(store)
        .manage(hooks)
        .attach(NoCacheApi)
        .mount("/api", routes::api::routes())
        .mount("/admin/api", routes::admin_api::routes())
        .register(
            "/",
            catchers![unauthorized, forbidden, not_found, unprocessable, server_error],
        )
}
