use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::popover::{Popover, PopoverFields, PopoverForm, PostStatus};
use crate::security::auth::AdminUser;
use crate::store::Store;

const LIST_LIMIT: i64 = 500;

/// Record plus the values derived from it for the editor.
fn popover_json(popover: &Popover, now: NaiveDateTime) -> Value {
    let mut value = serde_json::to_value(popover).unwrap_or_default();
    if let Some(obj) = value.as_object_mut() {
        obj.insert("schedule_status".into(), json!(popover.schedule_status(now)));
        obj.insert("invalid_range".into(), json!(popover.has_invalid_range()));
        obj.insert("dismissal_rate".into(), json!(popover.dismissal_rate()));
        obj.insert("layout".into(), json!(popover.layout()));
    }
    value
}

fn saved_response(store: &dyn Store, id: i64, fields: &PopoverFields, status: Status) -> (Status, Json<Value>) {
    let now = Utc::now().naive_utc();
    let popover = store.popover_find_by_id(id).map(|p| popover_json(&p, now));
    let notice = fields.has_invalid_range().then_some("invalid_dates");
    (
        status,
        Json(json!({ "success": true, "popover": popover, "notice": notice })),
    )
}

fn failure(status: Status, message: impl Into<String>) -> (Status, Json<Value>) {
    (status, Json(json!({ "success": false, "error": message.into() })))
}

// ── Popovers ───────────────────────────────────────────

#[get("/popovers?<status>")]
pub fn popover_list(
    _admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    status: Option<&str>,
) -> Json<Value> {
    let status = status.and_then(PostStatus::parse);
    let now = Utc::now().naive_utc();
    let items: Vec<Value> = store
        .popover_list(status, LIST_LIMIT, 0)
        .iter()
        .map(|p| popover_json(p, now))
        .collect();

    Json(json!({
        "items": items,
        "total": store.popover_count(status),
        "count_publish": store.popover_count(Some(PostStatus::Publish)),
        "count_draft": store.popover_count(Some(PostStatus::Draft)),
        "count_pending": store.popover_count(Some(PostStatus::Pending)),
    }))
}

#[get("/popovers/<id>")]
pub fn popover_get(
    _admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    id: i64,
) -> (Status, Json<Value>) {
    match store.popover_find_by_id(id) {
        Some(p) => (
            Status::Ok,
            Json(json!({ "success": true, "popover": popover_json(&p, Utc::now().naive_utc()) })),
        ),
        None => failure(Status::NotFound, "Popover not found"),
    }
}

#[post("/popovers", format = "json", data = "<form>")]
pub fn popover_create(
    _admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    form: Json<PopoverForm>,
) -> (Status, Json<Value>) {
    let store: &dyn Store = store.inner().as_ref();
    let fields = PopoverFields::merge(&PopoverFields::default(), &form);

    match store.popover_create(&fields) {
        Ok(id) => {
            log::info!("Created popover {} ({})", id, fields.title);
            saved_response(store, id, &fields, Status::Created)
        }
        Err(e) => failure(Status::InternalServerError, e),
    }
}

#[put("/popovers/<id>", format = "json", data = "<form>")]
pub fn popover_update(
    _admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    id: i64,
    form: Json<PopoverForm>,
) -> (Status, Json<Value>) {
    let store: &dyn Store = store.inner().as_ref();
    let existing = match store.popover_find_by_id(id) {
        Some(p) => p,
        None => return failure(Status::NotFound, "Popover not found"),
    };
    let fields = PopoverFields::merge(&existing.fields(), &form);

    match store.popover_update(id, &fields) {
        Ok(()) => saved_response(store, id, &fields, Status::Ok),
        Err(e) => failure(Status::InternalServerError, e),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

#[post("/popovers/<id>/status", format = "json", data = "<change>")]
pub fn popover_set_status(
    _admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    id: i64,
    change: Json<StatusChange>,
) -> (Status, Json<Value>) {
    let status = match PostStatus::parse(&change.status) {
        Some(s) => s,
        None => return failure(Status::BadRequest, "Unknown status"),
    };
    if store.popover_find_by_id(id).is_none() {
        return failure(Status::NotFound, "Popover not found");
    }
    match store.popover_update_status(id, status) {
        Ok(()) => (Status::Ok, Json(json!({ "success": true, "status": status }))),
        Err(e) => failure(Status::InternalServerError, e),
    }
}

#[delete("/popovers/<id>")]
pub fn popover_delete(
    _admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    id: i64,
) -> (Status, Json<Value>) {
    if store.popover_find_by_id(id).is_none() {
        return failure(Status::NotFound, "Popover not found");
    }
    match store.popover_delete(id) {
        Ok(()) => {
            log::info!("Deleted popover {}", id);
            (Status::Ok, Json(json!({ "success": true })))
        }
        Err(e) => failure(Status::InternalServerError, e),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        popover_list,
        popover_get,
        popover_create,
        popover_update,
        popover_set_status,
        popover_delete,
    ]
}
