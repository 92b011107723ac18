use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::DbPool;

pub const DEFAULT_PRIORITY: i64 = 10;
pub const MAX_PRIORITY: i64 = 999;
pub const DEFAULT_COOKIE_DAYS: i64 = 7;
pub const MAX_COOKIE_DAYS: i64 = 365;
pub const DEFAULT_WIDTH: &str = "900px";
pub const DEFAULT_MAX_HEIGHT: &str = "600px";

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

// ── Enumerations ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayLocation {
    All,
    Homepage,
    Pages,
    Posts,
}

impl DisplayLocation {
    /// Unknown or empty values fall back to `All`.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "homepage" => DisplayLocation::Homepage,
            "pages" => DisplayLocation::Pages,
            "posts" => DisplayLocation::Posts,
            _ => DisplayLocation::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayLocation::All => "all",
            DisplayLocation::Homepage => "homepage",
            DisplayLocation::Pages => "pages",
            DisplayLocation::Posts => "posts",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormProvider {
    GoogleForms,
}

impl FormProvider {
    pub fn parse(_s: &str) -> Self {
        FormProvider::GoogleForms
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormProvider::GoogleForms => "google_forms",
        }
    }
}

/// Editorial status. Only `Publish` is ever shown to visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Publish,
    Draft,
    Pending,
}

impl PostStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "publish" => Some(PostStatus::Publish),
            "draft" => Some(PostStatus::Draft),
            "pending" => Some(PostStatus::Pending),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Publish => "publish",
            PostStatus::Draft => "draft",
            PostStatus::Pending => "pending",
        }
    }
}

/// Where a popover sits in its schedule relative to now. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Scheduled,
    Active,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    Both,
    FormOnly,
    ImageOnly,
    Empty,
}

impl Layout {
    pub fn css_class(&self) -> &'static str {
        match self {
            Layout::Both => "popm-layout-both",
            Layout::FormOnly => "popm-layout-form-only",
            Layout::ImageOnly => "popm-layout-image-only",
            Layout::Empty => "popm-layout-empty",
        }
    }
}

/// Server-owned engagement counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Views,
    Dismissals,
    Engaged,
    Bounced,
}

impl Counter {
    fn column(&self) -> &'static str {
        match self {
            Counter::Views => "views",
            Counter::Dismissals => "dismissals",
            Counter::Engaged => "engaged",
            Counter::Bounced => "bounced",
        }
    }
}

// ── Records ────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Popover {
    pub id: i64,
    pub title: String,
    pub featured_image: Option<String>,
    pub form_provider: FormProvider,
    pub form_url: String,
    pub display_location: DisplayLocation,
    pub priority: i64,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub width: String,
    pub max_height: String,
    pub cookie_days: i64,
    pub status: PostStatus,
    pub views: i64,
    pub dismissals: i64,
    pub engaged: i64,
    pub bounced: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Editor input as posted. Every field is optional; absent fields keep their
/// current value on update and their default on create.
#[derive(Debug, Default, Deserialize)]
pub struct PopoverForm {
    pub title: Option<String>,
    pub featured_image: Option<String>,
    pub form_provider: Option<String>,
    pub form_url: Option<String>,
    pub display_location: Option<String>,
    pub priority: Option<Value>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub width: Option<String>,
    pub max_height: Option<String>,
    pub cookie_days: Option<Value>,
    pub status: Option<String>,
}

/// Validated, clamped field set ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct PopoverFields {
    pub title: String,
    pub featured_image: Option<String>,
    pub form_provider: FormProvider,
    pub form_url: String,
    pub display_location: DisplayLocation,
    pub priority: i64,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub width: String,
    pub max_height: String,
    pub cookie_days: i64,
    pub status: PostStatus,
}

impl Default for PopoverFields {
    fn default() -> Self {
        PopoverFields {
            title: String::new(),
            featured_image: None,
            form_provider: FormProvider::GoogleForms,
            form_url: String::new(),
            display_location: DisplayLocation::All,
            priority: DEFAULT_PRIORITY,
            start_date: None,
            end_date: None,
            width: DEFAULT_WIDTH.to_string(),
            max_height: DEFAULT_MAX_HEIGHT.to_string(),
            cookie_days: DEFAULT_COOKIE_DAYS,
            status: PostStatus::Draft,
        }
    }
}

impl PopoverFields {
    /// Merge editor input over `base`, sanitizing and clamping every field
    /// that was posted.
    pub fn merge(base: &PopoverFields, form: &PopoverForm) -> PopoverFields {
        let mut fields = base.clone();

        if let Some(title) = &form.title {
            fields.title = title.trim().to_string();
        }
        if let Some(image) = &form.featured_image {
            let image = image.trim();
            fields.featured_image = (!image.is_empty()).then(|| image.to_string());
        }
        if let Some(provider) = &form.form_provider {
            fields.form_provider = FormProvider::parse(provider);
        }
        if let Some(form_url) = &form.form_url {
            fields.form_url = sanitize_url(form_url);
        }
        if let Some(location) = &form.display_location {
            fields.display_location = DisplayLocation::parse(location);
        }
        if let Some(priority) = &form.priority {
            fields.priority = clamp_priority(intval(priority));
        }
        if let Some(start) = &form.start_date {
            fields.start_date = parse_date(start);
        }
        if let Some(end) = &form.end_date {
            fields.end_date = parse_date(end);
        }
        if let Some(width) = &form.width {
            fields.width = sanitize_length(width, DEFAULT_WIDTH);
        }
        if let Some(max_height) = &form.max_height {
            fields.max_height = sanitize_length(max_height, DEFAULT_MAX_HEIGHT);
        }
        if let Some(days) = &form.cookie_days {
            fields.cookie_days = clamp_cookie_days(intval(days));
        }
        if let Some(status) = form.status.as_deref().and_then(PostStatus::parse) {
            fields.status = status;
        }

        fields
    }

    pub fn has_invalid_range(&self) -> bool {
        invalid_range(self.start_date, self.end_date)
    }
}

// ── Input normalization ────────────────────────────────

pub fn clamp_priority(priority: i64) -> i64 {
    priority.clamp(0, MAX_PRIORITY)
}

pub fn clamp_cookie_days(days: i64) -> i64 {
    days.clamp(0, MAX_COOKIE_DAYS)
}

/// Lenient integer read: numbers truncate, strings use their leading integer
/// part, anything else is 0.
pub fn intval(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => intval_str(s),
        Value::Bool(b) => *b as i64,
        _ => 0,
    }
}

/// Leading integer part of a string; 0 when there is none.
pub fn intval_str(s: &str) -> i64 {
    let s = s.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse::<i64>() {
        Ok(n) => sign * n,
        // Overflowing digit runs saturate
        Err(_) if end > 0 => if sign < 0 { i64::MIN } else { i64::MAX },
        Err(_) => 0,
    }
}

/// Empty input clears the date; unparseable input is treated as empty.
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn sanitize_url(raw: &str) -> String {
    let raw = raw.trim();
    match url::Url::parse(raw) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => u.to_string(),
        _ => String::new(),
    }
}

fn sanitize_length(raw: &str, default: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '%')
        .collect();
    if cleaned.is_empty() {
        default.to_string()
    } else {
        cleaned
    }
}

pub fn invalid_range(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> bool {
    matches!((start, end), (Some(s), Some(e)) if e < s)
}

// ── Candidate query ────────────────────────────────────

/// Parameters for fetching display candidates. Query hooks may rewrite these
/// before the store runs them.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    pub status: PostStatus,
    pub limit: Option<i64>,
    pub include_ids: Option<Vec<i64>>,
    pub exclude_ids: Vec<i64>,
}

impl Default for CandidateQuery {
    fn default() -> Self {
        CandidateQuery {
            status: PostStatus::Publish,
            limit: None,
            include_ids: None,
            exclude_ids: Vec::new(),
        }
    }
}

// ── Persistence ────────────────────────────────────────

impl Popover {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let provider: String = row.get("form_provider")?;
        let location: String = row.get("display_location")?;
        let status: String = row.get("status")?;
        Ok(Popover {
            id: row.get("id")?,
            title: row.get("title")?,
            featured_image: row.get("featured_image")?,
            form_provider: FormProvider::parse(&provider),
            form_url: row.get::<_, Option<String>>("form_url")?.unwrap_or_default(),
            display_location: DisplayLocation::parse(&location),
            priority: row.get("priority")?,
            start_date: row.get("start_date")?,
            end_date: row.get("end_date")?,
            width: row.get("width")?,
            max_height: row.get("max_height")?,
            cookie_days: row.get("cookie_days")?,
            status: PostStatus::parse(&status).unwrap_or(PostStatus::Draft),
            views: row.get("views")?,
            dismissals: row.get("dismissals")?,
            engaged: row.get("engaged")?,
            bounced: row.get("bounced")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn fields(&self) -> PopoverFields {
        PopoverFields {
            title: self.title.clone(),
            featured_image: self.featured_image.clone(),
            form_provider: self.form_provider,
            form_url: self.form_url.clone(),
            display_location: self.display_location,
            priority: self.priority,
            start_date: self.start_date,
            end_date: self.end_date,
            width: self.width.clone(),
            max_height: self.max_height.clone(),
            cookie_days: self.cookie_days,
            status: self.status,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Publish
    }

    pub fn has_invalid_range(&self) -> bool {
        invalid_range(self.start_date, self.end_date)
    }

    pub fn schedule_status(&self, now: NaiveDateTime) -> ScheduleStatus {
        match (self.start_date, self.end_date) {
            (Some(start), _) if start > now => ScheduleStatus::Scheduled,
            (_, Some(end)) if end < now => ScheduleStatus::Expired,
            _ => ScheduleStatus::Active,
        }
    }

    pub fn layout(&self) -> Layout {
        match (self.featured_image.is_some(), !self.form_url.is_empty()) {
            (true, true) => Layout::Both,
            (false, true) => Layout::FormOnly,
            (true, false) => Layout::ImageOnly,
            (false, false) => Layout::Empty,
        }
    }

    /// Legacy dismissals as a percentage of views, one decimal place.
    pub fn dismissal_rate(&self) -> f64 {
        if self.views <= 0 {
            return 0.0;
        }
        (self.dismissals as f64 / self.views as f64 * 1000.0).round() / 10.0
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        Self::lookup(pool, id).ok().flatten()
    }

    /// Like `find_by_id`, but storage failures are reported rather than
    /// read as a missing row.
    pub fn lookup(pool: &DbPool, id: i64) -> Result<Option<Self>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.query_row(
            "SELECT * FROM popovers WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .optional()
        .map_err(|e| e.to_string())
    }

    pub fn list(pool: &DbPool, status: Option<PostStatus>, limit: i64, offset: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };

        let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status {
            Some(s) => (
                "SELECT * FROM popovers WHERE status = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
                    .to_string(),
                vec![Box::new(s.as_str()), Box::new(limit), Box::new(offset)],
            ),
            None => (
                "SELECT * FROM popovers ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2".to_string(),
                vec![Box::new(limit), Box::new(offset)],
            ),
        };

        let mut stmt = match conn.prepare(&sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        stmt.query_map(params_refs.as_slice(), Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count(pool: &DbPool, status: Option<PostStatus>) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        match status {
            Some(s) => conn
                .query_row(
                    "SELECT COUNT(*) FROM popovers WHERE status = ?1",
                    params![s.as_str()],
                    |row| row.get(0),
                )
                .unwrap_or(0),
            None => conn
                .query_row("SELECT COUNT(*) FROM popovers", [], |row| row.get(0))
                .unwrap_or(0),
        }
    }

    /// Display candidates in display order: priority, then newest first.
    pub fn candidates(pool: &DbPool, query: &CandidateQuery) -> Result<Vec<Self>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;

        let mut sql = String::from("SELECT * FROM popovers WHERE status = ?");
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(query.status.as_str())];

        if let Some(ids) = &query.include_ids {
            if ids.is_empty() {
                return Ok(vec![]);
            }
            sql.push_str(&format!(" AND id IN ({})", placeholders(ids.len())));
            params_vec.extend(ids.iter().map(|id| Box::new(*id) as Box<dyn rusqlite::types::ToSql>));
        }
        if !query.exclude_ids.is_empty() {
            sql.push_str(&format!(
                " AND id NOT IN ({})",
                placeholders(query.exclude_ids.len())
            ));
            params_vec.extend(
                query
                    .exclude_ids
                    .iter()
                    .map(|id| Box::new(*id) as Box<dyn rusqlite::types::ToSql>),
            );
        }

        sql.push_str(" ORDER BY priority DESC, created_at DESC, id DESC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            params_vec.push(Box::new(limit.max(0)));
        }

        let mut stmt = conn.prepare(&sql).map_err(|e| e.to_string())?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(params_refs.as_slice(), Self::from_row)
            .map_err(|e| e.to_string())?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn create(pool: &DbPool, fields: &PopoverFields) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;

        conn.execute(
            "INSERT INTO popovers (title, featured_image, form_provider, form_url, display_location,
             priority, start_date, end_date, width, max_height, cookie_days, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                fields.title,
                fields.featured_image,
                fields.form_provider.as_str(),
                fields.form_url,
                fields.display_location.as_str(),
                fields.priority,
                fields.start_date,
                fields.end_date,
                fields.width,
                fields.max_height,
                fields.cookie_days,
                fields.status.as_str(),
            ],
        )
        .map_err(|e| e.to_string())?;

        Ok(conn.last_insert_rowid())
    }

    /// Replaces the editable fields. Counters are never touched here.
    pub fn update(pool: &DbPool, id: i64, fields: &PopoverFields) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;

        let changed = conn
            .execute(
                "UPDATE popovers SET title=?1, featured_image=?2, form_provider=?3, form_url=?4,
                 display_location=?5, priority=?6, start_date=?7, end_date=?8, width=?9,
                 max_height=?10, cookie_days=?11, status=?12, updated_at=CURRENT_TIMESTAMP
                 WHERE id=?13",
                params![
                    fields.title,
                    fields.featured_image,
                    fields.form_provider.as_str(),
                    fields.form_url,
                    fields.display_location.as_str(),
                    fields.priority,
                    fields.start_date,
                    fields.end_date,
                    fields.width,
                    fields.max_height,
                    fields.cookie_days,
                    fields.status.as_str(),
                    id,
                ],
            )
            .map_err(|e| e.to_string())?;

        if changed == 0 {
            return Err(format!("Popover {} not found", id));
        }
        Ok(())
    }

    pub fn update_status(pool: &DbPool, id: i64, status: PostStatus) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE popovers SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![status.as_str(), id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err(format!("Popover {} not found", id));
        }
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM popovers WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Atomically bump one counter. Returns the new value, or `None` when no
    /// row matched (missing popover, or unpublished with `published_only`).
    pub fn increment(
        pool: &DbPool,
        id: i64,
        counter: Counter,
        published_only: bool,
    ) -> Result<Option<i64>, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let column = counter.column();
        let sql = if published_only {
            format!(
                "UPDATE popovers SET {col} = {col} + 1 WHERE id = ?1 AND status = 'publish' RETURNING {col}",
                col = column
            )
        } else {
            format!(
                "UPDATE popovers SET {col} = {col} + 1 WHERE id = ?1 RETURNING {col}",
                col = column
            )
        };
        conn.query_row(&sql, params![id], |row| row.get(0))
            .optional()
            .map_err(|e| e.to_string())
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
