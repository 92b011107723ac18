use rocket::http::{Cookie, SameSite};

use crate::display::dismissal_cookie_name;
use crate::models::popover::clamp_cookie_days;

const SECONDS_PER_DAY: i64 = 86_400;

/// Flag that suppresses a popover for a number of days after the visitor
/// closes it. Scoped to the whole site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DismissalCookie {
    pub popover_id: i64,
    pub days: i64,
    pub secure: bool,
}

impl DismissalCookie {
    /// `None` when `days` is 0: the dismissal is not remembered.
    /// Longer lifetimes are capped at a year.
    pub fn new(popover_id: i64, days: i64, secure: bool) -> Option<Self> {
        let days = clamp_cookie_days(days);
        (days > 0).then_some(DismissalCookie {
            popover_id,
            days,
            secure,
        })
    }

    pub fn name(&self) -> String {
        dismissal_cookie_name(self.popover_id)
    }

    pub fn max_age_secs(&self) -> i64 {
        self.days * SECONDS_PER_DAY
    }

    pub fn to_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.name(), "1"))
            .path("/")
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(rocket::time::Duration::days(self.days))
            .build()
    }

    /// `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        self.to_cookie().to_string()
    }
}
