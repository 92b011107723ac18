//! Short-lived anti-forgery tokens for tracking calls.
//!
//! A token is bound to an action and to a time tick of half the configured
//! lifetime. It verifies during its own tick and the one after, so it lives
//! between half a lifetime and a full lifetime.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::store::Store;

type HmacSha256 = Hmac<Sha256>;

pub const TRACKING_ACTION: &str = "popm_tracking";

const DEFAULT_LIFETIME_HOURS: i64 = 24;
const TOKEN_BYTES: usize = 10;

/// Which tick a verified token was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceAge {
    Current,
    Previous,
}

pub struct NonceKey {
    secret: Vec<u8>,
    lifetime_secs: i64,
}

impl NonceKey {
    pub fn new(secret: impl AsRef<[u8]>, lifetime_hours: i64) -> Self {
        let hours = if lifetime_hours > 0 { lifetime_hours } else { DEFAULT_LIFETIME_HOURS };
        NonceKey {
            secret: secret.as_ref().to_vec(),
            lifetime_secs: hours * 3600,
        }
    }

    /// Key configured in settings. `None` when no secret has been seeded.
    pub fn from_store(store: &dyn Store) -> Option<Self> {
        let secret = store.setting_get("nonce_secret").filter(|s| !s.is_empty())?;
        Some(Self::new(secret, store.setting_get_i64("nonce_lifetime_hours")))
    }

    fn tick(&self, now: i64) -> i64 {
        let half = (self.lifetime_secs / 2).max(1);
        now.div_euclid(half) + i64::from(now.rem_euclid(half) > 0)
    }

    fn mac(&self, tick: i64, action: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(format!("{}|{}", tick, action).as_bytes());
        Some(mac)
    }

    /// Token for `action`, valid from `now` (unix seconds).
    pub fn create(&self, action: &str, now: i64) -> String {
        self.mac(self.tick(now), action)
            .map(|mac| hex::encode(&mac.finalize().into_bytes()[..TOKEN_BYTES]))
            .unwrap_or_default()
    }

    pub fn verify(&self, action: &str, token: &str, now: i64) -> Option<NonceAge> {
        let bytes = hex::decode(token.trim()).ok()?;
        if bytes.len() != TOKEN_BYTES {
            return None;
        }
        let tick = self.tick(now);
        for (age, t) in [(NonceAge::Current, tick), (NonceAge::Previous, tick - 1)] {
            if self.mac(t, action)?.verify_truncated_left(&bytes).is_ok() {
                return Some(age);
            }
        }
        None
    }
}
