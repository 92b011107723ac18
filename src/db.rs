use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rand::RngCore;
use rusqlite::params;

pub type DbPool = Pool<SqliteConnectionManager>;

pub const DB_PATH: &str = "website/db/popover.db";

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_pool() -> Result<DbPool, Box<dyn std::error::Error>> {
    init_pool_at(DB_PATH)
}

pub fn init_pool_at(path: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    let manager = SqliteConnectionManager::file(path)
        .with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
    let pool = Pool::builder().max_size(10).build(manager)?;

    // WAL lets tracking writes proceed while pages are being evaluated
    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        -- Popovers
        CREATE TABLE IF NOT EXISTS popovers (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            featured_image TEXT,
            form_provider TEXT NOT NULL DEFAULT 'google_forms',
            form_url TEXT NOT NULL DEFAULT '',
            display_location TEXT NOT NULL DEFAULT 'all',
            priority INTEGER NOT NULL DEFAULT 10,
            start_date DATETIME,
            end_date DATETIME,
            width TEXT NOT NULL DEFAULT '900px',
            max_height TEXT NOT NULL DEFAULT '600px',
            cookie_days INTEGER NOT NULL DEFAULT 7,
            status TEXT NOT NULL DEFAULT 'draft',
            views INTEGER NOT NULL DEFAULT 0,
            dismissals INTEGER NOT NULL DEFAULT 0,
            engaged INTEGER NOT NULL DEFAULT 0,
            bounced INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_popovers_display
            ON popovers(status, priority DESC, created_at DESC);

        -- Settings (key-value)
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        );
        ",
    )?;

    Ok(())
}

pub fn seed_defaults(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    let defaults = vec![
        // General
        ("site_url", "http://localhost:8000"),
        // Tracking tokens
        ("nonce_lifetime_hours", "24"),
        // Admin API (empty disables it)
        ("admin_api_key", ""),
    ];

    for (key, value) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }

    // Signing secret for tracking nonces, generated once per install
    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    conn.execute(
        "INSERT OR IGNORE INTO settings (key, value) VALUES ('nonce_secret', ?1)",
        params![hex::encode(secret)],
    )?;

    Ok(())
}
