use std::sync::Arc;

use popover_maker::display::DisplayHooks;
use popover_maker::store::sqlite::SqliteStore;
use popover_maker::store::Store;
use popover_maker::{boot, db};

#[rocket::launch]
fn rocket() -> _ {
    env_logger::init();

    // Boot check: verify/create directories
    boot::run();

    let pool = db::init_pool().expect("Failed to initialize database pool");
    let store = SqliteStore::new(pool);
    store.run_migrations().expect("Failed to run database migrations");
    store.seed_defaults().expect("Failed to seed default settings");

    if store.setting_get_or("admin_api_key", "").is_empty() {
        log::warn!("admin_api_key is empty; the admin API is disabled");
    }

    let store: Arc<dyn Store> = Arc::new(store);
    popover_maker::build_rocket(store, DisplayHooks::new())
}
