use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::cache::PageCache;
use crate::config::Config;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub index_cache: Arc<Mutex<PageCache>>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let ttl = std::time::Duration::from_secs(config.cache.index_ttl_secs);
        Self {
            db,
            config,
            index_cache: Arc::new(Mutex::new(PageCache::new(ttl))),
        }
    }
}
