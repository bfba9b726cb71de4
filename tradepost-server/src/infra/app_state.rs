use std::fmt;
use std::sync::Arc;

use crate::db::Database;
use crate::images::store::ImageStore;
use crate::infra::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub images: ImageStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, images: ImageStore, config: Config) -> Self {
        Self {
            db,
            images,
            config: Arc::new(config),
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
