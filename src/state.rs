use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::DataAccess;
use crate::schema::ApiRegistry;

/// Shared by every handler. The registry is complete before serving starts.
#[derive(Clone)]
pub struct AppState {
    pub access: Arc<DataAccess>,
    pub registry: Arc<ApiRegistry>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn max_page_size(&self) -> usize {
        self.config.query.max_page_size
    }
}
