use std::sync::Arc;

use crate::{
    config::Config, repositories::EmployeeDirectoryTrait,
    services::request_lifecycle::RequestLifecycleService,
};

/// Shared handler state. Everything is behind `Arc`, so cloning per request
/// is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lifecycle: RequestLifecycleService,
    pub directory: Arc<dyn EmployeeDirectoryTrait>,
}

impl AppState {
    pub fn new(
        config: Config,
        lifecycle: RequestLifecycleService,
        directory: Arc<dyn EmployeeDirectoryTrait>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            lifecycle,
            directory,
        }
    }
}
