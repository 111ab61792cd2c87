use std::sync::Arc;

use crate::config::Config;
use crate::error::AppResult;
use crate::services::{Pipeline, PipelineBuilder, WorkerPool};

/// Shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
    pub pool: WorkerPool,
}

impl AppState {
    /// Production wiring: real extractor, OCR tools, Gemini and soffice.
    pub fn from_config(config: Config) -> AppResult<Self> {
        let pipeline = PipelineBuilder::new(config.clone()).build()?;
        Ok(Self::new(config, pipeline))
    }

    pub fn new(config: Config, pipeline: Pipeline) -> Self {
        let pool = WorkerPool::new(config.max_concurrent_requests);
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            pool,
        }
    }
}
