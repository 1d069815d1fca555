use std::sync::Arc;

use crate::core::{clock::Clock, config::Settings};
use crate::services::grading::GradingEngine;
use crate::store::ExamStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn ExamStore>,
    clock: Arc<dyn Clock>,
    grading: GradingEngine,
}

impl AppState {
    pub(crate) fn new(settings: Settings, store: Arc<dyn ExamStore>, clock: Arc<dyn Clock>) -> Self {
        let grading = GradingEngine::from_settings(settings.exam());
        Self { inner: Arc::new(InnerState { settings, store, clock, grading }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &dyn ExamStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    pub(crate) fn grading(&self) -> &GradingEngine {
        &self.inner.grading
    }
}
