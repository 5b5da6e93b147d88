//! Shared Application State

use std::sync::Arc;
use tutor_core::tutor_service::TutorService;

/// Created once at startup and handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub tutor: Arc<dyn TutorService>,
}
