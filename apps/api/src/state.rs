use crate::queue::GenerationQueue;
use crate::repository::Repositories;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    /// Background generation queue; handlers only enqueue and poll.
    pub queue: GenerationQueue,
}
