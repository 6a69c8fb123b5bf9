use std::path::PathBuf;

use thiserror::Error;

use crate::engine::llm_client::CompletionError;

/// Why a story step produced nothing.
///
/// Unusable choice output is not an error: it degrades to
/// [`ChoiceSet::fallback`](crate::model::choice::ChoiceSet::fallback).
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("image not found: {}", path.display())]
    ResourceNotFound { path: PathBuf },

    #[error("model backend failed: {0}")]
    Upstream(#[from] CompletionError),
}
