use std::path::{Path, PathBuf};

use serde::Serialize;

/// One story beat produced by a single generation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scene {
    text: String,
    image: Option<PathBuf>,
    ordinal: usize,
}

impl Scene {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Image the scene was generated from, if any.
    pub fn image(&self) -> Option<&Path> {
        self.image.as_deref()
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

/// Append-only log of the scenes in one story session.
///
/// Prompts only ever see a short suffix of the log through
/// [`NarrativeContext::recent_window`].
#[derive(Debug, Default, Clone, Serialize)]
pub struct NarrativeContext {
    scenes: Vec<Scene>,
}

impl NarrativeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a scene and returns its ordinal.
    pub fn append(&mut self, text: impl Into<String>) -> usize {
        self.push(text.into(), None)
    }

    pub fn append_scene(&mut self, text: impl Into<String>, image: Option<PathBuf>) -> usize {
        self.push(text.into(), image)
    }

    fn push(&mut self, text: String, image: Option<PathBuf>) -> usize {
        let ordinal = self.scenes.len();
        self.scenes.push(Scene {
            text,
            image,
            ordinal,
        });
        ordinal
    }

    /// Up to the last `n` scene texts, oldest first.
    pub fn recent_window(&self, n: usize) -> Vec<&str> {
        let start = self.scenes.len().saturating_sub(n);
        self.scenes[start..].iter().map(Scene::text).collect()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn last(&self) -> Option<&Scene> {
        self.scenes.last()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
