//! Interactive branching stories generated from images by a local LLM server.
//!
//! [`StoryEngine`] drives a session: it asks a vision model to describe an
//! image, has a text model open the story, offers the player choices and
//! continues from whichever one they pick.

pub mod config;
pub mod engine;
pub mod logging;
pub mod model;

pub use config::settings::{Backend, Settings};
pub use engine::error::StoryError;
pub use engine::llm_client::{CompletionClient, CompletionError, CompletionRequest, HttpCompletionClient};
pub use engine::story_engine::{ImageAnalysis, ModelSelection, StoryEngine, DEFAULT_CHOICE_COUNT};
pub use model::choice::{Choice, ChoiceSet};
pub use model::scene::{NarrativeContext, Scene};
