use std::path::Path;

use tracing::{debug, info};

use crate::config::settings::Settings;
use crate::engine::choice_parser::parse_choices;
use crate::engine::error::StoryError;
use crate::engine::llm_client::{CompletionClient, CompletionError, CompletionRequest};
use crate::engine::prompt_builder::PromptBuilder;
use crate::model::choice::ChoiceSet;
use crate::model::scene::NarrativeContext;

/// Scenes of history shown to the model when asking for choices.
pub const CHOICE_CONTEXT_WINDOW: usize = 3;

/// Scenes of history shown to the model when continuing the story.
pub const CONTINUATION_CONTEXT_WINDOW: usize = 2;

pub const DEFAULT_CHOICE_COUNT: usize = 3;

/// Which model handles which kind of request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub vision: String,
    pub text: String,
}

impl From<&Settings> for ModelSelection {
    fn from(settings: &Settings) -> Self {
        Self {
            vision: settings.vision_model.clone(),
            text: settings.text_model.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAnalysis {
    /// Objective description from the vision model.
    pub analysis: String,
    /// Story opening written from that description.
    pub narrative: String,
}

/// Drives one story session against a completion backend.
///
/// Steps that fail leave the narrative context exactly as it was.
pub struct StoryEngine<C> {
    client: C,
    models: ModelSelection,
    context: NarrativeContext,
}

impl<C: CompletionClient> StoryEngine<C> {
    pub fn new(client: C, models: ModelSelection) -> Self {
        Self {
            client,
            models,
            context: NarrativeContext::new(),
        }
    }

    pub fn context(&self) -> &NarrativeContext {
        &self.context
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Describe the image, then write a story opening from that description.
    pub fn analyze_image(&mut self, image: &Path) -> Result<ImageAnalysis, StoryError> {
        ensure_image_exists(image)?;

        let request =
            CompletionRequest::user(&self.models.vision, PromptBuilder::image_analysis())
                .with_image(image);
        let analysis = self.client.complete(&request)?;
        debug!(len = analysis.len(), "image analysis received");

        let request = CompletionRequest::user(
            &self.models.text,
            PromptBuilder::story_opening(&analysis),
        );
        let narrative = self.client.complete(&request)?;

        let ordinal = self
            .context
            .append_scene(narrative.clone(), Some(image.to_path_buf()));
        info!(scene = ordinal, image = %image.display(), "story opening written");

        Ok(ImageAnalysis {
            analysis,
            narrative,
        })
    }

    /// Choices for the player at `current_scene`.
    ///
    /// Output the model formats badly yields the fallback set; only
    /// transport failures are errors.
    pub fn generate_choices(
        &self,
        current_scene: &str,
        count: usize,
    ) -> Result<ChoiceSet, StoryError> {
        let count = count.max(1);
        let context = self.context.recent_window(CHOICE_CONTEXT_WINDOW);
        let prompt = PromptBuilder::choices(&context, current_scene, count);

        // A blank reply is still a reply: it parses to the fallback set.
        let raw = match self
            .client
            .complete(&CompletionRequest::user(&self.models.text, prompt))
        {
            Err(CompletionError::EmptyResponse) => String::new(),
            other => other?,
        };

        let choices = parse_choices(&raw);
        info!(
            choices = choices.len(),
            fallback = choices.is_fallback(),
            "choices generated"
        );
        Ok(choices)
    }

    /// Write what happens after the player takes `choice`.
    pub fn continue_story(
        &mut self,
        choice: &str,
        previous_scene: &str,
    ) -> Result<String, StoryError> {
        let context = self.context.recent_window(CONTINUATION_CONTEXT_WINDOW);
        let prompt = PromptBuilder::continuation(previous_scene, choice, &context);

        let continuation = self
            .client
            .complete(&CompletionRequest::user(&self.models.text, prompt))?;

        let ordinal = self.context.append(continuation.clone());
        info!(scene = ordinal, "story continued");

        Ok(continuation)
    }

    /// One vision call that writes a complete short story from the image.
    pub fn quick_story(&mut self, image: &Path) -> Result<String, StoryError> {
        ensure_image_exists(image)?;

        let request = CompletionRequest::user(&self.models.vision, PromptBuilder::quick_story())
            .with_image(image);
        let story = self.client.complete(&request)?;

        let ordinal = self
            .context
            .append_scene(story.clone(), Some(image.to_path_buf()));
        info!(scene = ordinal, image = %image.display(), "quick story written");

        Ok(story)
    }
}

fn ensure_image_exists(image: &Path) -> Result<(), StoryError> {
    if image.is_file() {
        Ok(())
    } else {
        Err(StoryError::ResourceNotFound {
            path: image.to_path_buf(),
        })
    }
}
