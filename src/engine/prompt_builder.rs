/// Builds the prompts sent to the model.
/// Formatting only: no parsing, no networking, no story state.
pub struct PromptBuilder;

const IMAGE_ANALYSIS: &str = "\
Analyze this image and identify:
1. Main objects and characters present
2. Setting/environment description
3. Mood and atmosphere
4. Any text or symbols visible
5. Colors and lighting

Be specific and detailed. Format as JSON.
";

const QUICK_STORY: &str = "\
Look at this image and create a complete short story (3-4 paragraphs) based on what you see.

Your story should:
1. Describe the scene and setting from the image
2. Introduce a character or perspective
3. Create a brief narrative arc with beginning, middle, and end
4. Be engaging and immersive

Write the complete story, ready to be read.
";

/// Sample entries shown to the model in the choice format example.
const EXAMPLE_CHOICES: [(&str, &str); 3] = [
    ("Investigate the glowing crystal", "might reveal magic"),
    ("Follow the shadowy figure", "could be dangerous"),
    ("Read the ancient book", "knowledge awaits"),
];

impl PromptBuilder {
    /// Objective description of an attached image.
    pub fn image_analysis() -> String {
        IMAGE_ANALYSIS.to_string()
    }

    /// Story opening built from an image analysis.
    pub fn story_opening(analysis: &str) -> String {
        let mut prompt = String::new();

        prompt.push_str("Based on this image analysis: ");
        prompt.push_str(analysis.trim());
        prompt.push_str("\n\n");

        push_numbered(
            &mut prompt,
            "Create an engaging story introduction that:",
            &[
                "Sets up a mysterious or intriguing scenario",
                "Introduces a protagonist (can be the viewer)",
                "Hints at a larger adventure",
                "Ends with a moment requiring a decision",
            ],
        );
        prompt.push_str("\nMake it immersive and about 3-4 paragraphs.\n");

        prompt
    }

    /// Asks for `count` choices as a JSON object keyed `choice1..choiceN`.
    pub fn choices(context: &[&str], current_scene: &str, count: usize) -> String {
        let mut prompt = String::new();

        push_labeled(&mut prompt, "Story context", &context.join("\n"));
        push_labeled(&mut prompt, "Current scene", current_scene);
        prompt.push('\n');

        prompt.push_str(&format!("Generate {count} distinct choices for the player.\n"));
        push_numbered(
            &mut prompt,
            "Each choice should:",
            &[
                "Be meaningful and lead to different outcomes",
                "Be consistent with the story tone",
                "Offer different types of actions (explore, interact, observe)",
            ],
        );
        prompt.push('\n');

        let keys: Vec<String> = (1..=count).map(|i| format!("\"choice{i}\"")).collect();
        prompt.push_str(&format!(
            "Format as JSON with keys {} and their descriptions.\n",
            keys.join(", ")
        ));
        push_choice_example(&mut prompt, count);

        prompt
    }

    /// Next beat after the player picked `choice`.
    pub fn continuation(previous_scene: &str, choice: &str, context: &[&str]) -> String {
        let mut prompt = String::new();

        push_labeled(&mut prompt, "Previous scene", previous_scene);
        push_labeled(&mut prompt, "Player choice", choice);
        push_labeled(&mut prompt, "Story context", &context.join(" "));
        prompt.push('\n');

        prompt.push_str("Continue the story based on this choice.\n");
        push_numbered(
            &mut prompt,
            "Write 2-3 paragraphs that:",
            &[
                "Show the immediate consequence of the choice",
                "Introduce a new element or revelation",
                "End with another decision point",
            ],
        );
        prompt.push_str(
            "\nKeep the tone consistent and reference previous visual elements when relevant.\n",
        );

        prompt
    }

    /// Single-shot complete story straight from an attached image.
    pub fn quick_story() -> String {
        QUICK_STORY.to_string()
    }
}

fn push_labeled(prompt: &mut String, label: &str, text: &str) {
    prompt.push_str(label);
    prompt.push_str(": ");
    prompt.push_str(text.trim());
    prompt.push('\n');
}

fn push_numbered(prompt: &mut String, heading: &str, items: &[&str]) {
    prompt.push_str(heading);
    prompt.push('\n');
    for (i, item) in items.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, item));
    }
}

fn push_choice_example(prompt: &mut String, count: usize) {
    prompt.push_str("Example format:\n{\n");
    for i in 0..count {
        let (action, hint) = EXAMPLE_CHOICES[i % EXAMPLE_CHOICES.len()];
        let sep = if i + 1 < count { "," } else { "" };
        prompt.push_str(&format!(
            "    \"choice{}\": {{\"action\": \"{}\", \"hint\": \"{}\"}}{}\n",
            i + 1,
            action,
            hint,
            sep
        ));
    }
    prompt.push_str("}\n");
}
