use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::model::choice::{Choice, ChoiceSet};

const FENCE: &str = "```";

/// Decode the choices an LLM produced into a [`ChoiceSet`].
///
/// Tries, in order: fenced blocks tagged `json`, any fenced block, the whole
/// text. If none of them holds a non-empty object of choices the generic
/// fallback set is returned instead, so the result is never empty.
pub fn parse_choices(raw: &str) -> ChoiceSet {
    let blocks = fenced_blocks(raw);

    let parsed = labeled_json_block(&blocks)
        .or_else(|| any_fenced_block(&blocks))
        .or_else(|| decode_choices(raw));

    match parsed {
        Some(set) => {
            debug!(choices = set.len(), "decoded choices from model output");
            set
        }
        None => {
            warn!(
                response_len = raw.len(),
                "model output held no usable choices, using fallback set"
            );
            ChoiceSet::fallback()
        }
    }
}

fn labeled_json_block(blocks: &[FencedBlock<'_>]) -> Option<ChoiceSet> {
    blocks
        .iter()
        .filter(|block| block.tag.eq_ignore_ascii_case("json"))
        .find_map(|block| decode_choices(block.body))
}

fn any_fenced_block(blocks: &[FencedBlock<'_>]) -> Option<ChoiceSet> {
    blocks.iter().find_map(|block| decode_choices(block.body))
}

#[derive(Debug, PartialEq)]
struct FencedBlock<'a> {
    tag: &'a str,
    body: &'a str,
}

/// Every ``` block in `text`. A fence that is never closed runs to the end
/// of the text.
fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let Some(close) = after_open.find(FENCE) else {
            let (tag, body) = split_tag(after_open);
            blocks.push(FencedBlock { tag, body });
            break;
        };

        let (tag, body) = split_tag(&after_open[..close]);
        blocks.push(FencedBlock { tag, body });

        rest = &after_open[close + FENCE.len()..];
    }

    blocks
}

/// Splits the info string (`json`, `JSON`, `js`, ...) off the block body.
fn split_tag(inner: &str) -> (&str, &str) {
    let trimmed = inner.trim_start_matches(|c: char| c == ' ' || c == '\t');
    let tag_len = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.')))
        .unwrap_or(trimmed.len());
    trimmed.split_at(tag_len)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChoice {
    Action(String),
    Record {
        action: String,
        #[serde(default, deserialize_with = "string_or_nothing")]
        hint: Option<String>,
    },
}

/// Hints are optional extras: a hint that is not a string is dropped.
fn string_or_nothing<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(hint)) => Some(hint),
        _ => None,
    })
}

impl RawChoice {
    fn into_choice(self) -> Option<Choice> {
        let (action, hint) = match self {
            RawChoice::Action(action) => (action, None),
            RawChoice::Record { action, hint } => (action, hint),
        };

        let action = action.trim();
        if action.is_empty() {
            return None;
        }

        Some(match hint.as_deref().map(str::trim) {
            Some(hint) if !hint.is_empty() => Choice::hinted(action, hint),
            _ => Choice::plain(action),
        })
    }
}

fn decode_choices(candidate: &str) -> Option<ChoiceSet> {
    let object: Map<String, Value> = serde_json::from_str(candidate.trim()).ok()?;

    let entries = object
        .into_iter()
        .map(|(key, value)| {
            let raw: RawChoice = serde_json::from_value(value).ok()?;
            Some((key, raw.into_choice()?))
        })
        .collect::<Option<Vec<_>>>()?;

    ChoiceSet::from_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"{
        "choice1": {"action": "Investigate the glowing crystal", "hint": "might reveal magic"},
        "choice2": {"action": "Follow the shadowy figure", "hint": "could be dangerous"},
        "choice3": {"action": "Read the ancient book", "hint": "knowledge awaits"}
    }"#;

    fn assert_well_formed(set: &ChoiceSet) {
        assert!(!set.is_fallback());
        let entries: Vec<_> = set.iter().collect();
        assert_eq!(
            entries,
            vec![
                (
                    "choice1",
                    &Choice::hinted("Investigate the glowing crystal", "might reveal magic")
                ),
                (
                    "choice2",
                    &Choice::hinted("Follow the shadowy figure", "could be dangerous")
                ),
                (
                    "choice3",
                    &Choice::hinted("Read the ancient book", "knowledge awaits")
                ),
            ]
        );
    }

    #[test]
    fn parses_bare_json_object() {
        assert_well_formed(&parse_choices(WELL_FORMED));
    }

    #[test]
    fn parses_json_tagged_fence() {
        let raw = format!("Here are your options:\n```json\n{WELL_FORMED}\n```\nEnjoy!");
        assert_well_formed(&parse_choices(&raw));
    }

    #[test]
    fn parses_fence_without_tag_and_with_other_tags() {
        for opening in ["```\n", "```JSON\n", "```javascript\n", "``` json\n"] {
            let raw = format!("Sure.\n{opening}{WELL_FORMED}\n```");
            assert_well_formed(&parse_choices(&raw));
        }
    }

    #[test]
    fn prefers_json_tagged_block_over_earlier_plain_block() {
        let raw = format!(
            "```\n{{\"choice1\": \"Run\"}}\n```\nor rather\n```json\n{WELL_FORMED}\n```"
        );
        assert_well_formed(&parse_choices(&raw));
    }

    #[test]
    fn skips_prose_blocks_to_find_json() {
        let raw = format!("```text\nthinking...\n```\n```\n{WELL_FORMED}\n```");
        assert_well_formed(&parse_choices(&raw));
    }

    #[test]
    fn plain_strings_and_missing_hints_become_plain_choices() {
        let raw = r#"{"a": "Climb the tower", "b": {"action": "Swim"}, "c": {"action": "Wait", "hint": "  "}}"#;
        let set = parse_choices(raw);

        assert!(!set.is_fallback());
        assert_eq!(set.get("a"), Some(&Choice::plain("Climb the tower")));
        assert_eq!(set.get("b"), Some(&Choice::plain("Swim")));
        assert_eq!(set.get("c"), Some(&Choice::plain("Wait")));
    }

    #[test]
    fn malformed_inputs_fall_back_to_three_choices() {
        let inputs = [
            "",
            "   ",
            "not json at all",
            "```json\n{broken\n```",
            "```",
            "{}",
            "[]",
            "[\"Run\", \"Hide\"]",
            "42",
            "null",
            r#"{"choice1": 3}"#,
            r#"{"choice1": {"hint": "no action"}}"#,
            r#"{"choice1": {"action": ""}}"#,
            r#"{"choice1": ["nested"]}"#,
            "{\"choice1\": \"Run\"",
        ];

        for input in inputs {
            let set = parse_choices(input);
            assert!(set.is_fallback(), "expected fallback for {input:?}");
            assert_eq!(set.len(), 3, "input {input:?}");
            assert!(!set.is_empty());
        }
    }

    #[test]
    fn unterminated_fence_runs_to_end_of_text() {
        let raw = "Here you go:\n```json\n{\"choice1\": {\"action\": \"Open the door\", \"hint\": \"it creaks\"}, \"choice2\": \"Run\"}\n";
        let set = parse_choices(raw);

        assert!(!set.is_fallback());
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![
                ("choice1", &Choice::hinted("Open the door", "it creaks")),
                ("choice2", &Choice::plain("Run")),
            ]
        );

        let bare = parse_choices("```\n{\"choice1\": \"Run\"}");
        assert_eq!(bare.get("choice1"), Some(&Choice::plain("Run")));
    }

    #[test]
    fn non_string_hint_is_dropped_but_action_kept() {
        let set = parse_choices(r#"{"choice1": {"action": "Run", "hint": 5}, "choice2": {"action": "Hide", "hint": null}}"#);

        assert!(!set.is_fallback());
        assert_eq!(set.get("choice1"), Some(&Choice::plain("Run")));
        assert_eq!(set.get("choice2"), Some(&Choice::plain("Hide")));
    }

    #[test]
    fn fenced_blocks_reads_tags_and_bodies() {
        let blocks = fenced_blocks("a ```json\n{}\n``` b ```{\"x\":1}``` c ```open");
        assert_eq!(
            blocks,
            vec![
                FencedBlock {
                    tag: "json",
                    body: "\n{}\n"
                },
                FencedBlock {
                    tag: "",
                    body: "{\"x\":1}"
                },
                FencedBlock {
                    tag: "open",
                    body: ""
                },
            ]
        );
    }
}
