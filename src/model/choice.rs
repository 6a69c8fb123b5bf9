use serde::{Deserialize, Serialize};

/// A single action the player can pick at a decision point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Choice {
    Plain { action: String },
    Hinted { action: String, hint: String },
}

impl Choice {
    pub fn plain(action: impl Into<String>) -> Self {
        Choice::Plain {
            action: action.into(),
        }
    }

    pub fn hinted(action: impl Into<String>, hint: impl Into<String>) -> Self {
        Choice::Hinted {
            action: action.into(),
            hint: hint.into(),
        }
    }

    pub fn action(&self) -> &str {
        match self {
            Choice::Plain { action } | Choice::Hinted { action, .. } => action,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            Choice::Plain { .. } => None,
            Choice::Hinted { hint, .. } => Some(hint),
        }
    }
}

/// Where a [`ChoiceSet`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceOrigin {
    Parsed,
    Fallback,
}

/// Ordered, keyed choices offered to the player.
///
/// Iteration order is insertion order and drives the numbering shown to the
/// player (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceSet {
    entries: Vec<(String, Choice)>,
    origin: ChoiceOrigin,
}

impl ChoiceSet {
    /// Builds a parsed set. Returns `None` when `entries` is empty or a key
    /// repeats.
    pub fn from_entries(entries: Vec<(String, Choice)>) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        for (i, (key, _)) in entries.iter().enumerate() {
            if entries[..i].iter().any(|(seen, _)| seen == key) {
                return None;
            }
        }
        Some(Self {
            entries,
            origin: ChoiceOrigin::Parsed,
        })
    }

    /// The generic set used whenever model output cannot be decoded.
    pub fn fallback() -> Self {
        Self {
            entries: vec![
                (
                    "choice1".into(),
                    Choice::hinted("Explore ahead", "discover the unknown"),
                ),
                (
                    "choice2".into(),
                    Choice::hinted("Examine the surroundings", "look for clues"),
                ),
                (
                    "choice3".into(),
                    Choice::hinted("Go back", "find another path"),
                ),
            ],
            origin: ChoiceOrigin::Fallback,
        }
    }

    pub fn origin(&self) -> ChoiceOrigin {
        self.origin
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == ChoiceOrigin::Fallback
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Choice> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, choice)| choice)
    }

    /// Looks up a choice by its displayed number, starting at 1.
    pub fn get_by_number(&self, number: usize) -> Option<&Choice> {
        number
            .checked_sub(1)
            .and_then(|idx| self.entries.get(idx))
            .map(|(_, choice)| choice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Choice)> {
        self.entries.iter().map(|(key, choice)| (key.as_str(), choice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_has_three_hinted_choices() {
        let set = ChoiceSet::fallback();
        assert!(set.is_fallback());
        assert_eq!(
            set.keys().collect::<Vec<_>>(),
            vec!["choice1", "choice2", "choice3"]
        );
        assert!(set.iter().all(|(_, c)| c.hint().is_some()));
    }

    #[test]
    fn from_entries_rejects_empty_and_duplicates() {
        assert!(ChoiceSet::from_entries(Vec::new()).is_none());

        let dup = vec![
            ("a".to_string(), Choice::plain("one")),
            ("a".to_string(), Choice::plain("two")),
        ];
        assert!(ChoiceSet::from_entries(dup).is_none());
    }

    #[test]
    fn numbering_starts_at_one() {
        let set = ChoiceSet::from_entries(vec![
            ("first".to_string(), Choice::plain("Open the door")),
            ("second".to_string(), Choice::hinted("Hide", "quietly")),
        ])
        .unwrap();

        assert!(set.get_by_number(0).is_none());
        assert_eq!(set.get_by_number(1).map(Choice::action), Some("Open the door"));
        assert_eq!(set.get_by_number(2).and_then(Choice::hint), Some("quietly"));
        assert!(set.get_by_number(3).is_none());
        assert_eq!(set.origin(), ChoiceOrigin::Parsed);
    }
}
