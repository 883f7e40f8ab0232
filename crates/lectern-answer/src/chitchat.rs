//! Casual-conversation detection.
//!
//! An ordered, short-circuit cascade of independent predicates. Extending
//! the classifier means appending a predicate; retrieval logic is never
//! involved.

use regex::Regex;
use std::sync::LazyLock;

static PHRASE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // greetings
        r"^\s*(hi|hello|hey|sup|yo|good\s+morning|good\s+evening|good\s+afternoon|greetings)\s*[!.?]*\s*$",
        r"^\s*(hi|hello|hey)\s+(there|bot|assistant|ta)\s*[!.?]*\s*$",
        // farewells
        r"^\s*(bye|goodbye|see\s+you|see\s+ya|later|take\s+care|cya)\s*[!.?]*\s*$",
        // thanks
        r"^\s*(thanks?|thank\s+you|thx|ty|appreciate\s+it)\s*[!.?]*\s*$",
        // casual questions
        r"^\s*(how\s+are\s+you|what'?s\s+up|how'?s\s+it\s+going|how\s+are\s+things)\s*[?!.]*\s*$",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).expect("chitchat pattern compiles"))
    .collect()
});

const CASUAL_WORDS: [&str; 9] =
    ["hi", "hello", "hey", "bye", "thanks", "thx", "ty", "sup", "yo"];

fn empty(query: &str) -> bool {
    query.is_empty()
}

fn greeting_phrase(query: &str) -> bool {
    PHRASE_PATTERNS.iter().any(|p| p.is_match(query))
}

/// One to three words starting with a casual word, e.g. "hey quick question".
fn short_casual(query: &str) -> bool {
    let words: Vec<&str> = query.split_whitespace().collect();
    match words.first() {
        Some(first) if words.len() <= 3 => {
            CASUAL_WORDS.contains(&first.to_lowercase().as_str())
        }
        _ => false,
    }
}

/// Keyboard mashing like "aaaaaah" or "hahahaha".
fn repetitive(query: &str) -> bool {
    if query.len() <= 5 {
        return false;
    }
    let distinct: std::collections::HashSet<char> =
        query.to_lowercase().chars().filter(|c| *c != ' ').collect();
    distinct.len() <= 3
}

/// Mostly symbols or punctuation.
fn low_alphanumeric(query: &str) -> bool {
    let total = query.chars().count();
    if total == 0 {
        return false;
    }
    let alphanumeric = query.chars().filter(|c| c.is_alphanumeric()).count();
    (alphanumeric as f32) / (total as f32) < 0.5
}

const CLASSIFIERS: &[(&str, fn(&str) -> bool)] = &[
    ("empty", empty),
    ("phrase", greeting_phrase),
    ("short-casual", short_casual),
    ("repetitive", repetitive),
    ("gibberish", low_alphanumeric),
];

/// True when the query is casual conversation rather than a substantive
/// question, so retrieval can be skipped entirely.
pub fn is_chitchat(query: &str) -> bool {
    let trimmed = query.trim();
    for (rule, predicate) in CLASSIFIERS {
        if predicate(trimmed) {
            tracing::debug!(rule, "chitchat detected");
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greetings_and_farewells_are_chitchat() {
        for q in ["hello", "Hello!", "hey there", "good morning", "bye", "see you", "Thanks!"] {
            assert!(is_chitchat(q), "{q:?} should be chitchat");
        }
    }

    #[test]
    fn casual_check_ins_are_chitchat() {
        assert!(is_chitchat("how are you?"));
        assert!(is_chitchat("what's up"));
    }

    #[test]
    fn empty_input_is_chitchat() {
        assert!(is_chitchat(""));
        assert!(is_chitchat("   "));
    }

    #[test]
    fn repeated_characters_are_chitchat() {
        assert!(is_chitchat("aaaaaaa"));
        assert!(is_chitchat("hahahaha"));
    }

    #[test]
    fn symbol_noise_is_chitchat() {
        assert!(is_chitchat("???!!!###"));
    }

    #[test]
    fn substantive_questions_are_not_chitchat() {
        for q in [
            "What is the grading policy?",
            "Explain lambda calculus",
            "When is assignment two due",
            "cell mitochondria",
        ] {
            assert!(!is_chitchat(q), "{q:?} should not be chitchat");
        }
    }

    #[test]
    fn short_questions_without_casual_words_pass_through() {
        assert!(!is_chitchat("define recursion"));
    }
}
