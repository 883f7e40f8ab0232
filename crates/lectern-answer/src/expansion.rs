//! Deterministic query expansion.
//!
//! A fixed phrase-to-terms table bridges the vocabulary gap between how
//! students ask and how course material is written. The first matching rule
//! appends its terms to the original query; exactly one rule applies per
//! query, and the original text is never replaced.

struct Rule {
    trigger: &'static str,
    terms: &'static str,
    /// Short abbreviations match whole words only, so "fp" never fires
    /// inside "helpful".
    word_bounded: bool,
}

const RULES: &[Rule] = &[
    // Functional programming concepts
    Rule {
        trigger: "functional programming",
        terms: "functional programming FP paradigm lambda calculus pure functions immutable first-class functions higher-order",
        word_bounded: false,
    },
    Rule {
        trigger: "fp",
        terms: "functional programming FP paradigm lambda calculus pure functions immutable",
        word_bounded: true,
    },
    Rule {
        trigger: "lambda calculus",
        terms: "lambda calculus anonymous function closure abstraction application",
        word_bounded: false,
    },
    Rule {
        trigger: "anonymous function",
        terms: "anonymous function lambda function closure",
        word_bounded: false,
    },
    Rule {
        trigger: "pure function",
        terms: "pure function side effect deterministic referential transparency",
        word_bounded: false,
    },
    Rule {
        trigger: "immutability",
        terms: "immutability immutable persistent data structure",
        word_bounded: false,
    },
    Rule {
        trigger: "higher-order",
        terms: "higher-order function map reduce filter fold",
        word_bounded: false,
    },
    // Type systems
    Rule {
        trigger: "type system",
        terms: "type system type checking static typing dynamic typing type inference",
        word_bounded: false,
    },
    Rule {
        trigger: "type checking",
        terms: "type checking type inference static analysis type safety",
        word_bounded: false,
    },
    Rule {
        trigger: "type inference",
        terms: "type inference Hindley-Milner algorithm W unification",
        word_bounded: false,
    },
    // Language concepts
    Rule {
        trigger: "syntax",
        terms: "syntax grammar abstract syntax tree AST parser",
        word_bounded: false,
    },
    Rule {
        trigger: "semantics",
        terms: "semantics operational denotational evaluation",
        word_bounded: false,
    },
    Rule {
        trigger: "evaluation",
        terms: "evaluation reduction substitution beta reduction",
        word_bounded: false,
    },
    Rule {
        trigger: "interpreter",
        terms: "interpreter evaluation execution abstract machine",
        word_bounded: false,
    },
    Rule {
        trigger: "abstract machine",
        terms: "abstract machine operational semantics small-step big-step",
        word_bounded: false,
    },
    // Course logistics
    Rule {
        trigger: "lecture",
        terms: "lecture video transcript course material",
        word_bounded: false,
    },
    Rule {
        trigger: "assignment",
        terms: "assignment homework exercise problem set",
        word_bounded: false,
    },
    Rule {
        trigger: "grading",
        terms: "grading policy rubric evaluation criteria",
        word_bounded: false,
    },
];

/// Append the first matching rule's terms to the query. Queries that match
/// nothing come back unchanged.
pub fn expand_query(query: &str) -> String {
    let lower = query.to_lowercase();
    for rule in RULES {
        let hit = if rule.word_bounded {
            word_bounded_match(&lower, rule.trigger)
        } else {
            lower.contains(rule.trigger)
        };
        if hit {
            tracing::debug!(trigger = rule.trigger, "query expansion applied");
            return format!("{query} {}", rule.terms);
        }
    }
    query.to_string()
}

fn word_bounded_match(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(at, _)| {
        let before_ok =
            !haystack[..at].chars().next_back().is_some_and(char::is_alphanumeric);
        let after_ok = !haystack[at + needle.len()..]
            .chars()
            .next()
            .is_some_and(char::is_alphanumeric);
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_queries_keep_their_original_text() {
        let expanded = expand_query("What is functional programming?");
        assert!(expanded.starts_with("What is functional programming?"));
        assert!(expanded.contains("lambda calculus"));
        assert!(expanded.contains("higher-order"));
    }

    #[test]
    fn abbreviations_only_match_whole_words() {
        assert!(expand_query("explain fp to me").contains("paradigm"));
        assert_eq!(expand_query("that was helpful"), "that was helpful");
    }

    #[test]
    fn only_the_first_matching_rule_applies() {
        // Both "functional programming" and "type system" occur; the table
        // order makes the functional programming rule win alone.
        let expanded = expand_query("functional programming in a type system");
        assert!(expanded.contains("pure functions"));
        assert!(!expanded.contains("static typing"));
    }

    #[test]
    fn unmatched_queries_are_unchanged() {
        assert_eq!(expand_query("when are office hours"), "when are office hours");
    }

    #[test]
    fn expansion_is_deterministic() {
        let a = expand_query("lambda calculus basics");
        let b = expand_query("lambda calculus basics");
        assert_eq!(a, b);
    }
}
