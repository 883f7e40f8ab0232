//! Text normalization helpers used by ingestion and display code.

/// Collapse runs of spaces to one space and runs of blank lines to a single
/// paragraph break, trimming the result.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut spaces = 0usize;
    let mut newlines = 0usize;
    for c in text.chars() {
        match c {
            ' ' | '\t' => {
                spaces += 1;
            }
            '\n' => {
                newlines += 1;
                spaces = 0;
            }
            '\r' => {}
            _ => {
                if newlines > 0 {
                    out.push_str(if newlines >= 2 { "\n\n" } else { "\n" });
                    newlines = 0;
                    spaces = 0;
                }
                if spaces > 0 {
                    out.push(' ');
                    spaces = 0;
                }
                out.push(c);
            }
        }
    }
    out.trim().to_string()
}

/// Derive a readable title from a file name: strip the extension, replace
/// separators with spaces, capitalize each word.
pub fn title_from_filename(filename: &str) -> String {
    let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
    stem.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when
/// anything was cut. Always cuts on a character boundary.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_spaces_and_blank_lines() {
        let input = "a  b\n\n\n\nc   d\ne";
        assert_eq!(normalize_whitespace(input), "a b\n\nc d\ne");
    }

    #[test]
    fn normalization_trims_edges() {
        assert_eq!(normalize_whitespace("  hello \n"), "hello");
        assert_eq!(normalize_whitespace(""), "");
    }

    #[test]
    fn title_from_snake_and_kebab_names() {
        assert_eq!(title_from_filename("lecture_notes_01.md"), "Lecture Notes 01");
        assert_eq!(title_from_filename("intro-to-ml.pdf"), "Intro To Ml");
        assert_eq!(title_from_filename("syllabus"), "Syllabus");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long snippet here", 6), "a long...");
        // multi-byte characters must not be split
        let s = "héllo wörld";
        let cut = truncate(s, 4);
        assert!(cut.starts_with("héll"));
    }
}
