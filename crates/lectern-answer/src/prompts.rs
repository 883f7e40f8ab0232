//! System prompts and prompt assembly for the answer modes.

use lectern_core::types::{ScoredSegment, Segment};

pub const SYSTEM_GROUNDED: &str = "You are a university Teaching Assistant chatbot. Answer using only the retrieved sources. If the answer is not in the sources, say you don't know. Quote key snippets and add citations like [Title, pp. x–y]. Be concise and precise.";

pub const SYSTEM_FALLBACK: &str = r#"You are a teaching assistant. You did not find any useful information in the course materials related to this question.

Answer using your general knowledge, but you MUST start your response with a clear disclaimer:

"⚠️ Note: I couldn't find relevant information in the uploaded course materials, so this answer is based on general knowledge and may not reflect your specific course policies or content. Please verify with your instructor or course materials."

Then provide a helpful answer based on general educational knowledge. Be concise and helpful."#;

pub const SYSTEM_CHITCHAT: &str = r#"You are a friendly and helpful university Teaching Assistant. The student is having a casual conversation with you (greeting, farewell, or thanks).

Respond warmly and naturally, and gently guide them toward asking questions about their course materials if appropriate.

Examples:
- "Hello! I'm your course assistant. How can I help you with your course materials today?"
- "You're welcome! Feel free to ask if you have any questions about the course."
- "Goodbye! Good luck with your studies!"

Be concise, friendly, and professional."#;

/// The prefix the fallback system prompt mandates; answers in fallback mode
/// are expected to start with it.
pub const FALLBACK_DISCLAIMER_PREFIX: &str =
    "⚠️ Note: I couldn't find relevant information in the uploaded course materials";

/// Canned reply when chitchat generation itself fails; chitchat always
/// produces an answer.
pub const CHITCHAT_RECOVERY: &str =
    "Hello! How can I help you with your course materials today?";

/// Location half of a context label: page span for paginated sources, the
/// file type otherwise.
pub fn location_label(segment: &Segment) -> String {
    match segment.source.pages {
        Some(span) if span.start == span.end => format!("p. {}", span.start),
        Some(span) => format!("pp. {}–{}", span.start, span.end),
        None => segment.file_type.as_str().to_uppercase(),
    }
}

/// Numbered context block: `[1] Title (p. 3):\n"text"`.
pub fn context_block(segments: &[ScoredSegment]) -> String {
    if segments.is_empty() {
        return "No relevant context found.".to_string();
    }
    segments
        .iter()
        .enumerate()
        .map(|(i, scored)| {
            let segment = &scored.segment;
            format!(
                "[{}] {} ({}):\n\"{}\"\n",
                i + 1,
                segment.title,
                location_label(segment),
                segment.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The grounded-mode user message: question, ranked context, then the
/// citation and honesty instructions.
pub fn grounded_prompt(question: &str, segments: &[ScoredSegment]) -> String {
    format!(
        r#"QUESTION:
{question}

TOP CONTEXT (ranked):
{context}

INSTRUCTIONS:
- Use only the provided context.
- When stating a fact, add a citation like [Title, pp. x–y].
- If context is insufficient, answer: "I don't know based on the provided materials."
- Start with a one-sentence direct answer, then briefly justify with 1–3 quotes."#,
        context = context_block(segments)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::types::{FileType, Origin, PageSpan, SourceRef};

    fn scored(title: &str, page: Option<u32>, text: &str) -> ScoredSegment {
        ScoredSegment {
            segment: Segment {
                id: "s".to_string(),
                text: text.to_string(),
                source: SourceRef {
                    source_id: "doc".to_string(),
                    pages: page.map(PageSpan::single),
                },
                title: title.to_string(),
                file_type: if page.is_some() { FileType::Pdf } else { FileType::Txt },
                course_id: None,
            },
            score: 0.8,
            origin: Origin::Vector,
        }
    }

    #[test]
    fn context_entries_are_numbered_and_located() {
        let block = context_block(&[
            scored("Biology 101", Some(3), "mitochondria things"),
            scored("Course Notes", None, "some notes"),
        ]);
        assert!(block.contains("[1] Biology 101 (p. 3):"));
        assert!(block.contains("[2] Course Notes (TXT):"));
        assert!(block.contains("\"mitochondria things\""));
    }

    #[test]
    fn grounded_prompt_carries_question_and_instructions() {
        let prompt = grounded_prompt("What is a cell?", &[scored("Bio", Some(1), "text")]);
        assert!(prompt.starts_with("QUESTION:\nWhat is a cell?"));
        assert!(prompt.contains("Use only the provided context."));
        assert!(prompt.contains("I don't know based on the provided materials."));
    }

    #[test]
    fn fallback_prompt_contains_its_own_disclaimer() {
        assert!(SYSTEM_FALLBACK.contains(FALLBACK_DISCLAIMER_PREFIX));
    }
}
