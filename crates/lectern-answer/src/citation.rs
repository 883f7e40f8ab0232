//! Citation derivation.
//!
//! Groups retrieved segments by source and merges contiguous page ranges
//! into display citations. Citations are derived per query and never
//! persisted.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use lectern_core::text::truncate;
use lectern_core::types::{FileType, PageSpan, ScoredSegment};

const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Citation {
    pub title: String,
    pub file_type: FileType,
    pub pages: Option<PageSpan>,
    pub snippet: String,
}

impl Citation {
    pub fn format(&self) -> String {
        match (self.file_type, self.pages) {
            (FileType::Pdf, Some(span)) if span.start == span.end => {
                format!("[{} (PDF), p. {}]", self.title, span.start)
            }
            (FileType::Pdf, Some(span)) => {
                format!("[{} (PDF), pp. {}–{}]", self.title, span.start, span.end)
            }
            (file_type, _) => format!("[{} ({})]", self.title, file_type.display_label()),
        }
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Merge retrieved segments into citations.
///
/// Paginated sources yield one citation per disjoint page range, ranges
/// sorted ascending and merged when they touch or overlap. Non-paginated
/// sources yield exactly one citation per `(title, file type)` no matter
/// how many segments matched. Group ordering is deterministic (by title,
/// then file type) but unrelated to retrieval rank.
pub fn merge(segments: &[ScoredSegment]) -> Vec<Citation> {
    let mut groups: BTreeMap<(String, FileType), Vec<&ScoredSegment>> = BTreeMap::new();
    for scored in segments {
        groups
            .entry((scored.segment.title.clone(), scored.segment.file_type))
            .or_default()
            .push(scored);
    }

    let mut citations = Vec::new();
    for ((title, file_type), members) in groups {
        let snippet = members
            .iter()
            .map(|s| truncate(&s.segment.text, SNIPPET_CHARS))
            .collect::<Vec<_>>()
            .join(" ... ");

        if file_type.is_paginated() {
            // Segments missing a span in a paginated source count as page 1.
            let mut ranges: Vec<(u32, u32)> = members
                .iter()
                .map(|s| match s.segment.source.pages {
                    Some(span) => (span.start, span.end),
                    None => (1, 1),
                })
                .collect();
            ranges.sort_unstable();
            for (start, end) in merge_ranges(ranges) {
                citations.push(Citation {
                    title: title.clone(),
                    file_type,
                    pages: Some(PageSpan::new(start, end)),
                    snippet: snippet.clone(),
                });
            }
        } else {
            citations.push(Citation { title, file_type, pages: None, snippet });
        }
    }
    citations
}

/// Collapse sorted inclusive ranges, joining neighbors that touch
/// (`next.start <= current.end + 1`).
fn merge_ranges(ranges: Vec<(u32, u32)>) -> Vec<(u32, u32)> {
    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        match merged.last_mut() {
            Some((_, current_end)) if start <= *current_end + 1 => {
                *current_end = (*current_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Human-readable, semicolon-joined citation list.
pub fn format_list(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return "No sources".to_string();
    }
    citations.iter().map(Citation::format).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::types::{Origin, Segment, SourceRef};

    fn scored(title: &str, file_type: FileType, pages: Option<(u32, u32)>, text: &str) -> ScoredSegment {
        ScoredSegment {
            segment: Segment {
                id: format!("{title}-{pages:?}"),
                text: text.to_string(),
                source: SourceRef {
                    source_id: format!("{title}.{}", file_type.as_str()),
                    pages: pages.map(|(s, e)| PageSpan::new(s, e)),
                },
                title: title.to_string(),
                file_type,
                course_id: None,
            },
            score: 0.7,
            origin: Origin::Vector,
        }
    }

    #[test]
    fn adjacent_pages_merge_into_one_range() {
        let citations = merge(&[
            scored("Biology 101", FileType::Pdf, Some((3, 3)), "a"),
            scored("Biology 101", FileType::Pdf, Some((4, 4)), "b"),
        ]);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].pages, Some(PageSpan::new(3, 4)));
        assert_eq!(citations[0].format(), "[Biology 101 (PDF), pp. 3–4]");
    }

    #[test]
    fn distant_pages_stay_separate_citations() {
        let citations = merge(&[
            scored("Biology 101", FileType::Pdf, Some((3, 3)), "a"),
            scored("Biology 101", FileType::Pdf, Some((7, 7)), "b"),
        ]);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].pages, Some(PageSpan::new(3, 3)));
        assert_eq!(citations[1].pages, Some(PageSpan::new(7, 7)));
    }

    #[test]
    fn overlapping_ranges_collapse() {
        let citations = merge(&[
            scored("Notes", FileType::Pdf, Some((2, 4)), "a"),
            scored("Notes", FileType::Pdf, Some((3, 5)), "b"),
            scored("Notes", FileType::Pdf, Some((9, 9)), "c"),
        ]);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].pages, Some(PageSpan::new(2, 5)));
        assert_eq!(citations[1].pages, Some(PageSpan::new(9, 9)));
    }

    #[test]
    fn ranges_come_out_sorted_regardless_of_input_order() {
        let citations = merge(&[
            scored("Doc", FileType::Pdf, Some((9, 9)), "late"),
            scored("Doc", FileType::Pdf, Some((2, 2)), "early"),
        ]);
        assert_eq!(citations[0].pages, Some(PageSpan::new(2, 2)));
        assert_eq!(citations[1].pages, Some(PageSpan::new(9, 9)));
    }

    #[test]
    fn non_paginated_sources_yield_one_citation_each() {
        let citations = merge(&[
            scored("Transcript 1", FileType::Srt, None, "first part"),
            scored("Transcript 1", FileType::Srt, None, "second part"),
            scored("Transcript 1", FileType::Srt, None, "third part"),
        ]);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].format(), "[Transcript 1 (Transcript)]");
        assert!(citations[0].snippet.contains(" ... "));
    }

    #[test]
    fn single_page_citation_formats_with_one_page() {
        let citations =
            merge(&[scored("Biology 101", FileType::Pdf, Some((1, 1)), "mito")]);
        assert_eq!(citations[0].format(), "[Biology 101 (PDF), p. 1]");
    }

    #[test]
    fn same_title_different_types_are_distinct_sources() {
        let citations = merge(&[
            scored("Week 1", FileType::Pdf, Some((1, 1)), "slides"),
            scored("Week 1", FileType::Srt, None, "spoken"),
        ]);
        assert_eq!(citations.len(), 2);
    }

    #[test]
    fn no_segments_no_citations() {
        assert!(merge(&[]).is_empty());
        assert_eq!(format_list(&[]), "No sources");
    }
}
