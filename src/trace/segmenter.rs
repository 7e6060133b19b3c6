#[cfg(test)]
#[path = "segmenter_test.rs"]
mod tests;

use std::fmt::Display;

use once_cell::sync::Lazy;
use regex::Regex;

use super::FINAL_ANSWER_MARKER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Thought,
    Action,
    ActionInput,
    Observation,
    Text,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Thought => "thought",
            SegmentKind::Action => "action",
            SegmentKind::ActionInput => "action-input",
            SegmentKind::Observation => "observation",
            SegmentKind::Text => "text",
        }
    }

    /// Label that opens the zone in the source text.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            SegmentKind::Thought => Some("Thought:"),
            SegmentKind::Action => Some("Action:"),
            SegmentKind::ActionInput => Some("Action Input:"),
            SegmentKind::Observation => Some("Observation:"),
            SegmentKind::Text => None,
        }
    }
}

impl Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified span of the source text. `start..end` is the byte range of the
/// whole span, label included; `text` is the zone content without its label
/// (trimmed), or the raw slice for plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    kind: SegmentKind,
    start: usize,
    content_start: usize,
    end: usize,
}

static LABELS: Lazy<Vec<(SegmentKind, Regex)>> = Lazy::new(|| {
    [
        SegmentKind::Thought,
        SegmentKind::Action,
        SegmentKind::ActionInput,
        SegmentKind::Observation,
    ]
    .into_iter()
    .filter_map(|kind| kind.label().map(|label| (kind, label)))
    .map(|(kind, label)| {
        let re = Regex::new(&regex::escape(label)).expect("valid label regex");
        (kind, re)
    })
    .collect()
});

/// Split `text` into segments that tile it exactly, in order.
pub fn segment(text: &str) -> Vec<Segment> {
    let mut labels: Vec<(SegmentKind, usize, usize)> = vec![];
    for (kind, re) in LABELS.iter() {
        labels.extend(re.find_iter(text).map(|m| (*kind, m.start(), m.end())));
    }

    let mut boundaries = labels.iter().map(|(_, start, _)| *start).collect::<Vec<_>>();
    boundaries.extend(FINAL_ANSWER_MARKER.find_iter(text).map(|m| m.start()));
    boundaries.sort_unstable();

    let candidates = labels
        .into_iter()
        .map(|(kind, start, content_start)| {
            let idx = boundaries.partition_point(|b| *b < content_start);
            let end = boundaries.get(idx).copied().unwrap_or(text.len());
            Candidate {
                kind,
                start,
                content_start,
                end,
            }
        })
        .collect::<Vec<_>>();

    fill_gaps(text, select_non_overlapping(candidates))
}

/// Greedy interval scheduling: sorted by start, a candidate is kept only when
/// it starts at or after the end of the last kept one.
fn select_non_overlapping(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by_key(|c| c.start);

    let mut accepted: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut last_end = 0;
    for candidate in candidates {
        if candidate.start >= last_end {
            last_end = candidate.end;
            accepted.push(candidate);
        }
    }
    accepted
}

fn fill_gaps(text: &str, accepted: Vec<Candidate>) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(accepted.len() * 2 + 1);
    let mut cursor = 0;

    for candidate in accepted {
        if candidate.start > cursor {
            segments.push(plain(text, cursor, candidate.start));
        }
        segments.push(Segment {
            kind: candidate.kind,
            text: text[candidate.content_start..candidate.end].trim().to_string(),
            start: candidate.start,
            end: candidate.end,
        });
        cursor = candidate.end;
    }

    if cursor < text.len() {
        segments.push(plain(text, cursor, text.len()));
    }
    segments
}

fn plain(text: &str, start: usize, end: usize) -> Segment {
    Segment {
        kind: SegmentKind::Text,
        text: text[start..end].to_string(),
        start,
        end,
    }
}
