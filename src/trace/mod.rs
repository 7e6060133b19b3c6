//! Classification of assistant text into reasoning-trace zones.
//!
//! Both entry points are pure functions over the full text of a message, so
//! they can be re-run on every streamed delta.

pub mod segmenter;
pub mod split;

pub use segmenter::{Segment, SegmentKind, segment};
pub use split::{TraceSplit, split_final_answer};

use once_cell::sync::Lazy;
use regex::Regex;

/// Markers that introduce the final answer, in every language the agent
/// answers in.
pub(crate) static FINAL_ANSWER_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Final [Aa]nswer:|最终(?:答案|回答)[:：]").expect("valid final answer regex")
});

/// Label and marker texts recognized anywhere in a trace.
pub const TRACE_MARKERS: &[&str] = &[
    "Thought:",
    "Action:",
    "Action Input:",
    "Observation:",
    "Final Answer:",
    "Final answer:",
    "最终答案:",
    "最终答案：",
    "最终回答:",
    "最终回答：",
];

/// Length of the part of a growing `text` whose classification can no longer
/// change: everything before a trailing fragment that may still grow into a
/// label or marker.
pub fn settled_len(text: &str) -> usize {
    let longest = TRACE_MARKERS.iter().map(|m| m.len()).max().unwrap_or(0);
    let floor = text.len().saturating_sub(longest - 1);
    text.char_indices()
        .map(|(idx, _)| idx)
        .filter(|idx| *idx >= floor)
        .find(|idx| {
            let tail = &text[*idx..];
            TRACE_MARKERS
                .iter()
                .any(|m| m.len() > tail.len() && m.starts_with(tail))
        })
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_len() {
        assert_eq!(settled_len(""), 0);
        assert_eq!(settled_len("hello"), 5);
        assert_eq!(settled_len("hello Tho"), 6);
        assert_eq!(settled_len("hello Thought:"), 14);
        assert_eq!(settled_len("x Action"), 2);
        assert_eq!(settled_len("x Action In"), 2);
        assert_eq!(settled_len("x Action:"), 9);
        assert_eq!(settled_len("答案 最终"), "答案 ".len());
        assert_eq!(settled_len("Final answer"), 0);
        assert_eq!(settled_len("T"), 0);
    }

    #[test]
    fn test_settled_prefix_segments_are_stable() {
        let full = "Thought: plan\nAction: search\nAction Input: rust\nObservation: ok\nFinal Answer: done";
        let full_segments = segment(full);
        for end in (0..=full.len()).filter(|i| full.is_char_boundary(*i)) {
            let settled = settled_len(&full[..end]);
            for seg in segment(&full[..settled]) {
                let counterpart = full_segments
                    .iter()
                    .find(|s| s.start <= seg.start && seg.start < s.end.max(s.start + 1))
                    .unwrap();
                assert_eq!(seg.kind, counterpart.kind, "prefix {:?}", &full[..end]);
            }
        }
    }
}
