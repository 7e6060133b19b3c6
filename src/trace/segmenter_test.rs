use proptest::prelude::*;

use super::*;

fn kinds(segments: &[Segment]) -> Vec<SegmentKind> {
    segments.iter().map(|s| s.kind).collect()
}

fn assert_tiles(text: &str, segments: &[Segment]) {
    let mut cursor = 0;
    for s in segments {
        assert_eq!(s.start, cursor, "gap or overlap before {:?}", s);
        assert!(s.end > s.start, "empty segment {:?}", s);
        cursor = s.end;
    }
    assert_eq!(cursor, text.len());

    let rebuilt = segments
        .iter()
        .map(|s| &text[s.start..s.end])
        .collect::<String>();
    assert_eq!(rebuilt, text);
}

#[test]
fn test_segment_full_cycle() {
    let text = "Thought: I should search\nAction: search\nAction Input: {\"q\": \"rust\"}\nObservation: found it\nThought: done\nFinal Answer: 42";
    let segments = segment(text);
    assert_tiles(text, &segments);

    assert_eq!(
        kinds(&segments),
        vec![
            SegmentKind::Thought,
            SegmentKind::Action,
            SegmentKind::ActionInput,
            SegmentKind::Observation,
            SegmentKind::Thought,
            SegmentKind::Text,
        ]
    );
    assert_eq!(segments[0].text, "I should search");
    assert_eq!(segments[1].text, "search");
    assert_eq!(segments[2].text, "{\"q\": \"rust\"}");
    assert_eq!(segments[3].text, "found it");
    assert_eq!(segments[4].text, "done");
    assert_eq!(segments[5].text, "Final Answer: 42");
}

#[test]
fn test_segment_leading_text() {
    let text = "Let me think. Thought: hmm";
    let segments = segment(text);
    assert_tiles(text, &segments);
    assert_eq!(kinds(&segments), vec![SegmentKind::Text, SegmentKind::Thought]);
    assert_eq!(segments[0].text, "Let me think. ");
    assert_eq!(segments[1].text, "hmm");
    assert_eq!(segments[1].start, 14);
}

#[test]
fn test_segment_trailing_zone_grows_with_stream() {
    let partial = segment("Thought: thinking");
    assert_eq!(partial.len(), 1);
    assert_eq!(partial[0].kind, SegmentKind::Thought);
    assert_eq!(partial[0].end, 17);

    let full = segment("Thought: thinking more");
    assert_eq!(full.len(), 1);
    assert_eq!(full[0].text, "thinking more");
    assert_eq!(full[0].end, 22);
}

#[test]
fn test_segment_without_labels() {
    assert!(segment("").is_empty());

    let segments = segment("just an answer");
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].kind, SegmentKind::Text);
    assert_eq!(segments[0].text, "just an answer");
}

#[test]
fn test_segment_action_input_is_not_action() {
    let text = "Action Input: {}";
    let segments = segment(text);
    assert_eq!(kinds(&segments), vec![SegmentKind::ActionInput]);
    assert_eq!(segments[0].text, "{}");
}

#[test]
fn test_segment_repeated_labels() {
    let text = "Thought: a Thought: b";
    let segments = segment(text);
    assert_tiles(text, &segments);
    assert_eq!(
        kinds(&segments),
        vec![SegmentKind::Thought, SegmentKind::Thought]
    );
    assert_eq!(segments[0].text, "a");
    assert_eq!(segments[1].text, "b");
}

#[test]
fn test_segment_stops_at_chinese_final_answer() {
    let text = "Thought: 想一想 最终答案：好的";
    let segments = segment(text);
    assert_tiles(text, &segments);
    assert_eq!(kinds(&segments), vec![SegmentKind::Thought, SegmentKind::Text]);
    assert_eq!(segments[0].text, "想一想");
    assert_eq!(segments[1].text, "最终答案：好的");
}

#[test]
fn test_select_non_overlapping_first_to_start_wins() {
    let candidate = |start, end| Candidate {
        kind: SegmentKind::Thought,
        start,
        content_start: start,
        end,
    };
    let accepted = select_non_overlapping(vec![
        candidate(5, 15),
        candidate(0, 10),
        candidate(10, 12),
        candidate(3, 4),
    ]);
    assert_eq!(accepted, vec![candidate(0, 10), candidate(10, 12)]);
}

#[test]
fn test_segment_kind_names() {
    assert_eq!(SegmentKind::ActionInput.to_string(), "action-input");
    assert_eq!(SegmentKind::Observation.label(), Some("Observation:"));
    assert_eq!(SegmentKind::Text.label(), None);
}

const VOCAB: &[&str] = &[
    "Thought: ",
    "Action: ",
    "Action Input: ",
    "Observation: ",
    "Final Answer: ",
    "最终答案：",
    "Thou",
    "Action",
    "search",
    "{\"q\": 1}",
    "思考",
    " ",
    "\n",
    ":",
];

fn trace_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec(proptest::sample::select(VOCAB), 0..24).prop_map(|p| p.concat())
}

proptest! {
    #[test]
    fn prop_segments_tile_traces(text in trace_strategy()) {
        assert_tiles(&text, &segment(&text));
    }

    #[test]
    fn prop_segments_tile_any_string(text in "\\PC*") {
        assert_tiles(&text, &segment(&text));
    }

    #[test]
    fn prop_prefix_keeps_leading_segments(
        (text, cut) in trace_strategy().prop_flat_map(|t| {
            let n = t.chars().count();
            (Just(t), 0..=n)
        })
    ) {
        let prefix = text.chars().take(cut).collect::<String>();
        let full = segment(&text);
        let partial = segment(&prefix);
        assert_tiles(&prefix, &partial);

        if let Some((last, leading)) = partial.split_last() {
            prop_assert_eq!(leading, &full[..leading.len()]);
            prop_assert_eq!(last.start, full[leading.len()].start);
        }
    }
}
