#[cfg(test)]
#[path = "split_test.rs"]
mod tests;

use super::FINAL_ANSWER_MARKER;

/// Assistant text split around its first final-answer marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceSplit {
    pub thought: String,
    pub final_answer: String,
}

impl TraceSplit {
    pub fn has_thought(&self) -> bool {
        !self.thought.is_empty()
    }
}

/// Everything before the first marker is exposed reasoning, everything after it
/// is the answer. Without a marker the whole text is the answer.
pub fn split_final_answer(text: &str) -> TraceSplit {
    match FINAL_ANSWER_MARKER.find(text) {
        Some(m) => TraceSplit {
            thought: text[..m.start()].trim().to_string(),
            final_answer: text[m.end()..].trim().to_string(),
        },
        None => TraceSplit {
            thought: String::new(),
            final_answer: text.trim().to_string(),
        },
    }
}
