#[cfg(test)]
#[path = "render_test.rs"]
mod tests;

use std::io::{self, Write};

use crossterm::style::{Color, Stylize, style};

use crate::models::{Conversation, Message, NoticeMessage};
use crate::trace::{SegmentKind, TraceSplit, segment, settled_len};

/// Prints assistant messages as they stream, colouring each trace zone.
///
/// Only the settled part of the text is printed, so a label that is still
/// arriving is never shown with the wrong colour.
#[derive(Debug, Default)]
pub struct Renderer {
    colored: bool,
    message_id: Option<String>,
    printed: String,
}

impl Renderer {
    pub fn new(colored: bool) -> Self {
        Self {
            colored,
            ..Default::default()
        }
    }

    pub fn begin(&mut self, message_id: &str) {
        self.message_id = Some(message_id.to_string());
        self.printed.clear();
    }

    /// Stop following the current message without printing anything.
    pub fn reset(&mut self) {
        self.message_id = None;
        self.printed.clear();
    }

    pub fn is_rendering(&self, message_id: &str) -> bool {
        self.message_id.as_deref() == Some(message_id)
    }

    /// Print whatever settled since the last call.
    pub fn update<W: Write>(&mut self, out: &mut W, content: &str) -> io::Result<()> {
        if self.message_id.is_none() || !content.starts_with(self.printed.as_str()) {
            return Ok(());
        }
        let end = settled_len(content);
        self.print_until(out, content, end)
    }

    /// Print the rest of the message and close it. Content that no longer
    /// extends what was printed (a stop or error notice) is printed whole.
    pub fn finish<W: Write>(&mut self, out: &mut W, content: &str) -> io::Result<()> {
        if self.message_id.is_none() {
            return Ok(());
        }
        if content.starts_with(self.printed.as_str()) {
            self.print_until(out, content, content.len())?;
        } else {
            if !self.printed.is_empty() && !self.printed.ends_with('\n') {
                writeln!(out)?;
            }
            write!(out, "{}", self.paint(content, Some(Color::DarkYellow)))?;
        }
        writeln!(out)?;
        out.flush()?;
        self.message_id = None;
        self.printed.clear();
        Ok(())
    }

    fn print_until<W: Write>(&mut self, out: &mut W, content: &str, end: usize) -> io::Result<()> {
        let from = self.printed.len();
        if end <= from {
            return Ok(());
        }
        let at_line_start = from == 0 || self.printed.ends_with('\n');
        write!(out, "{}", self.paint_trace(content, from, end, at_line_start))?;
        self.printed.push_str(&content[from..end]);
        out.flush()
    }

    /// Colour `content[from..end]` by trace zone. Every labelled zone starts
    /// on its own line.
    fn paint_trace(&self, content: &str, from: usize, end: usize, at_line_start: bool) -> String {
        let mut ret = String::new();
        let mut at_line_start = at_line_start;
        for seg in segment(&content[..end]) {
            if seg.end <= from {
                continue;
            }
            let start = seg.start.max(from);
            if start == seg.start && seg.kind != SegmentKind::Text && !at_line_start {
                ret.push('\n');
            }
            let piece = &content[start..seg.end];
            ret.push_str(&self.paint(piece, zone_color(seg.kind)));
            at_line_start = piece.ends_with('\n');
        }
        ret
    }

    /// Full rendering of a stored message.
    pub fn render_message(&self, message: &Message) -> String {
        if message.is_user() {
            return format!("{} {}", self.paint("you>", Some(Color::Blue)), message.content());
        }
        let content = message.content();
        format!(
            "{}\n{}",
            self.assistant_prompt(),
            self.paint_trace(content, 0, content.len(), true)
        )
    }

    pub fn assistant_prompt(&self) -> String {
        self.paint("agent>", Some(Color::Magenta))
    }

    pub fn render_split(&self, split: &TraceSplit) -> String {
        let mut ret = String::new();
        if split.has_thought() {
            ret.push_str(&self.paint("thought:", Some(Color::DarkGrey)));
            ret.push('\n');
            ret.push_str(&self.paint(&split.thought, Some(Color::DarkGrey)));
            ret.push_str("\n\n");
        }
        ret.push_str(&self.paint("final:", Some(Color::Green)));
        ret.push('\n');
        ret.push_str(&split.final_answer);
        ret
    }

    pub fn render_notice(&self, notice: &NoticeMessage) -> String {
        let label = format!("[{}]", notice.kind().label());
        format!(
            "{} {}",
            self.paint(&label, Some(notice.kind().color())),
            notice.message()
        )
    }

    /// One line of a conversation listing.
    pub fn render_entry(&self, index: usize, convo: &Conversation, active: bool) -> String {
        let marker = if active { "*" } else { " " };
        let mut flags = String::new();
        if convo.pinned() {
            flags.push_str(" [pinned]");
        }
        if convo.archived() {
            flags.push_str(" [archived]");
        }
        let mut line = format!(
            "{}{:>3}. {}{} ({}, {})",
            marker,
            index,
            convo.title(),
            flags,
            convo.mode_id(),
            convo.model_id()
        );
        let preview = convo.preview();
        if !preview.is_empty() {
            line.push_str(&format!("\n       {}", self.paint(&preview, Some(Color::DarkGrey))));
        }
        line
    }

    fn paint(&self, text: &str, color: Option<Color>) -> String {
        match color {
            Some(color) if self.colored => style(text).with(color).to_string(),
            _ => text.to_string(),
        }
    }
}

fn zone_color(kind: SegmentKind) -> Option<Color> {
    match kind {
        SegmentKind::Thought => Some(Color::DarkGrey),
        SegmentKind::Action => Some(Color::Yellow),
        SegmentKind::ActionInput => Some(Color::Cyan),
        SegmentKind::Observation => Some(Color::Green),
        SegmentKind::Text => None,
    }
}
