#[cfg(test)]
#[path = "decoder_test.rs"]
mod tests;

use std::collections::VecDeque;

use eyre::Result;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::models::WireEvent;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
const FRAME_TERMINATOR: &[u8] = b"\n\n";

#[derive(Debug, PartialEq)]
enum FrameOutcome {
    Event(WireEvent),
    Done,
    Skip,
}

/// Incremental decoder for the blank-line framed chat stream.
///
/// Bytes are buffered raw, so neither a terminator nor a multi-byte character
/// has to arrive within a single read.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    scan_from: usize,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the termination sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Buffer `bytes` and return every event completed by them, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<WireEvent> {
        let mut events = vec![];
        if self.done {
            return events;
        }
        self.buffer.extend(bytes.iter().filter(|b| **b != b'\r'));

        while let Some(pos) = self.find_terminator() {
            let frame = self.buffer.drain(..pos + FRAME_TERMINATOR.len()).collect::<Vec<_>>();
            self.scan_from = 0;
            match parse_frame(&frame[..pos]) {
                FrameOutcome::Event(event) => events.push(event),
                FrameOutcome::Skip => {}
                FrameOutcome::Done => {
                    log::debug!("Chat stream terminated by sentinel");
                    self.done = true;
                    self.buffer.clear();
                    break;
                }
            }
        }
        events
    }

    /// Decode what is left once the byte stream has ended, for servers that do
    /// not terminate their last frame.
    pub fn finish(&mut self) -> Option<WireEvent> {
        if self.done {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        self.scan_from = 0;
        let text = String::from_utf8_lossy(&rest);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if !text.starts_with(DATA_PREFIX) {
            log::warn!("Dropping unterminated trailing frame: {}", text);
            return None;
        }
        match parse_frame(text.as_bytes()) {
            FrameOutcome::Event(event) => Some(event),
            FrameOutcome::Done => {
                self.done = true;
                None
            }
            FrameOutcome::Skip => None,
        }
    }

    fn find_terminator(&mut self) -> Option<usize> {
        let found = self.buffer[self.scan_from..]
            .windows(FRAME_TERMINATOR.len())
            .position(|w| w == FRAME_TERMINATOR)
            .map(|pos| pos + self.scan_from);
        if found.is_none() {
            // A terminator may still complete across the last buffered byte.
            self.scan_from = self.buffer.len().saturating_sub(FRAME_TERMINATOR.len() - 1);
        }
        found
    }
}

fn parse_frame(frame: &[u8]) -> FrameOutcome {
    let text = String::from_utf8_lossy(frame);
    log::trace!("chat stream frame: {}", text);

    let data = text
        .lines()
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(|line| line.trim_start())
        .collect::<Vec<_>>();
    if data.is_empty() {
        return FrameOutcome::Skip;
    }

    let payload = data.join("\n");
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return FrameOutcome::Done;
    }

    match serde_json::from_str::<WireEvent>(payload) {
        Ok(event) => FrameOutcome::Event(event),
        Err(err) => {
            log::warn!("Dropping undecodable frame {}: {}", payload, err);
            FrameOutcome::Skip
        }
    }
}

struct DecodeState<S> {
    bytes: S,
    decoder: FrameDecoder,
    pending: VecDeque<WireEvent>,
    cancel_token: CancellationToken,
    finished: bool,
}

/// Turn a byte stream into a lazy stream of wire events.
///
/// A read error is yielded once and ends the stream. Cancelling the token
/// ends the stream at once, dropping anything still buffered.
pub fn decode_stream<S, B, E>(
    bytes: S,
    cancel_token: CancellationToken,
) -> BoxStream<'static, Result<WireEvent>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: FrameDecoder::new(),
        pending: VecDeque::new(),
        cancel_token,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.cancel_token.is_cancelled() {
                return None;
            }
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished || state.decoder.is_done() {
                return None;
            }

            let next = tokio::select! {
                biased;
                _ = state.cancel_token.cancelled() => {
                    log::debug!("Chat stream cancelled");
                    return None;
                }
                next = state.bytes.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let events = state.decoder.feed(chunk.as_ref());
                    state.pending.extend(events);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    let err = eyre::Report::new(err).wrap_err("reading chat stream");
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    state.pending.extend(state.decoder.finish());
                }
            }
        }
    })
    .boxed()
}
