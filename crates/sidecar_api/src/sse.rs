use chat_transcript::Fragment;
use tracing::trace;

/// Data payload that terminates a `/chat` stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded server-sent event of a chat stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseItem {
    Fragment(Fragment),
    Done,
}

/// Incremental parser for the `/chat` event stream.
///
/// Bytes are buffered until a blank line completes an event, so events and
/// multi-byte characters may be split across network chunks arbitrarily.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: Vec<u8>,
}

impl SseFrameParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseItem> {
        self.buffer
            .extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));
        let mut items = Vec::new();

        while let Some(split) = find_event_end(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..split + 2).collect();
            if let Some(item) = parse_event(&String::from_utf8_lossy(&event[..split])) {
                items.push(item);
            }
        }

        items
    }

    /// Drains an event left unterminated when the stream closed.
    pub fn finish(&mut self) -> Vec<SseItem> {
        let rest = std::mem::take(&mut self.buffer);
        parse_event(&String::from_utf8_lossy(&rest))
            .into_iter()
            .collect()
    }

    /// Parse a complete event-stream body in one shot.
    pub fn parse_frames(input: &str) -> Vec<SseItem> {
        let mut parser = Self::default();
        let mut items = parser.feed(input.as_bytes());
        items.extend(parser.finish());
        items
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\n\n")
}

fn extract_data_payload(event: &str) -> Option<String> {
    let data_lines: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn parse_event(event: &str) -> Option<SseItem> {
    let payload = extract_data_payload(event)?;
    let payload = payload.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == DONE_SENTINEL {
        return Some(SseItem::Done);
    }

    match serde_json::from_str::<Fragment>(payload) {
        Ok(fragment) => Some(SseItem::Fragment(fragment)),
        Err(error) => {
            trace!(%error, payload, "skipping undecodable sidecar event");
            None
        }
    }
}
