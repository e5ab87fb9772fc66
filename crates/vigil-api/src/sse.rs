// Server-sent events
//
// Incremental decoder for `text/event-stream` bodies, plus the response
// wrapper that feeds it chunk by chunk. Lines may end in LF, CR or CRLF;
// an event is dispatched on the blank line that follows its fields.

use std::collections::VecDeque;

use tracing::trace;

use crate::error::Error;

/// One dispatched event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` field; `None` means the default `message` type.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// Event type, defaulting to `message`.
    pub fn kind(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Byte-oriented decoder; chunk boundaries may fall anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some((line_end, next)) = find_eol(&self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..next).take(line_end).collect();
            if let Some(event) = self.line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn line(&mut self, line: &[u8]) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.first() == Some(&b':') {
            return None;
        }

        let (name, value) = match line.iter().position(|b| *b == b':') {
            Some(colon) => {
                let (name, rest) = line.split_at(colon);
                let value = rest.get(1..).unwrap_or_default();
                (name, value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &[][..]),
        };
        let value = String::from_utf8_lossy(value).into_owned();

        match name {
            b"event" => self.event = Some(value),
            b"data" => self.data.push(value),
            b"id" => self.id = Some(value),
            _ => trace!(field = %String::from_utf8_lossy(name), "ignored sse field"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
            id,
        })
    }
}

/// `(line_end, next_line_start)`, or `None` until a terminator is complete.
///
/// A trailing lone CR waits for the next chunk in case it is half a CRLF.
fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let pos = bytes.iter().position(|b| *b == b'\r' || *b == b'\n')?;
    if bytes.get(pos) == Some(&b'\n') {
        return Some((pos, pos + 1));
    }
    match bytes.get(pos + 1) {
        None => None,
        Some(b'\n') => Some((pos, pos + 2)),
        Some(_) => Some((pos, pos + 1)),
    }
}

/// An open event stream over one HTTP response.
#[derive(Debug)]
pub struct EventStream {
    response: reqwest::Response,
    decoder: SseDecoder,
    ready: VecDeque<SseEvent>,
}

impl EventStream {
    pub(crate) fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
        }
    }

    /// Next event, or `None` when the server ends the stream.
    pub async fn next_event(&mut self) -> Result<Option<SseEvent>, Error> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(Some(event));
            }
            match self.response.chunk().await.map_err(Error::Transport)? {
                Some(chunk) => self.ready.extend(self.decoder.feed(&chunk)),
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: ping\nda").is_empty());
        assert!(decoder.feed(b"ta: {\"type\":\"PING\"}\r").is_empty());

        let events = decoder.feed(b"\n\r\n");
        assert_eq!(events, vec![SseEvent {
            event: Some("ping".into()),
            data: r#"{"type":"PING"}"#.into(),
            id: None,
        }]);
        assert_eq!(events[0].kind(), "ping");
    }

    #[test]
    fn multiline_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keep-alive\n\ndata: a\ndata:b\nid: 9\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
        assert_eq!(events[0].id.as_deref(), Some("9"));
        assert_eq!(events[0].kind(), "message");
    }

    #[test]
    fn bare_cr_terminates_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: x\r\rdata: y\r\r");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");

        // the final CR could still be the first half of a CRLF
        let events = decoder.feed(b"\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "y");
    }

    #[test]
    fn fields_without_data_do_not_dispatch() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: open\n\n").is_empty());
        let events = decoder.feed(b"data: later\n\n");
        assert_eq!(events[0].event, None);
    }
}
