use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::Error;

/// STOMP 1.2 frame commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Command {
    // client
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    // server
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// CONNECT and CONNECTED headers are sent verbatim (no escaping).
    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

/// Ordered frame headers. Repeated names are allowed; the first wins on lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Headers::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Replace the first header named `name`, or append it.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Append without replacing (used while decoding).
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.push(k, v);
        }
        headers
    }
}

/// A single STOMP frame with a text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Headers,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Headers::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn destination(&self) -> Option<&str> {
        self.get("destination")
    }

    /// CONNECT frame. `heart_beat` is `(outgoing_ms, incoming_ms)`.
    pub fn connect(host: &str, heart_beat: (u64, u64), bearer: Option<&str>) -> Self {
        let mut frame = Self::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", format!("{},{}", heart_beat.0, heart_beat.1));
        if let Some(token) = bearer {
            frame = frame.header("Authorization", format!("Bearer {token}"));
        }
        frame
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    /// SEND frame; `headers` are applied after `destination`.
    pub fn send(destination: &str, headers: Headers, body: impl Into<String>) -> Self {
        let mut frame = Self::new(Command::Send).header("destination", destination);
        for (name, value) in headers.iter() {
            frame.headers.set(name, value);
        }
        frame.with_body(body)
    }

    pub fn disconnect(receipt: &str) -> Self {
        Self::new(Command::Disconnect).header("receipt", receipt)
    }

    /// Serialize to wire text, NUL-terminated. Adds `content-length` for
    /// non-empty bodies unless the caller already set one.
    pub fn encode(&self) -> String {
        let escape_headers = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(&self.command.to_string());
        out.push('\n');
        for (name, value) in self.headers.iter() {
            if escape_headers {
                let _ = writeln!(out, "{}:{}", escape(name), escape(value));
            } else {
                let _ = writeln!(out, "{name}:{value}");
            }
        }
        if !self.body.is_empty() && !self.headers.contains("content-length") {
            let _ = writeln!(out, "content-length:{}", self.body.len());
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Decode every frame in one transport message.
///
/// EOLs between frames are heart-beats and are skipped, so a message that
/// is only `"\n"` decodes to an empty vector.
pub fn decode_all(input: &str) -> Result<Vec<Frame>, Error> {
    let mut frames = Vec::new();
    let mut rest = input;
    loop {
        rest = rest.trim_start_matches(['\n', '\r']);
        if rest.is_empty() {
            return Ok(frames);
        }
        let (frame, consumed) = decode_one(rest)?;
        frames.push(frame);
        rest = rest.get(consumed..).unwrap_or_default();
    }
}

fn decode_one(input: &str) -> Result<(Frame, usize), Error> {
    let mut pos = 0;
    let mut lines = Vec::new();
    loop {
        let tail = input.get(pos..).unwrap_or_default();
        let Some(nl) = tail.find('\n') else {
            return Err(Error::Protocol("truncated frame header".into()));
        };
        let line = tail.get(..nl).unwrap_or_default().trim_end_matches('\r');
        pos += nl + 1;
        if line.is_empty() {
            break;
        }
        lines.push(line);
    }

    let mut lines = lines.into_iter();
    let command_line = lines.next().unwrap_or_default();
    let command = Command::from_str(command_line)
        .map_err(|_| Error::Protocol(format!("unknown command {command_line:?}")))?;

    let unescape_headers = command.escapes_headers();
    let mut headers = Headers::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            return Err(Error::Protocol(format!("malformed header line {line:?}")));
        };
        if unescape_headers {
            headers.push(unescape(name)?, unescape(value)?);
        } else {
            headers.push(name, value);
        }
    }

    let rest = input.get(pos..).unwrap_or_default();
    let (body, consumed) = if let Some(raw) = headers.get("content-length") {
        let len: usize = raw
            .trim()
            .parse()
            .map_err(|_| Error::Protocol(format!("invalid content-length {raw:?}")))?;
        let body = rest
            .get(..len)
            .ok_or_else(|| Error::Protocol("body shorter than content-length".into()))?;
        if !rest.get(len..).is_some_and(|t| t.starts_with('\0')) {
            return Err(Error::Protocol("missing NUL after body".into()));
        }
        (body, len + 1)
    } else {
        let end = rest
            .find('\0')
            .ok_or_else(|| Error::Protocol("unterminated frame".into()))?;
        (rest.get(..end).unwrap_or_default(), end + 1)
    };

    let frame = Frame {
        command,
        headers,
        body: body.to_owned(),
    };
    Ok((frame, pos + consumed))
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(raw: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('c') => out.push(':'),
                Some(other) => {
                    return Err(Error::Protocol(format!("undefined escape \\{other}")));
                }
                None => return Err(Error::Protocol("dangling escape at end of header".into())),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}
