//! Minimal STOMP 1.2 frame codec.
//!
//! Clients speak a subset of STOMP over WebSocket text messages:
//!
//! ```text
//! COMMAND
//! header1:value1
//! header2:value2
//!
//! body^@
//! ```
//!
//! [`ClientFrame::decode`] turns one text message into a typed client frame;
//! [`ServerFrame`] builds the frames the gateway sends back.

/// STOMP protocol version negotiated with every client.
pub const STOMP_VERSION: &str = "1.2";

/// Frame terminator.
const NUL: char = '\0';

/// Header names used by the gateway.
pub mod headers {
    pub const AUTHORIZATION: &str = "Authorization";
    pub const DESTINATION: &str = "destination";
    pub const ID: &str = "id";
    pub const RECEIPT: &str = "receipt";
    pub const RECEIPT_ID: &str = "receipt-id";
    pub const SUBSCRIPTION: &str = "subscription";
    pub const MESSAGE_ID: &str = "message-id";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const VERSION: &str = "version";
    pub const HEART_BEAT: &str = "heart-beat";
    pub const MESSAGE: &str = "message";
}

/// Errors produced while decoding a frame.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StompError {
    #[error("Frame has no command")]
    MissingCommand,

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),

    #[error("Malformed header line: {0}")]
    MalformedHeader(String),

    #[error("Invalid header escape sequence in: {0}")]
    InvalidEscape(String),

    #[error("Frame is not NUL-terminated")]
    MissingTerminator,
}

/// Case-preserving header map with case-insensitive lookup.
///
/// STOMP allows repeated headers; only the first occurrence is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header unless one with the same (case-insensitive) name exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if self.get(&name).is_none() {
            self.entries.push((name, value.into()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

// ---------------------------------------------------------------------------
// Client frames
// ---------------------------------------------------------------------------

/// A frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// `CONNECT` (or its alias `STOMP`).
    Connect { headers: Headers },
    /// `SUBSCRIBE`; `destination` is `None` when the header is absent.
    Subscribe {
        id: Option<String>,
        destination: Option<String>,
        receipt: Option<String>,
    },
    /// `SEND`; `destination` is `None` when the header is absent.
    Send {
        destination: Option<String>,
        body: String,
        receipt: Option<String>,
    },
    Unsubscribe {
        id: Option<String>,
        receipt: Option<String>,
    },
    Disconnect { receipt: Option<String> },
}

impl ClientFrame {
    /// Decode a single text message.
    ///
    /// Returns `Ok(None)` for heart-beat messages (only EOLs).
    pub fn decode(text: &str) -> Result<Option<ClientFrame>, StompError> {
        let trimmed = text.trim_start_matches(['\r', '\n']);
        if trimmed.is_empty() {
            return Ok(None);
        }

        let end = trimmed.find(NUL).ok_or(StompError::MissingTerminator)?;
        let frame = &trimmed[..end];

        // The header block ends at the first blank line, whichever EOL style.
        let lf = frame.find("\n\n").map(|i| (i, 2));
        let crlf = frame.find("\r\n\r\n").map(|i| (i, 4));
        let (head, body) = match (lf, crlf) {
            (Some(a), Some(b)) => split_at_blank(frame, a.min(b)),
            (Some(a), None) | (None, Some(a)) => split_at_blank(frame, a),
            (None, None) => (frame, ""),
        };

        let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));
        let command = lines
            .next()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(StompError::MissingCommand)?;

        let mut parsed = Headers::new();
        for line in lines.filter(|l| !l.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| StompError::MalformedHeader(line.to_string()))?;
            // CONNECT headers are not escaped in STOMP 1.2.
            if command == "CONNECT" || command == "STOMP" {
                parsed.insert(name, value);
            } else {
                parsed.insert(unescape(name)?, unescape(value)?);
            }
        }

        if command == "CONNECT" || command == "STOMP" {
            return Ok(Some(ClientFrame::Connect { headers: parsed }));
        }

        let owned = |name: &str| parsed.get(name).map(str::to_string);

        let frame = match command {
            "SUBSCRIBE" => ClientFrame::Subscribe {
                id: owned(headers::ID),
                destination: owned(headers::DESTINATION),
                receipt: owned(headers::RECEIPT),
            },
            "SEND" => ClientFrame::Send {
                destination: owned(headers::DESTINATION),
                body: body.to_string(),
                receipt: owned(headers::RECEIPT),
            },
            "UNSUBSCRIBE" => ClientFrame::Unsubscribe {
                id: owned(headers::ID),
                receipt: owned(headers::RECEIPT),
            },
            "DISCONNECT" => ClientFrame::Disconnect {
                receipt: owned(headers::RECEIPT),
            },
            other => return Err(StompError::UnsupportedCommand(other.to_string())),
        };
        Ok(Some(frame))
    }

    /// The STOMP command name of this frame.
    pub fn command(&self) -> &'static str {
        match self {
            ClientFrame::Connect { .. } => "CONNECT",
            ClientFrame::Subscribe { .. } => "SUBSCRIBE",
            ClientFrame::Send { .. } => "SEND",
            ClientFrame::Unsubscribe { .. } => "UNSUBSCRIBE",
            ClientFrame::Disconnect { .. } => "DISCONNECT",
        }
    }

    /// The `receipt` header, if the client asked for one.
    pub fn receipt(&self) -> Option<&str> {
        match self {
            ClientFrame::Connect { .. } => None,
            ClientFrame::Subscribe { receipt, .. }
            | ClientFrame::Send { receipt, .. }
            | ClientFrame::Unsubscribe { receipt, .. }
            | ClientFrame::Disconnect { receipt } => receipt.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Server frames
// ---------------------------------------------------------------------------

/// A frame sent by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFrame {
    pub command: &'static str,
    pub headers: Headers,
    pub body: String,
}

impl ServerFrame {
    /// `CONNECTED` reply to an admitted CONNECT.
    pub fn connected(heart_beat: &str) -> Self {
        Self {
            command: "CONNECTED",
            headers: [
                (headers::VERSION, STOMP_VERSION),
                (headers::HEART_BEAT, heart_beat),
            ]
            .into_iter()
            .collect(),
            body: String::new(),
        }
    }

    /// `MESSAGE` delivering a JSON body to one subscription.
    pub fn message(
        destination: &str,
        subscription: &str,
        message_id: &str,
        body: impl Into<String>,
    ) -> Self {
        Self {
            command: "MESSAGE",
            headers: [
                (headers::DESTINATION, destination),
                (headers::SUBSCRIPTION, subscription),
                (headers::MESSAGE_ID, message_id),
                (headers::CONTENT_TYPE, "application/json"),
            ]
            .into_iter()
            .collect(),
            body: body.into(),
        }
    }

    pub fn receipt(receipt_id: &str) -> Self {
        Self {
            command: "RECEIPT",
            headers: [(headers::RECEIPT_ID, receipt_id)].into_iter().collect(),
            body: String::new(),
        }
    }

    /// `ERROR` frame; the connection is closed after it is sent.
    pub fn error(message: &str, details: impl Into<String>) -> Self {
        Self {
            command: "ERROR",
            headers: [
                (headers::MESSAGE, message),
                (headers::CONTENT_TYPE, "text/plain"),
            ]
            .into_iter()
            .collect(),
            body: details.into(),
        }
    }

    /// Serialize to wire text, including the trailing NUL.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command);
        out.push('\n');
        for (name, value) in self.headers.iter() {
            out.push_str(&escape(name));
            out.push(':');
            out.push_str(&escape(value));
            out.push('\n');
        }
        if !self.body.is_empty() {
            out.push_str(headers::CONTENT_LENGTH);
            out.push(':');
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push(NUL);
        out
    }
}

// ---------------------------------------------------------------------------
// Header escaping
// ---------------------------------------------------------------------------

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

fn unescape(raw: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(StompError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

fn split_at_blank(frame: &str, (index, eol_len): (usize, usize)) -> (&str, &str) {
    (&frame[..index], &frame[index + eol_len..])
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn decodes_connect_with_authorization() {
        let text = "CONNECT\naccept-version:1.2\nAuthorization:Bearer abc.def\n\n\0";
        let frame = ClientFrame::decode(text).unwrap().unwrap();
        assert_matches!(frame, ClientFrame::Connect { ref headers } => {
            assert_eq!(headers.get("authorization"), Some("Bearer abc.def"));
        });
    }

    #[test]
    fn stomp_command_is_connect_alias() {
        let frame = ClientFrame::decode("STOMP\n\n\0").unwrap().unwrap();
        assert_eq!(frame.command(), "CONNECT");
    }

    #[test]
    fn decodes_subscribe() {
        let text = "SUBSCRIBE\nid:sub-0\ndestination:/user/queue/presence\nreceipt:r1\n\n\0";
        let frame = ClientFrame::decode(text).unwrap().unwrap();
        assert_eq!(
            frame,
            ClientFrame::Subscribe {
                id: Some("sub-0".into()),
                destination: Some("/user/queue/presence".into()),
                receipt: Some("r1".into()),
            }
        );
        assert_eq!(frame.receipt(), Some("r1"));
    }

    #[test]
    fn decodes_send_with_body_and_crlf() {
        let text = "SEND\r\ndestination:/app/chat/42/message\r\n\r\n{\"content\":\"hi\"}\0\n";
        let frame = ClientFrame::decode(text).unwrap().unwrap();
        assert_matches!(frame, ClientFrame::Send { destination: Some(d), body, .. } => {
            assert_eq!(d, "/app/chat/42/message");
            assert_eq!(body, "{\"content\":\"hi\"}");
        });
    }

    #[test]
    fn missing_destination_is_none() {
        let frame = ClientFrame::decode("SUBSCRIBE\nid:1\n\n\0").unwrap().unwrap();
        assert_matches!(frame, ClientFrame::Subscribe { destination: None, .. });
    }

    #[test]
    fn heartbeat_decodes_to_none() {
        assert_eq!(ClientFrame::decode("\n").unwrap(), None);
        assert_eq!(ClientFrame::decode("\r\n\r\n").unwrap(), None);
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert_eq!(
            ClientFrame::decode("SEND\ndestination:/x\n\nbody"),
            Err(StompError::MissingTerminator)
        );
        assert_eq!(
            ClientFrame::decode("NACK\n\n\0"),
            Err(StompError::UnsupportedCommand("NACK".into()))
        );
        assert_matches!(
            ClientFrame::decode("SEND\nnot-a-header\n\n\0"),
            Err(StompError::MalformedHeader(_))
        );
        assert_matches!(
            ClientFrame::decode("SEND\ndestination:/a\\x\n\n\0"),
            Err(StompError::InvalidEscape(_))
        );
    }

    #[test]
    fn first_repeated_header_wins() {
        let text = "SEND\ndestination:/app/chat/1\ndestination:/app/chat/2\n\n\0";
        let frame = ClientFrame::decode(text).unwrap().unwrap();
        assert_matches!(frame, ClientFrame::Send { destination: Some(d), .. } => {
            assert_eq!(d, "/app/chat/1");
        });
    }

    #[test]
    fn message_frame_encodes_headers_and_body() {
        let encoded =
            ServerFrame::message("/user/queue/presence", "sub-0", "m-1", "{\"a\":1}").encode();
        assert!(encoded.starts_with("MESSAGE\n"));
        assert!(encoded.contains("destination:/user/queue/presence\n"));
        assert!(encoded.contains("subscription:sub-0\n"));
        assert!(encoded.contains("content-length:7\n"));
        assert!(encoded.ends_with("\n\n{\"a\":1}\0"));
    }

    #[test]
    fn header_values_are_escaped() {
        let encoded = ServerFrame::error("bad: thing", "").encode();
        assert!(encoded.contains("message:bad\\c thing\n"));
    }
}
