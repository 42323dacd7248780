use std::fmt;

use crate::error::{Result, TransportError};

/// A single message on the narrow transport.
///
/// The host delivers `body` to every peer that subscribed to the namespace of
/// `id` (the part before the first `:`), including the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    /// Namespaced event id, e.g. `registry:register` or `packet:<header>`.
    pub id: String,
    /// Message body. Only characters the host can carry verbatim.
    pub body: String,
}

impl TransportMessage {
    /// Create a new message.
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }

    /// Namespace of the event id (text before the first `:`).
    pub fn namespace(&self) -> &str {
        self.id.split_once(':').map_or("", |(ns, _)| ns)
    }

    /// Event id with the namespace prefix removed.
    pub fn local_id(&self) -> &str {
        self.id.split_once(':').map_or(self.id.as_str(), |(_, rest)| rest)
    }
}

impl fmt::Display for TransportMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", quote_argument(&self.id), self.body)
    }
}

/// The host primitive that moves string messages between peers.
///
/// Implementations broadcast: every peer, the sender included, eventually
/// observes every successfully sent message, and all peers observe messages
/// in the same order.
pub trait Transport {
    /// Hand a message to the host for broadcast.
    fn send(&mut self, message: &TransportMessage) -> Result<()>;

    /// Take the next inbound message, if one is waiting.
    fn try_recv(&mut self) -> Option<TransportMessage>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, message: &TransportMessage) -> Result<()> {
        (**self).send(message)
    }

    fn try_recv(&mut self) -> Option<TransportMessage> {
        (**self).try_recv()
    }
}

/// Wrap `raw` in double quotes, escaping backslashes and quotes.
///
/// This is the form in which ids and payloads are embedded into the host's
/// command-like syntax.
pub fn quote_argument(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Reverse of [`quote_argument`].
pub fn unquote_argument(quoted: &str) -> Result<String> {
    let inner = quoted
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| TransportError::MalformedQuoting("missing surrounding quotes".to_string()))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(escaped @ ('\\' | '"')) => out.push(escaped),
                Some(other) => {
                    return Err(TransportError::MalformedQuoting(format!(
                        "unsupported escape sequence \\{other}"
                    )))
                }
                None => {
                    return Err(TransportError::MalformedQuoting(
                        "dangling escape at end of argument".to_string(),
                    ))
                }
            },
            '"' => {
                return Err(TransportError::MalformedQuoting(
                    "unescaped quote inside argument".to_string(),
                ))
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_and_local_id() {
        let msg = TransportMessage::new("packet:abcd-xyz", "");
        assert_eq!(msg.namespace(), "packet");
        assert_eq!(msg.local_id(), "abcd-xyz");

        let bare = TransportMessage::new("loaded", "");
        assert_eq!(bare.namespace(), "");
        assert_eq!(bare.local_id(), "loaded");
    }

    #[test]
    fn quote_escapes_backslashes_and_quotes() {
        assert_eq!(quote_argument(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(quote_argument(""), r#""""#);
    }

    #[test]
    fn unquote_reverses_quote() {
        for raw in ["", "plain", r#"\"#, r#"""#, r#"mixed \" and \\ ""#, "ĀāĂ ÿ ~"] {
            assert_eq!(unquote_argument(&quote_argument(raw)).unwrap(), raw);
        }
    }

    #[test]
    fn unquote_rejects_malformed_input() {
        assert!(matches!(
            unquote_argument("no-quotes"),
            Err(TransportError::MalformedQuoting(_))
        ));
        assert!(matches!(
            unquote_argument(r#""dangling\""#),
            Err(TransportError::MalformedQuoting(_))
        ));
        assert!(matches!(
            unquote_argument(r#""a"b""#),
            Err(TransportError::MalformedQuoting(_))
        ));
        assert!(matches!(
            unquote_argument(r#""\n""#),
            Err(TransportError::MalformedQuoting(_))
        ));
    }

    #[test]
    fn display_quotes_the_id() {
        let msg = TransportMessage::new("registry:register", "Pos !!!!");
        assert_eq!(msg.to_string(), r#""registry:register" Pos !!!!"#);
    }
}
