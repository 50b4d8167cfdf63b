//! Update payloads pushed from the producer to every viewer.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Reasons a producer submission is refused before it reaches the hub.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("submission body is empty")]
    Empty,

    #[error("submission is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("text submission is not valid UTF-8")]
    NotUtf8,
}

/// How a payload is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// UTF-8 content (HTML documents, plot fragments).
    Text,
    /// Opaque bytes.
    Binary,
}

/// One rendering to display.
///
/// Cloning is cheap: the body is reference counted, so fan-out to many
/// sessions shares a single allocation.
#[derive(Debug, Clone)]
pub struct Payload {
    body: Bytes,
    kind: PayloadKind,
    received_at: DateTime<Utc>,
}

impl Payload {
    /// Build a text payload.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: Bytes::from(body.into()),
            kind: PayloadKind::Text,
            received_at: Utc::now(),
        }
    }

    /// Build a binary payload.
    pub fn binary(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            kind: PayloadKind::Binary,
            received_at: Utc::now(),
        }
    }

    /// Validate a raw producer submission.
    ///
    /// Bodies declared as text (any `text/*` content type, or none at all) must
    /// be valid UTF-8 and are pushed as text frames. Everything else is pushed
    /// as binary.
    pub fn from_submission(
        body: Bytes,
        content_type: Option<&str>,
        limit: usize,
    ) -> Result<Self, PayloadError> {
        if body.is_empty() {
            return Err(PayloadError::Empty);
        }
        if body.len() > limit {
            return Err(PayloadError::TooLarge {
                size: body.len(),
                limit,
            });
        }

        if is_textual(content_type) {
            std::str::from_utf8(&body).map_err(|_| PayloadError::NotUtf8)?;
            Ok(Self {
                body,
                kind: PayloadKind::Text,
                received_at: Utc::now(),
            })
        } else {
            Ok(Self::binary(body))
        }
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// The body as text, when this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            PayloadKind::Text => std::str::from_utf8(&self.body).ok(),
            PayloadKind::Binary => None,
        }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Time since the payload was accepted.
    pub fn age(&self) -> Duration {
        Utc::now() - self.received_at
    }
}

fn is_textual(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let mime = ct
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            mime.is_empty()
                || mime.starts_with("text/")
                || mime == "application/javascript"
                || mime == "application/json"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_submission_is_text() {
        let payload = Payload::from_submission(
            Bytes::from_static(b"<html></html>"),
            Some("text/html; charset=utf-8"),
            1024,
        )
        .unwrap();
        assert_eq!(payload.kind(), PayloadKind::Text);
        assert_eq!(payload.as_text(), Some("<html></html>"));
    }

    #[test]
    fn test_content_type_is_case_insensitive() {
        for content_type in ["Text/HTML", "TEXT/plain; charset=UTF-8", "Application/JSON"] {
            let payload =
                Payload::from_submission(Bytes::from_static(b"{}"), Some(content_type), 1024)
                    .unwrap();
            assert_eq!(payload.kind(), PayloadKind::Text, "{content_type}");
        }
    }

    #[test]
    fn test_missing_content_type_defaults_to_text() {
        let payload =
            Payload::from_submission(Bytes::from_static(b"plot-v1"), None, 1024).unwrap();
        assert_eq!(payload.kind(), PayloadKind::Text);
    }

    #[test]
    fn test_empty_submission_rejected() {
        let err = Payload::from_submission(Bytes::new(), None, 1024).unwrap_err();
        assert_eq!(err, PayloadError::Empty);
    }

    #[test]
    fn test_oversized_submission_rejected() {
        let err = Payload::from_submission(Bytes::from(vec![b'a'; 11]), None, 10).unwrap_err();
        assert_eq!(err, PayloadError::TooLarge { size: 11, limit: 10 });
    }

    #[test]
    fn test_invalid_utf8_text_rejected() {
        let err = Payload::from_submission(
            Bytes::from_static(&[0xff, 0xfe, 0x00]),
            Some("text/plain"),
            1024,
        )
        .unwrap_err();
        assert_eq!(err, PayloadError::NotUtf8);
    }

    #[test]
    fn test_octet_stream_is_binary() {
        let payload = Payload::from_submission(
            Bytes::from_static(&[0xff, 0xfe, 0x00]),
            Some("application/octet-stream"),
            1024,
        )
        .unwrap();
        assert_eq!(payload.kind(), PayloadKind::Binary);
        assert!(payload.as_text().is_none());
        assert_eq!(payload.len(), 3);
    }

    #[test]
    fn test_age_counts_from_receipt() {
        let payload = Payload::text("plot");
        assert!(payload.received_at() <= Utc::now());
        assert!(payload.age() >= Duration::zero());
    }

    #[test]
    fn test_clone_shares_body() {
        let payload = Payload::text("shared");
        let copy = payload.clone();
        assert_eq!(payload.bytes().as_ptr(), copy.bytes().as_ptr());
    }
}
