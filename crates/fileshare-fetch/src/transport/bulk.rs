use std::sync::Arc;

use tracing::debug;

use super::{Signal, SignalSender, Transport, TransportCore, pump};
use crate::error::TransportError;
use crate::net::HttpClient;
use crate::range::ByteRange;
use crate::source::TransportKind;

/// Range the server granted, from the response status and `Content-Range`.
///
/// A partial response without a `Content-Range` is taken as the full payload.
pub fn granted_range(status: u16, content_range: Option<&str>) -> Result<ByteRange, TransportError> {
    match status {
        206 => match content_range {
            Some(value) if !value.trim().is_empty() => ByteRange::parse_content_range(value),
            _ => Ok(ByteRange::FULL),
        },
        200 | 203 => Ok(ByteRange::FULL),
        other => Err(TransportError::status(format!("unexpected HTTP status: {other}"))),
    }
}

/// Single-request transfer over HTTP(S) or FTP.
pub struct BulkTransport {
    core:   TransportCore,
    uri:    String,
    client: Arc<dyn HttpClient>,
}

impl BulkTransport {
    pub fn new(uri: impl Into<String>, client: Arc<dyn HttpClient>) -> Self {
        Self { core: TransportCore::new(), uri: uri.into(), client }
    }
}

impl Transport for BulkTransport {
    fn kind(&self) -> TransportKind { TransportKind::Bulk }

    fn core(&self) -> &TransportCore { &self.core }

    fn core_mut(&mut self) -> &mut TransportCore { &mut self.core }

    fn start(&mut self, signals: SignalSender) {
        self.core.begin();

        let requested = self.core.range();
        let mut headers = Vec::new();
        if requested.is_ranged() {
            match requested.to_request_header() {
                Ok(value) => headers.push(("Range".to_string(), value)),
                Err(error) => {
                    signals.send(Signal::Error(error));
                    return;
                }
            }
        }
        debug!(uri = %self.uri, range = ?requested, "starting bulk transfer");

        let request = self.client.get(&self.uri, &headers);
        self.core.spawn(signals.clone(), async move {
            let response = match request.await {
                Ok(response) => response,
                Err(error) => {
                    signals.send(Signal::Error(error));
                    return;
                }
            };
            match granted_range(response.status, response.content_range.as_deref()) {
                Ok(range) => {
                    signals.send(Signal::Metadata(range));
                }
                Err(error) => {
                    signals.send(Signal::Error(error));
                    return;
                }
            }
            pump(response.body, &signals).await;
        });
    }

    fn abort(&mut self, _failure: bool, _reason: &str) { self.core.release(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn full_responses() {
        assert_eq!(granted_range(200, None).unwrap(), ByteRange::FULL);
        assert_eq!(granted_range(203, Some("bytes 0-9/10")).unwrap(), ByteRange::FULL);
    }

    #[test]
    fn partial_response_uses_granted_range() {
        assert_eq!(granted_range(206, Some("bytes 0-999/1000")).unwrap(), ByteRange::new(0, 1000));
        assert_eq!(granted_range(206, None).unwrap(), ByteRange::FULL);
    }

    #[test]
    fn malformed_partial_response_is_fatal() {
        let err = granted_range(206, Some("bytes nonsense")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProtocolViolation);
    }

    #[test]
    fn other_status_carries_code() {
        let err = granted_range(404, None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransportStatus);
        assert!(err.message.contains("404"));
    }
}
