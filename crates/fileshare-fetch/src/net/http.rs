use bytes::Bytes;
use futures_util::future::BoxFuture;

use super::BoxStream;
use crate::error::TransportError;

/// Response head plus streaming body of a bulk transfer request.
pub struct HttpResponse {
    pub status:        u16,
    /// Raw `Content-Range` header, if the server sent one.
    pub content_range: Option<String>,
    pub body:          BoxStream<'static, Result<Bytes, TransportError>>,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_range", &self.content_range)
            .field("body", &"{ ... }")
            .finish()
    }
}

/// Asynchronous bulk transfer client.
///
/// Implementations own redirect handling and must not follow a redirect to a
/// less secure scheme than the one requested. The returned future must not
/// borrow the client so it can be driven from a spawned task.
pub trait HttpClient: Send + Sync {
    /// Issue a GET for `url` with extra request `headers`.
    ///
    /// Connection-level failures resolve to an error; any HTTP status,
    /// including error statuses, resolves to a response.
    fn get(&self, url: &str, headers: &[(String, String)]) -> BoxFuture<'static, Result<HttpResponse, TransportError>>;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use futures_util::StreamExt;
    use reqwest::redirect::{Attempt, Policy};

    use super::*;

    const MAX_REDIRECTS: usize = 10;

    /// Production client backed by `reqwest`.
    #[derive(Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    fn no_less_safe(attempt: Attempt) -> reqwest::redirect::Action {
        let downgrade = attempt
            .previous()
            .last()
            .is_some_and(|prev| prev.scheme() == "https" && attempt.url().scheme() != "https");
        if downgrade {
            attempt.stop()
        } else if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    }

    fn map_error(e: reqwest::Error) -> TransportError {
        if e.is_connect() || e.is_timeout() {
            TransportError::unreachable(e.to_string())
        } else {
            TransportError::status(e.to_string())
        }
    }

    impl ReqwestClient {
        pub fn new() -> Result<Self, TransportError> {
            let client = reqwest::Client::builder()
                .redirect(Policy::custom(no_less_safe))
                .build()
                .map_err(map_error)?;
            Ok(Self { client })
        }

        pub fn with_client(client: reqwest::Client) -> Self { Self { client } }
    }

    impl HttpClient for ReqwestClient {
        fn get(&self, url: &str, headers: &[(String, String)]) -> BoxFuture<'static, Result<HttpResponse, TransportError>> {
            let mut request = self.client.get(url);
            for (key, value) in headers {
                request = request.header(key.as_str(), value.as_str());
            }

            Box::pin(async move {
                let response = request.send().await.map_err(map_error)?;
                let status = response.status().as_u16();
                let content_range = response
                    .headers()
                    .get(reqwest::header::CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let body = response.bytes_stream().map(|chunk| chunk.map_err(map_error));
                Ok(HttpResponse { status, content_range, body: Box::pin(body) })
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
