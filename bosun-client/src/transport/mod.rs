//! The shared HTTP transport dispatching requests to the API server.
//!
//! A [`Transport`] is built once per [`ApiGroup`][crate::ApiGroup] from the
//! group's resolved TLS and auth material, and is safe for concurrent use:
//! cloning is cheap and independent requests dispatch in parallel.
//!
//! Every response is translated at this choke point: non-success statuses
//! become [`Error::Api`], connection failures become [`Error::Transport`],
//! and malformed bodies become [`Error::Decode`]. Nothing is retried.
mod body;
mod tls;

use std::time::Duration;

use bytes::Bytes;
use either::{Either, Left, Right};
use futures::{future::BoxFuture, Stream, StreamExt, TryStreamExt};
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper_timeout::TimeoutConnector;
use hyper_util::{client::legacy::connect::HttpConnector, rt::TokioExecutor};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::{
    codec::{FramedRead, LinesCodec, LinesCodecError},
    io::StreamReader,
};
use tower::{buffer::Buffer, util::BoxService, BoxError, Layer, Service, ServiceBuilder, ServiceExt};
use tower_http::{
    auth::AddAuthorizationLayer, classify::ServerErrorsFailureClass, map_response_body::MapResponseBodyLayer,
    trace::TraceLayer,
};
use tracing::Span;

use crate::{
    config::{AuthMode, ClusterConfig},
    error::{ConfigError, DecodeError, Error, Result, TransportError},
};
use bosun_core::{response::Status, watch::WatchEvent, ErrorResponse};

pub use body::Body;
use body::BodyDataStream;

/// The shared transport of one API group.
///
/// Internally a buffered, type-erased tower service over a pooled HTTP
/// client, so clones share one connection pool and may be driven from many
/// tasks at once.
#[derive(Clone)]
pub struct Transport {
    // - `Buffer` for cheap clone and concurrent readiness
    // - `BoxService` for a dynamic response future type
    inner: Buffer<Request<Body>, BoxFuture<'static, std::result::Result<Response<Body>, BoxError>>>,
}

impl Transport {
    /// Create a [`Transport`] from a custom `Service` stack.
    ///
    /// To get the default stack for a cluster, use
    /// [`Transport::try_from`] with a [`ClusterConfig`].
    pub fn new<S, B>(service: S) -> Self
    where
        S: Service<Request<Body>, Response = Response<B>> + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<BoxError>,
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        // Erase the response body and error types so the handle stays simple.
        let service = MapResponseBodyLayer::new(Body::wrap_body)
            .layer(service)
            .map_err(|e| e.into());
        Self {
            inner: Buffer::new(BoxService::new(service), 1024),
        }
    }

    /// Perform a raw HTTP request against the API and return the raw response.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        let mut svc = self.inner.clone();
        let res = svc
            .ready()
            .await
            .map_err(|err| Error::Transport(TransportError::Service(err)))?
            .call(request)
            .await
            .map_err(|err| {
                // Error decorating request
                err.downcast::<Error>()
                    .map(|e| *e)
                    // Error requesting
                    .or_else(|err| {
                        err.downcast::<hyper::Error>()
                            .map(|err| Error::Transport(TransportError::Hyper(*err)))
                    })
                    // Error from another middleware
                    .unwrap_or_else(|err| Error::Transport(TransportError::Service(err)))
            })?;
        Ok(res)
    }

    /// Perform a request and deserialize the response as JSON into a known type.
    pub async fn request<T>(&self, request: Request<Vec<u8>>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let text = self.request_text(request).await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::warn!("failed to parse response: {}, {:?}", text, e);
            Error::Decode(DecodeError::Json(e))
        })
    }

    /// Perform a request and get back the response as a string.
    pub async fn request_text(&self, request: Request<Vec<u8>>) -> Result<String> {
        let res = self.send(request.map(Body::from)).await?;
        let status = res.status();
        let body_bytes = res
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::Transport(TransportError::Service(e)))?
            .to_bytes();
        let text = String::from_utf8(body_bytes.to_vec()).map_err(|e| Error::Decode(DecodeError::Utf8(e)))?;
        handle_api_errors(&text, status)?;

        Ok(text)
    }

    /// Perform a request and get back either the expected object or a [`Status`].
    ///
    /// Delete-style calls answer with the deleted object or a status document
    /// depending on timing; both are valid successes.
    pub async fn request_status<T>(&self, request: Request<Vec<u8>>) -> Result<Either<T, Status>>
    where
        T: DeserializeOwned,
    {
        let text = self.request_text(request).await?;
        // It needs to be JSON:
        let v: Value = serde_json::from_str(&text).map_err(|e| Error::Decode(DecodeError::Json(e)))?;
        if v["kind"] == "Status" {
            tracing::trace!("status from {}", text);
            Ok(Right(
                serde_json::from_str::<Status>(&text).map_err(|e| Error::Decode(DecodeError::Json(e)))?,
            ))
        } else {
            Ok(Left(
                serde_json::from_str::<T>(&text).map_err(|e| Error::Decode(DecodeError::Json(e)))?,
            ))
        }
    }

    /// Perform a request and get back a lazy stream of [`WatchEvent`] objects.
    ///
    /// Each newline-delimited frame decodes independently; the stream ends
    /// when the server closes the connection.
    pub async fn request_events<T>(
        &self,
        request: Request<Vec<u8>>,
    ) -> Result<impl Stream<Item = Result<WatchEvent<T>>> + Send>
    where
        T: Clone + DeserializeOwned + Send + 'static,
    {
        let res = self.send(request.map(Body::from)).await?;
        tracing::trace!("streaming response headers: {:?}", res.headers());

        let frames = FramedRead::new(
            StreamReader::new(
                BodyDataStream::new(res.into_body())
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
            ),
            LinesCodec::new(),
        );

        Ok(frames.filter_map(|res| async move {
            match res {
                Ok(line) => match serde_json::from_str::<WatchEvent<T>>(&line) {
                    Ok(event) => Some(Ok(event)),
                    Err(e) => {
                        // Ignore EOF error that can happen for incomplete line from `decode_eof`.
                        if e.is_eof() {
                            return None;
                        }

                        // Got general error response
                        if let Ok(e_resp) = serde_json::from_str::<ErrorResponse>(&line) {
                            return Some(Err(Error::Api(e_resp)));
                        }
                        // Parsing error
                        Some(Err(Error::Decode(DecodeError::Json(e))))
                    }
                },

                Err(LinesCodecError::Io(e)) => match e.kind() {
                    // Client timeout
                    std::io::ErrorKind::TimedOut => {
                        tracing::warn!("timeout in poll: {}", e);
                        None
                    }
                    // Unexpected EOF from chunked decoder.
                    // Tends to happen after 300+s of watching.
                    std::io::ErrorKind::UnexpectedEof => {
                        tracing::warn!("eof in poll: {}", e);
                        None
                    }
                    _ => Some(Err(Error::Transport(TransportError::ReadEvents(e)))),
                },

                // Reached the maximum line length without finding a newline.
                // Cannot happen with the unbounded default.
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    Some(Err(Error::Transport(TransportError::LineLengthExceeded)))
                }
            }
        }))
    }
}

impl TryFrom<&ClusterConfig> for Transport {
    type Error = Error;

    /// Build the default service stack for a cluster: TLS material, timeouts,
    /// static auth headers, and HTTP tracing spans.
    fn try_from(config: &ClusterConfig) -> Result<Self> {
        let client: hyper_util::client::legacy::Client<_, Body> = {
            let mut connector = HttpConnector::new();
            connector.enforce_http(false);

            let rustls_config = tls::rustls_client_config(
                config.identity_pem(),
                config.root_cert.as_deref(),
                config.accept_invalid_certs,
            )?;
            let https = hyper_rustls::HttpsConnectorBuilder::new()
                .with_tls_config(rustls_config)
                .https_or_http()
                .enable_http1()
                .wrap_connector(connector);

            let mut connector = TimeoutConnector::new(https);
            connector.set_connect_timeout(config.connect_timeout);
            connector.set_read_timeout(config.read_timeout);
            connector.set_write_timeout(config.write_timeout);

            hyper_util::client::legacy::Builder::new(TokioExecutor::new()).build(connector)
        };

        let service = ServiceBuilder::new()
            .option_layer(auth_layer(&config.auth)?)
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|req: &Request<Body>| {
                        tracing::debug_span!(
                            "HTTP",
                            http.method = %req.method(),
                            http.url = %req.uri(),
                            http.status_code = tracing::field::Empty,
                        )
                    })
                    .on_response(|res: &Response<Incoming>, _latency: Duration, span: &Span| {
                        span.record("http.status_code", res.status().as_u16());
                    })
                    // Explicitly disable `on_body_chunk`. The default does nothing.
                    .on_body_chunk(())
                    .on_eos(())
                    .on_failure(|ec: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                        match ec {
                            ServerErrorsFailureClass::StatusCode(status) => {
                                tracing::debug!("failed with status {}", status)
                            }
                            ServerErrorsFailureClass::Error(err) => {
                                tracing::debug!("failed with error {}", err)
                            }
                        }
                    }),
            )
            .map_err(BoxError::from)
            .service(client);

        Ok(Self::new(service))
    }
}

// Static `Authorization` headers from the active auth mode.
fn auth_layer(auth: &AuthMode) -> Result<Option<AddAuthorizationLayer>> {
    Ok(match auth {
        AuthMode::Anonymous => None,
        AuthMode::Bearer(token) => {
            let token = token.expose_secret();
            // tower-http would panic on an invalid value; reject it as config instead
            HeaderValue::try_from(format!("Bearer {token}"))
                .map_err(|e| Error::Config(ConfigError::InvalidBearerToken(e)))?;
            Some(AddAuthorizationLayer::bearer(token).as_sensitive(true))
        }
        AuthMode::Basic(user, pass) => {
            Some(AddAuthorizationLayer::basic(user, pass.expose_secret()).as_sensitive(true))
        }
    })
}

/// Server returned error handling
///
/// Either an explicit `ErrorResponse` document, or something we couldn't
/// parse as one; in either case an `Error::Api` is presented upstream.
fn handle_api_errors(text: &str, s: StatusCode) -> Result<()> {
    if s.is_client_error() || s.is_server_error() {
        if let Ok(errdata) = serde_json::from_str::<ErrorResponse>(text) {
            tracing::debug!("unsuccessful: {:?}", errdata);
            Err(Error::Api(errdata))
        } else {
            tracing::warn!("unsuccessful data error parse: {}", text);
            let ae = ErrorResponse {
                status: s.to_string(),
                code: s.as_u16(),
                message: format!("{:?}", text),
                reason: "Failed to parse error data".into(),
                details: None,
            };
            tracing::debug!("unsuccessful: {:?} (reconstruct)", ae);
            Err(Error::Api(ae))
        }
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bosun_core::DynamicObject;
    use futures::pin_mut;
    use tower_test::mock;

    #[tokio::test]
    async fn request_decodes_json_objects() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.method(), http::Method::GET);
            assert_eq!(request.uri().to_string(), "/api/v1/namespaces/default/pods/test");
            let pod = serde_json::json!({
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": { "name": "test" },
            });
            send.send_response(
                Response::builder()
                    .body(Body::from(serde_json::to_vec(&pod).unwrap()))
                    .unwrap(),
            );
        });

        let transport = Transport::new(mock_service);
        let req = Request::get("/api/v1/namespaces/default/pods/test")
            .body(vec![])
            .unwrap();
        let pod: DynamicObject = transport.request(req).await.unwrap();
        assert_eq!(pod.name(), Some("test"));
        spawned.await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_becomes_api_error() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (_request, send) = handle.next_request().await.expect("service not called");
            let status = serde_json::json!({
                "kind": "Status",
                "status": "Failure",
                "message": "pods \"missing\" not found",
                "reason": "NotFound",
                "code": 404
            });
            send.send_response(
                Response::builder()
                    .status(404)
                    .body(Body::from(serde_json::to_vec(&status).unwrap()))
                    .unwrap(),
            );
        });

        let transport = Transport::new(mock_service);
        let req = Request::get("/api/v1/namespaces/default/pods/missing")
            .body(vec![])
            .unwrap();
        let err = transport.request::<DynamicObject>(req).await.unwrap_err();
        match err {
            Error::Api(e) => {
                assert_eq!(e.code, 404);
                assert_eq!(e.reason, "NotFound");
            }
            other => panic!("expected api error, got {other}"),
        }
        spawned.await.unwrap();
    }

    #[tokio::test]
    async fn unparseable_error_body_is_reconstructed() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (_request, send) = handle.next_request().await.expect("service not called");
            send.send_response(
                Response::builder()
                    .status(500)
                    .body(Body::from(b"backend exploded".to_vec()))
                    .unwrap(),
            );
        });

        let transport = Transport::new(mock_service);
        let req = Request::get("/api/v1/nodes").body(vec![]).unwrap();
        let err = transport.request::<DynamicObject>(req).await.unwrap_err();
        match err {
            Error::Api(e) => assert_eq!(e.code, 500),
            other => panic!("expected api error, got {other}"),
        }
        spawned.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_decode_error() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (_request, send) = handle.next_request().await.expect("service not called");
            send.send_response(
                Response::builder()
                    .body(Body::from(b"not json at all".to_vec()))
                    .unwrap(),
            );
        });

        let transport = Transport::new(mock_service);
        let req = Request::get("/api/v1/nodes").body(vec![]).unwrap();
        let err = transport.request::<DynamicObject>(req).await.unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::Json(_))));
        spawned.await.unwrap();
    }

    #[tokio::test]
    async fn watch_stream_decodes_lines_independently() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (_request, send) = handle.next_request().await.expect("service not called");
            let lines = concat!(
                r#"{"type":"ADDED","object":{"apiVersion":"v1","kind":"Pod","metadata":{"name":"p1","resourceVersion":"1"}}}"#,
                "\n",
                r#"{"type":"MODIFIED","object":{"apiVersion":"v1","kind":"Pod","metadata":{"name":"p1","resourceVersion":"2"}}}"#,
                "\n",
                r#"{"status":"Failure","message":"too old resource version","reason":"Expired","code":410}"#,
                "\n",
            );
            send.send_response(
                Response::builder()
                    .body(Body::from(lines.as_bytes().to_vec()))
                    .unwrap(),
            );
        });

        let transport = Transport::new(mock_service);
        let req = Request::get("/api/v1/pods?watch=true").body(vec![]).unwrap();
        let stream = transport
            .request_events::<DynamicObject>(req)
            .await
            .unwrap();
        pin_mut!(stream);

        match stream.next().await.unwrap().unwrap() {
            WatchEvent::Added(obj) => assert_eq!(obj.resource_version(), Some("1")),
            other => panic!("unexpected event {other:?}"),
        }
        match stream.next().await.unwrap().unwrap() {
            WatchEvent::Modified(obj) => assert_eq!(obj.resource_version(), Some("2")),
            other => panic!("unexpected event {other:?}"),
        }
        match stream.next().await.unwrap().unwrap_err() {
            Error::Api(e) => assert_eq!(e.code, 410),
            other => panic!("expected api error, got {other}"),
        }
        assert!(stream.next().await.is_none());
        spawned.await.unwrap();
    }

    #[tokio::test]
    async fn default_stack_builds_from_config() {
        let config = ClusterConfig::new("https://localhost:6443".parse().unwrap());
        Transport::try_from(&config).unwrap();
    }
}
