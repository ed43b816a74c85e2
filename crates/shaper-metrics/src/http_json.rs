//! HTTP JSON metrics backend.
//!
//! A deliberately small wire contract, used to drive the controller
//! deterministically without a live cloud dependency:
//!
//! ```text
//! GET <endpoint>?resource=<id>
//!   200 {"value": <float>}  → sample
//!   204                     → MetricsError::NoData
//!   other non-2xx           → MetricsError::Backend (body kept, truncated)
//!   200 <unparsable>        → MetricsError::Decode ("decode payload: ...")
//! ```
//!
//! Each query opens a fresh HTTP/1.1 connection; the cadence is tens of
//! seconds so pooling buys nothing.

use bytes::Bytes;
use http::header::{ACCEPT, HOST, USER_AGENT};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tracing::debug;

use shaper_core::{CallContext, ResourceId, UtilizationSample};

use crate::error::{MetricsError, MetricsResult};
use crate::source::{MetricsFuture, MetricsSource};

const CLIENT_AGENT: &str = concat!("cpushaper/", env!("CARGO_PKG_VERSION"));

/// Wire shape of a successful response.
#[derive(Debug, Deserialize)]
struct SamplePayload {
    value: f64,
}

/// Parsed endpoint: where to connect and what to ask for.
#[derive(Debug, Clone)]
struct Endpoint {
    /// `host:port` to dial.
    address: String,
    /// Value of the `Host` header.
    authority: String,
    /// Request path without query.
    path: String,
}

impl Endpoint {
    fn parse(raw: &str) -> MetricsResult<Self> {
        let uri: Uri = raw
            .parse()
            .map_err(|e| MetricsError::InvalidEndpoint(format!("{raw}: {e}")))?;

        if uri.scheme_str() != Some("http") {
            return Err(MetricsError::InvalidEndpoint(format!(
                "{raw}: only http:// endpoints are supported"
            )));
        }

        let authority = uri
            .authority()
            .ok_or_else(|| MetricsError::InvalidEndpoint(format!("{raw}: missing host")))?;
        let port = authority.port_u16().unwrap_or(80);

        Ok(Self {
            address: format!("{}:{port}", authority.host()),
            authority: authority.as_str().to_string(),
            path: match uri.path() {
                "" => "/".to_string(),
                p => p.to_string(),
            },
        })
    }

    fn request_target(&self, resource: &ResourceId) -> String {
        format!(
            "{}?resource={}",
            self.path,
            urlencoding::encode(resource.as_str())
        )
    }
}

/// Metrics source backed by the HTTP JSON wire contract.
#[derive(Debug, Clone, Default)]
pub struct HttpMetricsSource {
    endpoint: Option<Endpoint>,
}

impl HttpMetricsSource {
    /// Build a source for `endpoint` (e.g. `http://127.0.0.1:9100/p95`).
    pub fn new(endpoint: &str) -> MetricsResult<Self> {
        Ok(Self {
            endpoint: Some(Endpoint::parse(endpoint)?),
        })
    }

    /// A source with no transport; every query fails with
    /// [`MetricsError::NotInitialized`].
    pub fn uninitialized() -> Self {
        Self::default()
    }

    async fn fetch(&self, endpoint: &Endpoint, resource: &ResourceId) -> MetricsResult<UtilizationSample> {
        let target = endpoint.request_target(resource);

        let stream = tokio::net::TcpStream::connect(&endpoint.address)
            .await
            .map_err(|e| MetricsError::Transport(format!("connect {}: {e}", endpoint.address)))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| MetricsError::Transport(format!("handshake {}: {e}", endpoint.address)))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "metrics connection closed with error");
            }
        });

        let req = Request::builder()
            .method(Method::GET)
            .uri(&target)
            .header(HOST, &endpoint.authority)
            .header(USER_AGENT, CLIENT_AGENT)
            .header(ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| MetricsError::Transport(format!("build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| MetricsError::Transport(format!("GET {target}: {e}")))?;

        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| MetricsError::Transport(format!("read body: {e}")))?
            .to_bytes();

        debug!(%resource, %status, bytes = body.len(), "metrics backend responded");
        decode_response(status, &body)
    }
}

impl MetricsSource for HttpMetricsSource {
    fn query_p95_cpu<'a>(
        &'a self,
        ctx: &'a CallContext,
        resource: &'a ResourceId,
    ) -> MetricsFuture<'a> {
        Box::pin(async move {
            let endpoint = self.endpoint.as_ref().ok_or(MetricsError::NotInitialized)?;
            let sample = ctx.run(self.fetch(endpoint, resource)).await??;
            Ok::<_, MetricsError>(sample)
        })
    }
}

/// Map a backend response onto the wire contract.
fn decode_response(status: StatusCode, body: &[u8]) -> MetricsResult<UtilizationSample> {
    if status == StatusCode::NO_CONTENT {
        return Err(MetricsError::NoData);
    }
    if !status.is_success() {
        return Err(MetricsError::backend(
            status.as_u16(),
            &String::from_utf8_lossy(body),
        ));
    }

    let payload: SamplePayload =
        serde_json::from_slice(body).map_err(|e| MetricsError::Decode(e.to_string()))?;
    Ok(UtilizationSample::new(payload.value))
}
