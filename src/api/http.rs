//! HTTP/JSON metrics backend client

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{EndpointsClient, EventStream, MetricsClient, TapClient};
use crate::error::{MeshError, Result};
use crate::models::{Endpoint, ResourceRef, Row, TapEvent};
use crate::request::{MetricRequest, RequestKind, TapRequest, TrafficFilter};

/// Client for the metrics API's `/api/v1` endpoints
///
/// Batch queries are answered with a JSON envelope; tap subscriptions are
/// streamed back as newline-delimited JSON.
#[derive(Clone)]
pub struct HttpMetricsClient {
    client: reqwest::Client,
    base: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireResource<'a> {
    kind: &'static str,
    namespace: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

impl<'a> From<&'a ResourceRef> for WireResource<'a> {
    fn from(r: &'a ResourceRef) -> Self {
        Self {
            kind: r.kind.as_str(),
            namespace: &r.namespace,
            name: r.name.as_deref(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricQuery<'a> {
    resource: WireResource<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_resource: Option<WireResource<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_resource: Option<WireResource<'a>>,
    time_window: &'a str,
    all_namespaces: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TapQuery<'a> {
    resource: WireResource<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_resource: Option<WireResource<'a>>,
    max_rps: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path_prefix: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authority: Option<&'a str>,
}

#[derive(Deserialize)]
struct RowsResponse {
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpMetricsClient {
    /// Create a client for the API at `address` (`http://host:port`)
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(address).map_err(|e| {
            MeshError::InvalidArgument(format!("invalid API address \"{}\": {}", address, e))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(MeshError::InvalidArgument(format!(
                "API address must use http or https (got \"{}\")",
                base.scheme()
            )));
        }
        // Url::join replaces the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        // Only the connect phase is bounded; tap responses stream indefinitely
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| MeshError::Backend(format!("failed to create HTTP client: {}", e)))?;

        tracing::debug!("Created metrics API client for {}", base);
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| MeshError::Backend(format!("invalid endpoint {}: {}", path, e)))
    }

    async fn send(&self, req: reqwest::RequestBuilder, url: &Url) -> Result<reqwest::Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| MeshError::Backend(format!("request to {} failed: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(MeshError::Backend(format!(
                "{} returned {}",
                url,
                resp.status()
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl MetricsClient for HttpMetricsClient {
    async fn fetch(&self, request: &MetricRequest) -> Result<Vec<Row>> {
        let path = match request.kind {
            RequestKind::Stats => "api/v1/stat",
            RequestKind::Edges => "api/v1/edges",
            RequestKind::Routes => "api/v1/routes",
        };
        let url = self.endpoint(path)?;

        let (to_resource, from_resource) = match &request.filter {
            Some(TrafficFilter::To(r)) => (Some(r.into()), None),
            Some(TrafficFilter::From(r)) => (None, Some(r.into())),
            None => (None, None),
        };
        let query = MetricQuery {
            resource: (&request.target).into(),
            to_resource,
            from_resource,
            time_window: &request.time_window,
            all_namespaces: request.all_namespaces,
        };

        tracing::debug!("Fetching {} for {}", request.kind, request.target);
        let resp = self
            .send(self.client.post(url.clone()).json(&query), &url)
            .await?;
        let body: RowsResponse = resp
            .json()
            .await
            .map_err(|e| MeshError::Backend(format!("failed to decode {}: {}", url, e)))?;

        match body.error {
            Some(msg) => Err(MeshError::Backend(msg)),
            None => Ok(body.rows),
        }
    }
}

#[async_trait]
impl TapClient for HttpMetricsClient {
    async fn tap(&self, request: &TapRequest) -> Result<EventStream> {
        let url = self.endpoint("api/v1/tap")?;
        let query = TapQuery {
            resource: (&request.target).into(),
            to_resource: request.to.as_ref().map(Into::into),
            max_rps: request.max_rps,
            method: request.method.as_deref(),
            path_prefix: request.path_prefix.as_deref(),
            authority: request.authority.as_deref(),
        };

        tracing::debug!("Opening tap stream for {}", request.target);
        let resp = self
            .send(self.client.post(url.clone()).json(&query), &url)
            .await?;
        Ok(ndjson_events(resp.bytes_stream()))
    }
}

#[async_trait]
impl EndpointsClient for HttpMetricsClient {
    async fn endpoints(&self, authority: &str) -> Result<Vec<Endpoint>> {
        let mut url = self.endpoint("api/v1/endpoints")?;
        url.query_pairs_mut().append_pair("authority", authority);

        let resp = self.send(self.client.get(url.clone()), &url).await?;
        resp.json()
            .await
            .map_err(|e| MeshError::Backend(format!("failed to decode {}: {}", url, e)))
    }
}

/// Split a byte stream into newline-delimited tap events
///
/// A transport error ends the stream after yielding it. A trailing line
/// without a newline is still decoded at end of input.
fn ndjson_events<S, E>(bytes: S) -> EventStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = (Box::pin(bytes), BytesMut::new(), false);
    Box::pin(futures::stream::unfold(
        state,
        |(mut bytes, mut buf, mut done)| async move {
            loop {
                if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line = buf.split_to(pos + 1);
                    if is_blank(&line) {
                        continue;
                    }
                    return Some((decode_event(&line), (bytes, buf, done)));
                }

                if done {
                    if is_blank(&buf) {
                        return None;
                    }
                    let line = buf.split();
                    return Some((decode_event(&line), (bytes, buf, done)));
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        buf.clear();
                        let err = MeshError::StreamTerminated(e.to_string());
                        return Some((Err(err), (bytes, buf, true)));
                    }
                    None => done = true,
                }
            }
        },
    ))
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn decode_event(line: &[u8]) -> Result<TapEvent> {
    serde_json::from_slice(line)
        .map_err(|e| MeshError::Backend(format!("malformed tap event: {}", e)))
}
