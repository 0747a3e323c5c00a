//! REST transport over reqwest

use super::{Method, RequestBody, Transport, TransportRequest, TransportResponse};
use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;
use url::Url;

/// HTTP transport rotating requests across the configured nodes
///
/// Every node is registered at construction. Each request goes to the
/// next node in turn and is attempted exactly once.
pub struct HttpTransport {
    client: Client,
    nodes: Vec<Url>,
    next: AtomicUsize,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let nodes = config.node_urls()?;

        let client = Client::builder()
            .connect_timeout(config.transport.connect_timeout())
            .timeout(config.transport.request_timeout())
            .build()?;

        Ok(Self {
            client,
            nodes,
            next: AtomicUsize::new(0),
        })
    }

    pub fn nodes(&self) -> &[Url] {
        &self.nodes
    }

    fn pick_node(&self) -> &Url {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.nodes.len();
        &self.nodes[i]
    }

    fn build_url(node: &Url, segments: &[String]) -> Result<Url> {
        let mut url = node.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("node '{}' cannot be a base URL", node)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let node = self.pick_node();
        let url = Self::build_url(node, &request.segments)?;
        debug!(method = request.method.as_str(), url = %url, "sending request");

        let mut builder = self.client.request(Self::method(request.method), url);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        builder = match request.body {
            Some(RequestBody::Json(body)) => builder.json(&body),
            Some(RequestBody::NdJson(body)) => builder
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(body),
            None => builder,
        };

        let failed = |e: reqwest::Error| Error::Transport(format!("{}: {}", node, e));
        let response = builder.send().await.map_err(failed)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(failed)?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(TransportResponse { status, body })
    }

    fn describe(&self) -> String {
        self.nodes
            .iter()
            .map(|u| u.as_str().trim_end_matches('/'))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_escapes_segments() {
        let node = Url::parse("http://es1:9200/").unwrap();
        let url = HttpTransport::build_url(
            &node,
            &["news".to_string(), "article".to_string(), "a b/c".to_string()],
        )
        .unwrap();
        assert_eq!(url.as_str(), "http://es1:9200/news/article/a%20b%2Fc");
    }

    #[test]
    fn test_build_url_root() {
        let node = Url::parse("http://es1:9200/").unwrap();
        let url = HttpTransport::build_url(&node, &[]).unwrap();
        assert_eq!(url.as_str(), "http://es1:9200/");
    }

    #[test]
    fn test_round_robin() {
        let config = Config::with_nodes("c", ["es1:9200", "es2:9200"]);
        let transport = HttpTransport::new(&config).unwrap();
        let first = transport.pick_node().clone();
        let second = transport.pick_node().clone();
        let third = transport.pick_node().clone();
        assert_ne!(first, second);
        assert_eq!(first, third);
        assert_eq!(transport.describe(), "http://es1:9200,http://es2:9200");
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(&Config::with_nodes("c", [addr.to_string()])).unwrap();
        let err = transport
            .send(TransportRequest::new(Method::Get, Vec::<String>::new()))
            .await
            .unwrap_err();

        assert!(matches!(&err, Error::Transport(reason) if reason.contains(&addr.to_string())));
        assert!(err.is_transport_failure());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = Config::with_nodes("c", Vec::<String>::new());
        assert!(HttpTransport::new(&config).is_err());
    }
}
