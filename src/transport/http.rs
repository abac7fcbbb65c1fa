//! HTTP transport for the enrollment agent endpoint
//!
//! [`HttpAgentTransport`] POSTs `{"message": ...}` to the configured
//! endpoint and expects `{"response": ...}` back. A bearer token is fetched
//! from the [`IdentityProvider`] on every call and attached as
//! `Authorization: Bearer <token>`; when the provider has no token (nobody
//! is signed in) the request goes out without a credential and the server
//! decides.
//!
//! Status handling:
//!
//! - `2xx` with a valid body -- the `response` text is returned
//! - `401` / `403` -- `EnrollchatError::Authentication`
//! - any other non-success -- `EnrollchatError::AgentStatus`
//! - `2xx` with an unparsable body -- `EnrollchatError::MalformedResponse`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::IdentityProvider;
use crate::config::AgentEndpointConfig;
use crate::error::{EnrollchatError, Result};
use crate::transport::{AgentTransport, ChatRequest, ChatResponse};

/// Longest slice of an error body kept for diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Authenticated JSON transport to the agent endpoint.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use enrollchat::auth::NoIdentity;
/// use enrollchat::transport::HttpAgentTransport;
///
/// let transport = HttpAgentTransport::new(
///     url::Url::parse("http://localhost:8000/api/agent/chat").unwrap(),
///     Arc::new(NoIdentity),
///     Duration::from_secs(30),
/// )
/// .unwrap();
/// ```
#[derive(Debug)]
pub struct HttpAgentTransport {
    http_client: reqwest::Client,
    endpoint: url::Url,
    identity: Arc<dyn IdentityProvider>,
}

impl HttpAgentTransport {
    /// Construct a transport targeting `endpoint`.
    ///
    /// The `timeout` applies to each individual HTTP request. No network I/O
    /// is performed at construction time.
    ///
    /// # Errors
    ///
    /// Returns `EnrollchatError::Http` if the HTTP client cannot be built
    /// (TLS initialisation failure).
    pub fn new(
        endpoint: url::Url,
        identity: Arc<dyn IdentityProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(EnrollchatError::Http)?;

        Ok(Self {
            http_client,
            endpoint,
            identity,
        })
    }

    /// Construct a transport from the `agent` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid or the client cannot
    /// be built.
    pub fn from_config(
        config: &AgentEndpointConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        Self::new(
            config.endpoint_url()?,
            identity,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    /// Endpoint this transport posts to.
    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    async fn bearer_token(&self) -> Result<Option<String>> {
        let token = self.identity.fresh_token().await?;
        if token.is_none() {
            tracing::debug!("No signed-in identity; sending without credentials");
        }
        Ok(token)
    }
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    async fn send(&self, message: &str) -> Result<String> {
        let mut req = self
            .http_client
            .post(self.endpoint.as_str())
            .header("Accept", "application/json")
            .json(&ChatRequest {
                message: message.to_string(),
            });

        if let Some(token) = self.bearer_token().await? {
            req = req.bearer_auth(token);
        }

        let response = req.send().await.map_err(EnrollchatError::Http)?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(EnrollchatError::Authentication(format!(
                "agent endpoint rejected credentials (HTTP {})",
                status.as_u16()
            ))
            .into());
        }

        let body = response.text().await.map_err(EnrollchatError::Http)?;

        if !status.is_success() {
            return Err(EnrollchatError::AgentStatus {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY_CHARS),
            }
            .into());
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            EnrollchatError::MalformedResponse(format!(
                "{} (body: {})",
                e,
                truncate(&body, MAX_ERROR_BODY_CHARS)
            ))
        })?;

        Ok(parsed.response)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockIdentityProvider;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer, identity: MockIdentityProvider) -> HttpAgentTransport {
        HttpAgentTransport::new(
            url::Url::parse(&format!("{}/api/agent/chat", server.uri())).unwrap(),
            Arc::new(identity),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn signed_in(token: &'static str) -> MockIdentityProvider {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_fresh_token()
            .returning(move || Ok(Some(token.to_string())));
        identity
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("수강신청에이전트", 4), "수강신청...");
    }

    #[tokio::test]
    async fn test_send_posts_message_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/agent/chat"))
            .and(header("Authorization", "Bearer tok-1"))
            .and(body_json(serde_json::json!({ "message": "book CS101" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "response": "Enrolled in CS101." })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server, signed_in("tok-1"));
        let reply = transport.send("book CS101").await.unwrap();
        assert_eq!(reply, "Enrolled in CS101.");
    }

    #[tokio::test]
    async fn test_send_mints_token_on_every_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "response": "ok" })),
            )
            .mount(&server)
            .await;

        // One provider read per request; the identity query is not needed.
        let mut identity = MockIdentityProvider::new();
        identity.expect_current_identity().never();
        identity
            .expect_fresh_token()
            .times(2)
            .returning(|| Ok(Some("tok".to_string())));

        let transport = transport_for(&server, identity);
        transport.send("one").await.unwrap();
        transport.send("two").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_without_identity_skips_token_and_header() {
        let server = MockServer::start().await;
        // Mounted first so it wins if the header is present.
        Mock::given(method("POST"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "response": "hi" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut identity = MockIdentityProvider::new();
        identity.expect_current_identity().never();
        identity.expect_fresh_token().times(1).returning(|| Ok(None));

        let transport = transport_for(&server, identity);
        assert_eq!(transport.send("hello").await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_send_token_failure_is_error_and_sends_nothing() {
        let server = MockServer::start().await;
        let mut identity = MockIdentityProvider::new();
        identity.expect_fresh_token().returning(|| {
            Err(EnrollchatError::Authentication("mint failed".to_string()).into())
        });

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let transport = transport_for(&server, identity);
        assert!(transport.send("hello").await.is_err());
    }

    #[tokio::test]
    async fn test_send_maps_unauthorized_to_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let transport = transport_for(&server, signed_in("stale"));
        let err = transport.send("hello").await.unwrap_err();
        let err = err.downcast::<EnrollchatError>().unwrap();
        assert!(matches!(err, EnrollchatError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_send_maps_server_error_to_agent_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let transport = transport_for(&server, signed_in("tok"));
        let err = transport.send("hello").await.unwrap_err();
        match err.downcast::<EnrollchatError>().unwrap() {
            EnrollchatError::AgentStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_rejects_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "answer": "hi" })),
            )
            .mount(&server)
            .await;

        let transport = transport_for(&server, signed_in("tok"));
        let err = transport.send("hello").await.unwrap_err();
        assert!(matches!(
            err.downcast::<EnrollchatError>().unwrap(),
            EnrollchatError::MalformedResponse(_)
        ));
    }

    #[tokio::test]
    async fn test_send_network_failure_is_http_error() {
        // Bind and drop a listener to get a port with nothing behind it.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let transport = HttpAgentTransport::new(
            url::Url::parse(&format!("http://127.0.0.1:{}/api/agent/chat", port)).unwrap(),
            Arc::new(crate::auth::NoIdentity),
            Duration::from_secs(2),
        )
        .unwrap();

        let err = transport.send("hello").await.unwrap_err();
        assert!(matches!(
            err.downcast::<EnrollchatError>().unwrap(),
            EnrollchatError::Http(_)
        ));
    }

    #[test]
    fn test_from_config_uses_joined_endpoint() {
        let config = AgentEndpointConfig {
            base_url: "http://registrar.test/".to_string(),
            ..AgentEndpointConfig::default()
        };
        let transport =
            HttpAgentTransport::from_config(&config, Arc::new(crate::auth::NoIdentity)).unwrap();
        assert_eq!(
            transport.endpoint().as_str(),
            "http://registrar.test/api/agent/chat"
        );
    }
}
