//! Single-hop HTTP requests with one Digest retry.

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, WWW_AUTHENTICATE};
use reqwest::{Method, StatusCode};
use tracing::{debug, info, warn};

use super::{RequestError, RequestOutcome};
use crate::auth::{DigestAuthenticator, DigestChallenge, advertises_digest};
use crate::config::HttpConfig;
use crate::device::{Credentials, DeviceEndpoints};

/// Issues requests to one device, answering a Digest challenge once.
///
/// Holds no session state and can be cloned freely; clones share the
/// underlying connection pool. Independent requests may run concurrently.
#[derive(Debug, Clone)]
pub struct HttpRequester {
    client: reqwest::Client,
    credentials: Credentials,
    endpoints: DeviceEndpoints,
    authenticator: DigestAuthenticator,
}

impl HttpRequester {
    /// Creates a requester for the given device.
    ///
    /// # Errors
    ///
    /// - `RequestError::Transport` - the HTTP client could not be built
    pub fn new(
        credentials: Credentials,
        endpoints: DeviceEndpoints,
        config: &HttpConfig,
    ) -> Result<Self, RequestError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent)
            .redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build().map_err(RequestError::Transport)?,
            credentials,
            endpoints,
            authenticator: DigestAuthenticator::new(),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn endpoints(&self) -> &DeviceEndpoints {
        &self.endpoints
    }

    /// Sends `method path` and classifies the final response.
    ///
    /// At most two requests reach the device: the unauthenticated attempt
    /// and, after a 401 advertising Digest, one authenticated retry. Any
    /// status from the retry is final, including another 401.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        content_type: Option<&str>,
    ) -> RequestOutcome {
        match self.try_request(method, path, body, content_type).await {
            Ok((status, body)) => RequestOutcome::Success {
                status: status.as_u16(),
                body,
            },
            Err(error) => {
                warn!("Request to {} failed: {}", path, error);
                error.into()
            }
        }
    }

    /// Probes the capability endpoint; usable at any time, including mid-stream.
    pub async fn test_connection(&self) -> RequestOutcome {
        info!("Testing connection to {}", self.credentials.host);
        let outcome = self
            .request(Method::GET, &self.endpoints.probe_path, None, None)
            .await;
        if outcome.is_success() {
            info!("Connection to {} succeeded", self.credentials.host);
        }
        outcome
    }

    /// Uploads a pre-encoded payload to the transmit endpoint.
    pub async fn upload_raw(&self, payload: Bytes) -> RequestOutcome {
        info!(
            "Uploading {} bytes to {}",
            payload.len(),
            self.credentials.host
        );
        let content_type = self.endpoints.raw_content_type.clone();
        let path = self.endpoints.transmit_path.clone();
        self.request(Method::POST, &path, Some(payload), Some(&content_type))
            .await
    }

    async fn try_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        content_type: Option<&str>,
    ) -> Result<(StatusCode, String), RequestError> {
        let url = format!("{}{}", self.credentials.base_url(), path);

        debug!("Sending {} {}", method, url);
        let response = self
            .send(method.clone(), &url, body.clone(), content_type, None)
            .await?;
        let mut status = response.status();
        debug!("Initial response status: {}", status);

        let response = if status == StatusCode::UNAUTHORIZED {
            let header = digest_challenge_header(response.headers())
                .ok_or(RequestError::DigestNotOffered)?;
            drop(response);
            let challenge = DigestChallenge::parse(&header)?;
            let authorization = self
                .authenticator
                .compute_response(method.as_str(), path, &challenge, &self.credentials)
                .to_header_value();

            debug!("Retrying {} {} with Digest credentials", method, url);
            let retried = self
                .send(method, &url, body, content_type, Some(authorization))
                .await?;
            status = retried.status();
            debug!("Authenticated response status: {}", status);
            retried
        } else {
            response
        };

        if !status.is_success() {
            return Err(RequestError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Error").to_string(),
            });
        }

        let text = response.text().await.map_err(RequestError::Transport)?;
        Ok((status, text))
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
        content_type: Option<&str>,
        authorization: Option<String>,
    ) -> Result<reqwest::Response, RequestError> {
        let mut request = self.client.request(method, url);
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        request.send().await.map_err(RequestError::Transport)
    }
}

/// First `WWW-Authenticate` value offering the Digest scheme.
fn digest_challenge_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| advertises_digest(value))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn test_digest_header_selected_among_schemes() {
        let mut headers = HeaderMap::new();
        headers.append(WWW_AUTHENTICATE, HeaderValue::from_static(r#"Basic realm="x""#));
        headers.append(
            WWW_AUTHENTICATE,
            HeaderValue::from_static(r#"Digest realm="x", nonce="n", qop="auth""#),
        );

        let header = digest_challenge_header(&headers).unwrap();
        assert!(header.starts_with("Digest"));
    }

    #[test]
    fn test_no_digest_header() {
        let mut headers = HeaderMap::new();
        headers.append(WWW_AUTHENTICATE, HeaderValue::from_static(r#"Basic realm="x""#));
        assert!(digest_challenge_header(&headers).is_none());
    }

    #[tokio::test]
    async fn test_connection_refused_is_failure_without_status() {
        // Bind then drop to obtain a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let requester = HttpRequester::new(
            Credentials::new(format!("127.0.0.1:{port}"), "root", "pass"),
            DeviceEndpoints::default(),
            &HttpConfig::default(),
        )
        .unwrap();

        let outcome = requester.test_connection().await;
        match outcome {
            RequestOutcome::Failure { status, message } => {
                assert_eq!(status, None);
                assert!(!message.is_empty());
            }
            other => panic!("expected transport failure, got {other:?}"),
        }
    }
}
