//! Provider HTTP transport
//!
//! reqwest client with fixed connect and request timeouts. Error messages are
//! stripped of URLs so query strings never reach the logs.

use platform::secret::Secret;
use reqwest::Client;
use url::Url;

use crate::application::config::OAuthConfig;
use crate::domain::provider::{HttpReply, OAuthTransport, TransportError};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(oauth: &OAuthConfig) -> AuthResult<Self> {
        let client = Client::builder()
            .connect_timeout(oauth.connect_timeout)
            .timeout(oauth.request_timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("HTTP client: {}", e.without_url())))?;

        Ok(Self { client })
    }

    async fn into_reply(response: reqwest::Response) -> Result<HttpReply, TransportError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_error)?;
        Ok(HttpReply { status, body })
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.without_url().to_string())
    } else {
        TransportError::Other(e.without_url().to_string())
    }
}

impl OAuthTransport for ReqwestTransport {
    async fn post_form(
        &self,
        url: &Url,
        form: &[(&str, &str)],
    ) -> Result<HttpReply, TransportError> {
        let response = self
            .client
            .post(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(map_error)?;

        tracing::debug!(status = response.status().as_u16(), "Token endpoint replied");
        Self::into_reply(response).await
    }

    async fn get_bearer(&self, url: &Url, token: &Secret) -> Result<HttpReply, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(map_error)?;

        tracing::debug!(status = response.status().as_u16(), "Userinfo endpoint replied");
        Self::into_reply(response).await
    }
}
