use super::dto::{SignInDto, TokenResponseDto};
use crate::ports::{StoreError, StoreResult};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const REST_PREFIX: &str = "/rest/v1";
const AUTH_PREFIX: &str = "/auth/v1";

/// Thin client for a PostgREST-style backend with a password-grant auth endpoint.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("taskdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        })
    }

    pub fn table_url(&self, table: &str, query: &str) -> String {
        format!("{}{}/{}{}", self.base_url, REST_PREFIX, table, query)
    }

    fn request(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str, token: &str) -> StoreResult<T> {
        let response = self
            .request(Method::GET, url, token)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        self.handle_response(response).await
    }

    /// POST a row and read back the stored representation.
    pub async fn post<T: DeserializeOwned, R: Serialize>(
        &self,
        url: &str,
        token: &str,
        body: &R,
    ) -> StoreResult<T> {
        let response = self
            .request(Method::POST, url, token)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        self.handle_response(response).await
    }

    pub async fn patch<R: Serialize>(&self, url: &str, token: &str, body: &R) -> StoreResult<()> {
        let response = self
            .request(Method::PATCH, url, token)
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Self::check_status(response).await.map(|_| ())
    }

    pub async fn delete(&self, url: &str, token: &str) -> StoreResult<()> {
        let response = self
            .request(Method::DELETE, url, token)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Self::check_status(response).await.map(|_| ())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> StoreResult<TokenResponseDto> {
        let url = format!("{}{}/token?grant_type=password", self.base_url, AUTH_PREFIX);
        let body = SignInDto {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self
            .request(Method::POST, &url, &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        match response.status().as_u16() {
            400 => Err(StoreError::Authentication(
                "Invalid email or password".to_string(),
            )),
            _ => self.handle_response(response).await,
        }
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> StoreResult<T> {
        let response = Self::check_status(response).await?;
        let response_text = response
            .text()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        tracing::debug!("API Response: {}", response_text);

        serde_json::from_str(&response_text).map_err(|e| {
            StoreError::Serialization(format!(
                "Failed to parse response: {e}. Response was: {response_text}"
            ))
        })
    }

    async fn check_status(response: Response) -> StoreResult<Response> {
        let status = response.status();

        match status.as_u16() {
            200..=299 => Ok(response),
            401 | 403 => Err(StoreError::Authentication(
                "Session is invalid or expired".to_string(),
            )),
            404 => Err(StoreError::NotFound("Resource not found".to_string())),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60);
                Err(StoreError::RateLimit(retry_after))
            }
            _ => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(StoreError::Api(format!("HTTP {status}: {error_text}")))
            }
        }
    }
}
