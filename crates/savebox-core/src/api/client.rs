//! HTTP client for the savebox REST API.
//!
//! `ApiClient` holds a shared [`SessionToken`] handle rather than a token
//! string, so each request carries whatever token the session gate holds at
//! send time.

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionToken;
use crate::models::{Item, ItemPayload, TokenResponse};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("savebox/", env!("CARGO_PKG_VERSION"));

const REGISTER_PATH: &str = "/auth/register";
const LOGIN_PATH: &str = "/auth/login";
const ITEMS_PATH: &str = "/items/";

#[derive(Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// API client for the item server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling,
/// and clones share the same token handle.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: SessionToken,
}

impl ApiClient {
    /// Create a client for `base_url` that reads its bearer token from `token`
    pub fn new(base_url: impl Into<String>, token: SessionToken) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = self.token.current() {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidToken)?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Build a request that carries the current bearer token, if any.
    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.url(path);
        debug!(%method, url = %url, "Sending request");
        Ok(self.client.request(method, url).headers(self.auth_headers()?))
    }

    /// Build a request that never carries a bearer token.
    fn public_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, url = %url, "Sending unauthenticated request");
        self.client.request(method, url)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %ApiError::truncate_body(&body), "Request rejected");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("{}: {}", e, ApiError::truncate_body(&text)))
        })
    }

    // ===== Verb calls =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(Method::GET, path)?.send().await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, ApiError> {
        let response = self.request(Method::POST, path)?.json(body).send().await?;
        Self::check_response(response).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, ApiError> {
        let response = self.request(Method::PUT, path)?.json(body).send().await?;
        Self::check_response(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, ApiError> {
        let response = self.request(Method::DELETE, path)?.send().await?;
        Self::check_response(response).await
    }

    // ===== Authentication =====

    /// Register a new account and return its access token
    pub async fn register(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let response = self
            .public_request(Method::POST, REGISTER_PATH)
            .json(&RegisterRequest { email, password })
            .send()
            .await?;
        Self::read_token(response).await
    }

    /// Log in with form-encoded credentials and return the access token
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let response = self
            .public_request(Method::POST, LOGIN_PATH)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        Self::read_token(response).await
    }

    async fn read_token(response: Response) -> Result<String, ApiError> {
        let response = Self::check_response(response).await?;
        let token: TokenResponse = Self::parse_json(response).await?;
        if token.access_token.is_empty() {
            return Err(ApiError::InvalidResponse("empty access_token".to_string()));
        }
        if !token.token_type.eq_ignore_ascii_case("bearer") {
            warn!(token_type = %token.token_type, "Unexpected token type, using it as a bearer token");
        }
        Ok(token.access_token)
    }

    // ===== Items =====

    pub async fn list_items(&self) -> Result<Vec<Item>, ApiError> {
        self.get(ITEMS_PATH).await
    }

    pub async fn get_item(&self, id: i64) -> Result<Item, ApiError> {
        self.get(&format!("{}{}", ITEMS_PATH, id)).await
    }

    pub async fn create_item(&self, payload: &ItemPayload) -> Result<(), ApiError> {
        self.post(ITEMS_PATH, payload).await?;
        Ok(())
    }

    pub async fn update_item(&self, id: i64, payload: &ItemPayload) -> Result<(), ApiError> {
        self.put(&format!("{}{}", ITEMS_PATH, id), payload).await?;
        Ok(())
    }

    pub async fn delete_item(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("{}{}", ITEMS_PATH, id)).await?;
        Ok(())
    }
}
