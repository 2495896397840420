use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

use super::coordinator::{RefreshCoordinator, TokenRefresher};
use super::endpoints;
use super::events::{SessionEvent, SessionEvents};
use crate::auth::models::{RefreshRequest, RefreshResponse};
use crate::config::ApiConfig;
use crate::error::AppError;
use crate::session::TokenStore;
use crate::Result;

/// A request description that can be sent more than once.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

/// HTTP client for the SafeNow API. Attaches the stored bearer token to
/// protected requests and recovers from expired access tokens through the
/// [`RefreshCoordinator`].
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    store: TokenStore,
    events: SessionEvents,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, store: TokenStore) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        let base_url = parse_base_url(&config.base_url)?;
        let events = SessionEvents::default();
        let refresher = HttpRefresher {
            http: http.clone(),
            url: base_url.join(endpoints::TOKEN_REFRESH.trim_start_matches('/'))?,
        };
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            events.clone(),
            Arc::new(refresher),
        ));

        Ok(Self {
            http,
            base_url,
            store,
            events,
            coordinator,
        })
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send and decode the JSON body. An empty body decodes as `null`.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.dispatch(&request).await?;
        decode(response).await
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<Response> {
        let sent_with = self.bearer_for(request);
        let response = self.transmit(request, sent_with.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED || !endpoints::is_refreshable(&request.path) {
            return Ok(response);
        }

        debug!("{} {} rejected with 401, recovering session", request.method, request.path);
        let token = self.coordinator.recover(sent_with.as_deref()).await?;

        let replay = self.transmit(request, Some(&token)).await?;
        if replay.status() == StatusCode::UNAUTHORIZED {
            warn!("{} {} rejected again after refresh", request.method, request.path);
            return Err(self.coordinator.reject_replay(&token));
        }
        Ok(replay)
    }

    /// Send once with whatever token is stored. A 401 is returned as an
    /// error without refreshing or ending the session.
    pub async fn send_once<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.transmit(&request, self.bearer_for(&request).as_deref()).await?;
        decode(response).await
    }

    /// Expiry is not checked here; the server decides.
    fn bearer_for(&self, request: &ApiRequest) -> Option<String> {
        if endpoints::is_public(&request.path) {
            None
        } else {
            self.store.access()
        }
    }

    async fn transmit(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response> {
        let url = self.base_url.join(request.path.trim_start_matches('/'))?;
        debug!("{} {}", request.method, url.path());

        let mut builder = self.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        Ok(builder.send().await?)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(AppError::from_response(status.as_u16(), &body));
    }
    if body.trim().is_empty() {
        return Ok(serde_json::from_str("null")?);
    }
    Ok(serde_json::from_str(&body)?)
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Calls the refresh endpoint directly, outside the interceptor pipeline.
struct HttpRefresher {
    http: reqwest::Client,
    url: Url,
}

#[async_trait]
impl TokenRefresher for HttpRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        let response = self
            .http
            .post(self.url.clone())
            .json(&RefreshRequest { refresh: refresh_token })
            .send()
            .await?;
        decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let url = parse_base_url("https://safenow.example/api").unwrap();
        assert_eq!(url.as_str(), "https://safenow.example/api/");
        assert_eq!(
            url.join(endpoints::ME.trim_start_matches('/')).unwrap().as_str(),
            "https://safenow.example/api/auth/me/"
        );
    }

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::get(endpoints::ACTIVE_ALERTS)
            .query("lat", 52.23)
            .query("lon", 21.01);
        assert_eq!(request.path(), "/active-alerts/");
        assert_eq!(request.query.len(), 2);
        assert_eq!(request.query[0], ("lat".to_string(), "52.23".to_string()));

        let request = ApiRequest::post(endpoints::LOGOUT)
            .json(&serde_json::json!({"refresh": "r"}))
            .unwrap();
        assert_eq!(*request.method(), Method::POST);
        assert!(request.body.is_some());
    }

    #[test]
    fn test_public_requests_get_no_bearer() {
        let store = TokenStore::in_memory();
        store.set_access("token");
        let config = ApiConfig {
            base_url: "http://localhost/api".into(),
            timeout_secs: 10,
        };
        let client = ApiClient::new(&config, store).unwrap();

        assert_eq!(client.bearer_for(&ApiRequest::get(endpoints::HEALTH)), None);
        assert_eq!(
            client.bearer_for(&ApiRequest::get(endpoints::ME)).as_deref(),
            Some("token")
        );
    }
}
