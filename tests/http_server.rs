use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;
use warp::http::StatusCode;
use warp::Filter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hrassist::auth::{pkce, FlowStore, StoredFlow, TokenStore};
use hrassist::core::models::TokenRecord;
use hrassist::core::types::{
    ClientId, ClientSecret, CsrfState, Expiry, RedirectUri, Scope, SessionKey,
};
use hrassist::db::{MemoryStore, StoreError};
use hrassist::http::server::Server;
use hrassist::provider::{OAuth2Client, ProviderConfig};

fn provider_config(accounts_url: &str) -> ProviderConfig {
    ProviderConfig::from_accounts_url(
        accounts_url,
        ClientId("1000.TESTCLIENT".to_string()),
        ClientSecret("client-secret".to_string()),
        RedirectUri("http://localhost:8001/oauthredirect".to_string()),
        Scope::from_delimited_parts("ZohoMail.accounts.READ ZohoMail.messages.READ"),
    )
    .unwrap()
}

fn routes_with<S>(
    accounts_url: &str,
    store: Arc<S>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone + 'static
where
    S: FlowStore + TokenStore + 'static,
{
    let client = OAuth2Client::new(provider_config(accounts_url), store.clone(), store)
        .unwrap()
        .with_session_secret("test-secret".to_string());
    Arc::new(Server::new(Arc::new(client), "/dashboard".to_string(), false)).routes()
}

fn session_from(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("hrassist_session="))
        .unwrap()
        .to_string()
}

fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn connect_sets_session_cookie_and_redirects() {
    let routes = routes_with("https://accounts.zoho.com", Arc::new(MemoryStore::new()));

    for verb in ["GET", "POST"] {
        let resp = warp::test::request()
            .method(verb)
            .path("/connect/zoho")
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let location = resp.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("https://accounts.zoho.com/oauth/v2/auth?"));

        let cookie = resp.headers()["set-cookie"].to_str().unwrap();
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=900"));
        assert!(!session_from(cookie).is_empty());
    }
}

#[tokio::test]
async fn full_flow_lands_on_dashboard() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A",
            "refresh_token": "R",
            "expires_in": 3600,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;
    let routes = routes_with(&server.uri(), Arc::new(MemoryStore::new()));

    let resp = warp::test::request()
        .path("/connect/zoho")
        .reply(&routes)
        .await;
    let session = session_from(resp.headers()["set-cookie"].to_str().unwrap());
    let location = Url::parse(resp.headers()["location"].to_str().unwrap()).unwrap();
    let state = location
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let resp = warp::test::request()
        .path(&format!("/oauthredirect?code=C&state={}", state))
        .header("cookie", format!("hrassist_session={}", session))
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], "/dashboard");

    let resp = warp::test::request().path("/dashboard").reply(&routes).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let status = json_body(resp.body());
    assert_eq!(status["is_connected"], true);
    assert!(status["expires_at"].is_string());

    let resp = warp::test::request().path("/api/token").reply(&routes).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp.body()),
        json!({ "success": true, "access_token": "A" })
    );
}

#[tokio::test]
async fn forged_state_is_a_bad_request() {
    let routes = routes_with("https://accounts.zoho.com", Arc::new(MemoryStore::new()));

    let resp = warp::test::request()
        .path("/connect/zoho")
        .reply(&routes)
        .await;
    let session = session_from(resp.headers()["set-cookie"].to_str().unwrap());

    let resp = warp::test::request()
        .path("/oauthredirect?code=C&state=forged")
        .header("cookie", format!("hrassist_session={}", session))
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.body().as_ref(), b"Authentication failed");
}

#[tokio::test]
async fn callback_without_session_is_a_bad_request() {
    let routes = routes_with("https://accounts.zoho.com", Arc::new(MemoryStore::new()));

    let resp = warp::test::request()
        .path("/oauthredirect?code=C&state=S")
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn token_endpoint_requires_a_connection() {
    let routes = routes_with("https://accounts.zoho.com", Arc::new(MemoryStore::new()));

    let resp = warp::test::request().path("/api/token").reply(&routes).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp.body())["success"], false);

    let resp = warp::test::request().path("/dashboard").reply(&routes).await;
    assert_eq!(json_body(resp.body())["is_connected"], false);
}

#[tokio::test]
async fn health_answers_ok() {
    let routes = routes_with("https://accounts.zoho.com", Arc::new(MemoryStore::new()));

    let resp = warp::test::request().path("/health").reply(&routes).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.body().as_ref(), b"ok");
}

/// Store whose every operation fails.
struct Unavailable;

#[async_trait]
impl FlowStore for Unavailable {
    async fn store_state(&self, _: &SessionKey, _: &CsrfState, _: Expiry) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }
    async fn get_stored_state(&self, _: &SessionKey) -> Result<Option<CsrfState>, StoreError> {
        Err(StoreError::Poisoned)
    }
    async fn store_code_verifier(
        &self,
        _: &SessionKey,
        _: &pkce::Verifier,
        _: Expiry,
    ) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }
    async fn retrieve_code_verifier(
        &self,
        _: &SessionKey,
    ) -> Result<Option<pkce::Verifier>, StoreError> {
        Err(StoreError::Poisoned)
    }
    async fn store_flow(
        &self,
        _: &SessionKey,
        _: &CsrfState,
        _: &pkce::Verifier,
        _: Expiry,
    ) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }
    async fn retrieve_flow(&self, _: &SessionKey) -> Result<StoredFlow, StoreError> {
        Err(StoreError::Poisoned)
    }
    async fn clear(&self, _: &SessionKey) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }
    async fn clean_up(&self) -> Result<usize, StoreError> {
        Err(StoreError::Poisoned)
    }
}

#[async_trait]
impl TokenStore for Unavailable {
    async fn store_tokens(&self, _: &TokenRecord) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }
    async fn retrieve_tokens(&self) -> Result<Option<TokenRecord>, StoreError> {
        Err(StoreError::Poisoned)
    }
    async fn delete_tokens(&self) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }
}

#[tokio::test]
async fn storage_outage_fails_initiation_and_reads_as_disconnected() {
    let routes = routes_with("https://accounts.zoho.com", Arc::new(Unavailable));

    let resp = warp::test::request()
        .path("/connect/zoho")
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.body().as_ref(), b"Failed to initiate OAuth");

    let resp = warp::test::request().path("/dashboard").reply(&routes).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp.body())["is_connected"], false);

    let resp = warp::test::request().path("/api/token").reply(&routes).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
