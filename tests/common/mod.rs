//! Common test utilities for E2E tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use inmo::data::{Role, User};
use inmo::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const JWT_SECRET: &str = "test-secret-key-that-is-32-bytes!";
pub const CLIENT_ORIGIN: &str = "http://localhost:5500";
pub const LOGIN_REDIRECT: &str = "http://localhost:5500/index.html";
pub const ADMIN_EMAIL: &str = "boss@example.com";

/// Identities the mock provider hands out, keyed by authorization code
#[derive(Clone, Default)]
pub struct MockGoogle {
    identities: Arc<Mutex<HashMap<String, Value>>>,
}

impl MockGoogle {
    /// Make `code` resolve to the given userinfo document
    pub fn register(&self, code: &str, userinfo: Value) {
        self.identities
            .lock()
            .unwrap()
            .insert(code.to_string(), userinfo);
    }

    fn lookup(&self, code: &str) -> Option<Value> {
        self.identities.lock().unwrap().get(code).cloned()
    }
}

/// Token endpoint: the access token is the authorization code itself
async fn mock_token(
    State(mock): State<MockGoogle>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let code = form.get("code").cloned().unwrap_or_default();
    if form.get("grant_type").map(String::as_str) != Some("authorization_code")
        || mock.lookup(&code).is_none()
    {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" })))
            .into_response();
    }
    Json(json!({ "access_token": code, "token_type": "Bearer", "expires_in": 3599 }))
        .into_response()
}

async fn mock_userinfo(State(mock): State<MockGoogle>, headers: HeaderMap) -> Response {
    let access_token = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .unwrap_or_default();

    match mock.lookup(access_token) {
        Some(userinfo) => Json(userinfo).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn spawn_mock_google(mock: MockGoogle) -> String {
    let app = Router::new()
        .route("/token", post(mock_token))
        .route("/userinfo", get(mock_userinfo))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub google: MockGoogle,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        inmo::metrics::init_metrics();

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let google = MockGoogle::default();
        let google_addr = spawn_mock_google(google.clone()).await;

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                environment: config::Environment::Development,
            },
            database: config::DatabaseConfig { path: db_path },
            client: config::ClientConfig {
                origin: CLIENT_ORIGIN.to_string(),
                login_redirect: LOGIN_REDIRECT.to_string(),
            },
            auth: config::AuthConfig {
                jwt_secret: JWT_SECRET.to_string(),
                admin_emails: vec![ADMIN_EMAIL.to_string()],
                google: config::GoogleOAuthConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                    redirect_uri: "http://localhost:3000/auth/google/callback".to_string(),
                    authorize_url: config::default_google_authorize_url(),
                    token_url: format!("{}/token", google_addr),
                    userinfo_url: format!("{}/userinfo", google_addr),
                },
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Redirects are asserted on, not followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = inmo::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            google,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Run the full sign-in flow for a Google identity and return the session token
    pub async fn login(&self, google_id: &str, name: &str, email: &str) -> String {
        let code = format!("code-{google_id}");
        self.google.register(
            &code,
            json!({
                "sub": google_id,
                "name": name,
                "email": email,
                "picture": format!("https://example.com/{google_id}.png"),
            }),
        );

        let response = self.callback(&code).await;
        assert_eq!(response.status(), 303, "sign-in should redirect");
        cookie_value(&response, "token").expect("session cookie set")
    }

    /// Start sign-in, then hit the callback with a matching state
    pub async fn callback(&self, code: &str) -> reqwest::Response {
        let start = self
            .client
            .get(self.url("/auth/google"))
            .send()
            .await
            .unwrap();
        let csrf_state = cookie_value(&start, "oauth_state").expect("state cookie set");

        self.client
            .get(self.url(&format!(
                "/auth/google/callback?code={code}&state={csrf_state}"
            )))
            .header("Cookie", format!("oauth_state={csrf_state}"))
            .send()
            .await
            .unwrap()
    }

    /// Sign in a regular user
    pub async fn login_user(&self) -> String {
        self.login("google-ana", "Ana Gómez", "ana@example.com").await
    }

    /// Sign in as the configured admin
    ///
    /// The first sign-in creates a regular user; promotion at start-up only
    /// covers users that already exist, so the role is granted here.
    pub async fn login_admin(&self) -> String {
        let token = self.login("google-boss", "The Boss", ADMIN_EMAIL).await;
        let user = self.user_by_google_id("google-boss").await;
        self.state
            .db
            .update_user_role(&user.id, Role::Admin)
            .await
            .unwrap();
        token
    }

    pub async fn user_by_google_id(&self, google_id: &str) -> User {
        self.state
            .db
            .get_user_by_google_id(google_id)
            .await
            .unwrap()
            .expect("user exists")
    }
}

/// Value of a cookie set by `response`, if any
pub fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.strip_prefix(prefix.as_str()))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
        .find(|value| !value.is_empty())
}

/// Raw `Set-Cookie` header for `name`, attributes included
pub fn set_cookie_header(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(prefix.as_str()))
        .map(ToOwned::to_owned)
}

/// A payload accepted by the listing validator
pub fn sample_listing() -> Value {
    json!({
        "propertyType": "apartment",
        "neighborhood": "El Poblado",
        "municipality": "Medellín",
        "department": "Antioquia",
        "propertyAddress": "Cra 43A #1-50",
        "longitude": -75.5636,
        "latitude": 6.2088,
        "propertySize": "85",
        "propertyBedrooms": "3",
        "propertyBathrooms": "2",
        "propertyFloors": "1",
        "propertyParking": 1,
        "propertyFurnished": "no",
        "propertyDescription": "Bright corner unit",
        "propertyPrice": "450000000",
        "availability": "immediate",
        "scheduleViewing": [
            {
                "day": "Monday",
                "startHour": "09",
                "startMinute": "00",
                "finishHour": "11",
                "finishMinute": "30"
            }
        ]
    })
}
