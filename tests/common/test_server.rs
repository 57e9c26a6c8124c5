use std::sync::Arc;

use footprint::auth::{hash_password, issue_session};
use footprint::server::{AppState, create_router};
use footprint::store::{SqliteStore, Store};
use footprint::types::{NewProfile, NewUser, Role};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub admin_token: String,
    pub client: reqwest::Client,
    server_task: JoinHandle<()>,
}

impl TestServer {
    /// Serves the router in-process on an ephemeral port with a seeded admin.
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = SqliteStore::new(temp_dir.path().join("footprint.db")).expect("open store");
        store.initialize().expect("initialize store");

        let admin = store
            .create_user(&NewUser {
                username: "admin".to_string(),
                email: "admin@footprint.local".to_string(),
                password_hash: hash_password("admin-password").expect("hash password"),
                role: Role::Admin,
                is_active: true,
            })
            .expect("create admin");
        store
            .create_profile(&NewProfile::for_user(admin.id))
            .expect("create admin profile");
        let (admin_token, _) = issue_session(&store, admin.id, None).expect("issue admin session");

        let state = Arc::new(AppState::local(Arc::new(store)));
        let app = create_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let server_task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            temp_dir,
            base_url: format!("http://127.0.0.1:{}", port),
            admin_token,
            client: reqwest::Client::new(),
            server_task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Registers a user and returns their bearer token.
    pub async fn register(&self, first_name: &str, email: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "firstName": first_name,
                "lastName": "Tester",
                "email": email,
                "password": "correct-horse",
            }))
            .send()
            .await
            .expect("register");
        assert_eq!(resp.status(), 201, "register {email}");
        let body: Value = resp.json().await.expect("parse register response");
        body["token"].as_str().expect("token").to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server_task.abort();
    }
}
