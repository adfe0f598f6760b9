use actix_web::http::header;
use actix_web::test::TestRequest;
use actix_web::web;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use fittrack_backend::app::AppState;
use fittrack_backend::config::Config;
use fittrack_backend::db::{MemoryStore, UserRepository};
use fittrack_backend::models::user::{NewUser, User};
use fittrack_backend::utils::jwt::TokenPair;
use fittrack_backend::utils::mailer::Mailer;
use fittrack_backend::utils::password::hash_password;

pub const PASSWORD: &str = "secret123";

/// Captures outgoing mail so tests can read the codes that were sent.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
    pub fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> bool {
        if self.fail {
            return false;
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        true
    }
}

impl RecordingMailer {
    /// The 6-digit code from the most recent message to `to`.
    #[allow(dead_code)]
    pub fn last_code(&self, to: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let (_, _, body) = sent.iter().rev().find(|(recipient, _, _)| recipient == to)?;
        body.split(|c: char| !c.is_ascii_digit())
            .find(|part| part.len() == 6)
            .map(str::to_string)
    }
}

pub struct TestContext {
    pub state: web::Data<AppState>,
    pub mailer: Arc<RecordingMailer>,
    // Keeps the avatar directory alive for the duration of the test.
    pub _media: TempDir,
}

/// Shared state over the in-memory store, with media written to a temp dir.
pub fn test_context() -> TestContext {
    test_context_with_mailer(RecordingMailer::default())
}

pub fn test_context_with_mailer(mailer: RecordingMailer) -> TestContext {
    let media = TempDir::new().unwrap();
    let mut config = Config::test_default();
    config.media_dir = media.path().to_path_buf();

    let mailer = Arc::new(mailer);
    let state = web::Data::new(AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        mailer.clone(),
    ));
    TestContext {
        state,
        mailer,
        _media: media,
    }
}

/// Builds the full application over `$ctx.state`.
#[macro_export]
macro_rules! init_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.state.clone())
                .configure(fittrack_backend::app::configure),
        )
        .await
    };
}

/// Inserts a user directly and issues them a token pair.
#[allow(dead_code)]
pub async fn seed_user(ctx: &TestContext, username: &str) -> (User, TokenPair) {
    let password_hash = hash_password(PASSWORD.to_string(), 4).await.unwrap();
    let user = ctx
        .state
        .store
        .create_user(&NewUser {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            gender: true,
        })
        .await
        .unwrap();
    let tokens = ctx.state.tokens.issue_pair(&user.username).unwrap();
    (user, tokens)
}

#[allow(dead_code)]
pub fn bearer(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
}
