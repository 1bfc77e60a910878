use std::sync::Arc;

use camvault::api::{ErrorBody, ImagesResponse, LoginResponse, MessageResponse, UploadResponse};
use camvault::config::KeySelection;
use camvault::{build_router, ImageVault, ServerConfig};
use serde_json::json;
use tempfile::TempDir;

const SECRET: &str = "my-camera-secret";
const UPLOAD_LIMIT: usize = 64 * 1024;

struct TestServer {
    base: String,
    client: reqwest::Client,
    _dir: TempDir,
}

/// Spin up the HTTP server on an OS-assigned port over a fresh data dir.
async fn spawn_test_server(key_selection: KeySelection) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let base = format!("http://127.0.0.1:{}", port);

    let config = ServerConfig {
        port,
        data_dir: dir.path().to_path_buf(),
        public_url: Some(base.clone()),
        key_selection,
        ..ServerConfig::default()
    };
    let vault = ImageVault::open(&config).unwrap();
    let app = build_router(Arc::new(vault), UPLOAD_LIMIT);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base,
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn signup(&self, product_number: i64, email: &str) -> reqwest::Response {
        self.client
            .post(self.url("/signup"))
            .json(&json!({
                "productnumber": product_number,
                "name": "Cam Owner",
                "mobile": "9876543210",
                "email": email,
                "password": "pass1234",
                "confirmPassword": "pass1234",
                "aesKey": SECRET,
                "agree": true,
            }))
            .send()
            .await
            .unwrap()
    }

    async fn upload(&self, body: Vec<u8>, content_type: &str) -> reqwest::Response {
        self.client
            .post(self.url("/upload"))
            .header("content-type", content_type)
            .body(body)
            .send()
            .await
            .unwrap()
    }

    async fn decrypt(&self, email: &str, key: &str) -> reqwest::Response {
        self.client
            .post(self.url("/decrypt-images"))
            .json(&json!({ "email": email, "aesKey": key }))
            .send()
            .await
            .unwrap()
    }
}

fn jpeg_payload(len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.extend((0..len - 4).map(|i| (i % 251) as u8));
    data
}

#[tokio::test]
async fn health_reports_version() {
    let server = spawn_test_server(KeySelection::AnyAccount).await;
    let resp = reqwest::get(server.url("/health")).await.unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], camvault::VERSION);
}

#[tokio::test]
async fn signup_then_login() {
    let server = spawn_test_server(KeySelection::AnyAccount).await;

    let resp = server.signup(42, "a@x.com").await;
    assert_eq!(resp.status(), 201);
    let body: MessageResponse = resp.json().await.unwrap();
    assert!(body.success);
    assert_eq!(body.message, "User registered successfully");

    let resp = server.signup(42, "a@x.com").await;
    assert_eq!(resp.status(), 400);

    let resp = server
        .client
        .post(server.url("/login"))
        .json(&json!({ "email": "a@x.com", "password": "pass1234" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: LoginResponse = resp.json().await.unwrap();
    assert_eq!(body.user.productnumber, 42);
    assert_eq!(body.user.email, "a@x.com");

    let resp = server
        .client
        .post(server.url("/login"))
        .json(&json!({ "email": "a@x.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn upload_decrypt_and_fetch() {
    let server = spawn_test_server(KeySelection::AnyAccount).await;
    server.signup(1, "a@x.com").await;

    let payload = jpeg_payload(12_345);
    let resp = server.upload(payload.clone(), "application/octet-stream").await;
    assert_eq!(resp.status(), 200);
    let uploaded: UploadResponse = resp.json().await.unwrap();
    assert!(uploaded.success);
    assert_eq!(uploaded.message, "Image received and encrypted");
    assert!(uploaded.filename.starts_with("enc_"));
    assert!(uploaded.filename.ends_with(".jpg"));

    let resp = server.decrypt("a@x.com", SECRET).await;
    assert_eq!(resp.status(), 200);
    let decrypted: ImagesResponse = resp.json().await.unwrap();
    assert_eq!(decrypted.images.len(), 1);

    let image = &decrypted.images[0];
    assert_eq!(image.filename, format!("dec_{}", uploaded.filename));
    assert_eq!(image.image_path, server.url(&format!("/images/{}", image.filename)));

    let fetched = reqwest::get(&image.image_path).await.unwrap();
    assert_eq!(fetched.status(), 200);
    assert_eq!(fetched.bytes().await.unwrap().as_ref(), payload.as_slice());

    let resp = server
        .client
        .post(server.url("/get-decrypted-images"))
        .json(&json!({ "email": "a@x.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let listed: ImagesResponse = resp.json().await.unwrap();
    assert_eq!(listed.message, "Decrypted images fetched successfully");
    assert_eq!(listed.images, decrypted.images);
}

#[tokio::test]
async fn decrypt_rejections() {
    let server = spawn_test_server(KeySelection::AnyAccount).await;
    server.signup(1, "a@x.com").await;

    let resp = server.decrypt("a@x.com", "not-the-secret").await;
    assert_eq!(resp.status(), 401);
    let body: ErrorBody = resp.json().await.unwrap();
    assert!(!body.success);

    let resp = server.decrypt("nobody@x.com", SECRET).await;
    assert_eq!(resp.status(), 404);

    // Valid credentials but nothing uploaded yet
    let resp = server.decrypt("a@x.com", SECRET).await;
    assert_eq!(resp.status(), 404);

    let resp = server
        .client
        .post(server.url("/decrypt-images"))
        .json(&json!({ "email": "a@x.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: ErrorBody = resp.json().await.unwrap();
    assert_eq!(body.message, "Email and AES Key are required");

    let resp = server
        .client
        .post(server.url("/get-decrypted-images"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn upload_rejections() {
    let server = spawn_test_server(KeySelection::AnyAccount).await;

    // No account registered yet
    let resp = server.upload(jpeg_payload(100), "image/jpeg").await;
    assert_eq!(resp.status(), 500);
    let body: ErrorBody = resp.json().await.unwrap();
    assert!(!body.success);

    server.signup(1, "a@x.com").await;

    let resp = server.upload(Vec::new(), "application/octet-stream").await;
    assert_eq!(resp.status(), 400);

    let resp = server.upload(jpeg_payload(100), "text/plain").await;
    assert_eq!(resp.status(), 415);

    let resp = server
        .upload(jpeg_payload(UPLOAD_LIMIT + 1024), "application/octet-stream")
        .await;
    assert_eq!(resp.status(), 413);
}

#[tokio::test]
async fn device_bound_upload() {
    let server = spawn_test_server(KeySelection::Device).await;
    server.signup(1, "a@x.com").await;
    server.signup(2, "b@x.com").await;

    let resp = server
        .client
        .post(server.url("/upload"))
        .header("content-type", "image/jpeg")
        .header("X-Device-Id", "2")
        .body(jpeg_payload(500))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = server.decrypt("b@x.com", SECRET).await;
    assert_eq!(resp.status(), 200);
    let body: ImagesResponse = resp.json().await.unwrap();
    assert_eq!(body.images.len(), 1);

    let resp = server.decrypt("a@x.com", SECRET).await;
    assert_eq!(resp.status(), 404);
}
