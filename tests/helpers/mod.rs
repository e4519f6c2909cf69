#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roster::db;
use roster::embedding::hashing::HashingEmbeddingProvider;
use roster::embedding::EmbeddingProvider;
use roster::records::{store, Employee, NewEmployee};
use rusqlite::Connection;

/// Open a fresh in-memory database with the schema applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Employee payload with unique contact, PAN and Aadhaar derived from `seq`.
pub fn new_employee(name: &str, address: &str, seq: u32) -> NewEmployee {
    NewEmployee {
        name: name.into(),
        date_of_birth: "1990-04-01".into(),
        address: address.into(),
        contact_number: format!("98765{seq:05}"),
        pan_number: format!("PAN{seq:07}"),
        aadhar_number: format!("{seq:012}"),
    }
}

pub fn insert_employee(conn: &mut Connection, name: &str, address: &str, seq: u32) -> Employee {
    store::create_employee(conn, &new_employee(name, address, seq)).unwrap()
}

/// Alice (Springfield), Bob (capital city) and Carol (Shelbyville), in that order.
pub fn seed_employees(conn: &mut Connection) -> Vec<Employee> {
    vec![
        insert_employee(conn, "Alice", "Springfield", 1),
        insert_employee(conn, "Bob", "capital city", 2),
        insert_employee(conn, "Carol", "Shelbyville", 3),
    ]
}

pub fn shared(conn: Connection) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(conn))
}

pub fn hashing_embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashingEmbeddingProvider::default())
}

/// Hashing embedder whose `embed_batch` starts failing once `fail_from` batches
/// have succeeded. Single-text `embed` always works.
pub struct FailingEmbedder {
    inner: HashingEmbeddingProvider,
    batches: AtomicUsize,
    fail_from: usize,
}

impl FailingEmbedder {
    pub fn new(fail_from: usize) -> Self {
        Self {
            inner: HashingEmbeddingProvider::default(),
            batches: AtomicUsize::new(0),
            fail_from,
        }
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for FailingEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.inner.embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        let seen = self.batches.fetch_add(1, Ordering::SeqCst);
        if seen >= self.fail_from {
            anyhow::bail!("inference failed on batch {seen}");
        }
        texts.iter().map(|t| self.inner.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// Hashing embedder that sleeps before every batch, to keep a rebuild in
/// flight while other tasks run.
pub struct SlowEmbedder {
    inner: HashingEmbeddingProvider,
    delay: Duration,
}

impl SlowEmbedder {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: HashingEmbeddingProvider::default(),
            delay,
        }
    }
}

impl EmbeddingProvider for SlowEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.inner.embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        std::thread::sleep(self.delay);
        texts.iter().map(|t| self.inner.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// Serve `state` on an ephemeral local port. Returns the base URL.
pub async fn spawn_server(state: roster::server::AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, roster::server::router(state))
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

pub fn test_config() -> roster::config::RosterConfig {
    let mut config = roster::config::RosterConfig::default();
    config.server.request_timeout_secs = 10;
    config
}

pub async fn send_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> reqwest::Response {
    request
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap()
}

pub async fn json_body(response: reqwest::Response) -> serde_json::Value {
    serde_json::from_str(&response.text().await.unwrap()).unwrap()
}
