mod helpers;

use reqwest::StatusCode;
use roster::config::{EmbeddingConfig, SearchConfig};
use roster::embedding;
use roster::error::SearchError;
use roster::search::SearchService;
use roster::server::AppState;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn missing_model_config(tmp: &TempDir) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: "local".into(),
        model: "all-MiniLM-L6-v2".into(),
        cache_dir: tmp.path().join("models").to_string_lossy().into_owned(),
    }
}

#[test]
fn missing_model_files_are_model_unavailable() {
    let tmp = TempDir::new().unwrap();
    let err = embedding::create_provider(&missing_model_config(&tmp))
        .err()
        .unwrap();
    assert!(matches!(err, SearchError::ModelUnavailable(_)));
    assert!(err.to_string().contains("roster model download"));
}

#[tokio::test]
async fn service_without_model_refuses_search_operations() {
    let tmp = TempDir::new().unwrap();
    let embedder = embedding::create_provider(&missing_model_config(&tmp)).map(std::sync::Arc::from);
    let service = SearchService::new(
        embedder,
        helpers::shared(helpers::test_db()),
        SearchConfig::default(),
    );

    assert!(!service.is_available());
    assert!(matches!(
        service.search("Alice", Some(1)).await,
        Err(SearchError::ModelUnavailable(_))
    ));
    assert!(matches!(
        service.search_records("Alice", Some(1)).await,
        Err(SearchError::ModelUnavailable(_))
    ));
    assert!(matches!(
        service.rebuild_from_store(&CancellationToken::new()).await,
        Err(SearchError::ModelUnavailable(_))
    ));
    assert!(matches!(service.status(), Err(SearchError::ModelUnavailable(_))));
}

#[tokio::test]
async fn crud_keeps_working_without_model() {
    let state = AppState::new(
        helpers::test_db(),
        Err(SearchError::ModelUnavailable("model.onnx not found".into())),
        helpers::test_config(),
    );
    let base = helpers::spawn_server(state).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(helpers::json_body(resp).await["semantic_search"], false);

    let employee = serde_json::to_value(helpers::new_employee("Alice", "Springfield", 1)).unwrap();
    let resp = helpers::send_json(client.post(format!("{base}/employees")), &employee).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client.get(format!("{base}/employees")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(helpers::json_body(resp).await.as_array().unwrap().len(), 1);

    for (method, path) in [
        (reqwest::Method::GET, "semantic-search?query=Alice"),
        (reqwest::Method::POST, "semantic-search/rebuild"),
        (reqwest::Method::GET, "semantic-search/status"),
    ] {
        let resp = client
            .request(method, format!("{base}/{path}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE, "{path}");
        let body = helpers::json_body(resp).await;
        assert!(body["error"].as_str().unwrap().contains("model.onnx not found"));
    }
}
