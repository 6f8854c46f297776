use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use it_assets::config::{SearchConfig, TransformerConfig};
use it_assets::elastic::ElasticClient;
use it_assets::error::PipelineError;
use it_assets::purge::PurgeRule;
use it_assets::storage::SearchIndex;
use it_assets::transformer::Transformer;
use it_assets::types::{Document, PartialUpdate};

fn client_for(server: &MockServer) -> ElasticClient {
    let config = SearchConfig {
        url: Some(server.uri()),
        api_key: Some("c2VjcmV0".to_string()),
        ..Default::default()
    };
    ElasticClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_connect_sends_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("authorization", "ApiKey c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tagline": "You Know, for Search" })))
        .expect(1)
        .mount(&server)
        .await;

    let config = SearchConfig {
        url: Some(server.uri()),
        api_key: Some("c2VjcmV0".to_string()),
        ..Default::default()
    };
    ElasticClient::connect(&config).await.unwrap();
}

#[tokio::test]
async fn test_connect_fails_when_ping_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = SearchConfig {
        url: Some(server.uri()),
        ..Default::default()
    };
    let err = ElasticClient::connect(&config).await.unwrap_err();
    assert!(matches!(err, PipelineError::Connection(_)));
}

#[tokio::test]
async fn test_index_exists_maps_404_to_false() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/it-assets"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.index_exists("it-assets").await.unwrap());
    assert!(!client.index_exists("missing").await.unwrap());
}

#[tokio::test]
async fn test_count_reads_count_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/it-assets-transformed/_count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 42 })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.count("it-assets-transformed").await.unwrap(), 42);
}

#[tokio::test]
async fn test_error_status_becomes_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nope/_count"))
        .respond_with(ResponseTemplate::new(404).set_body_string("index_not_found_exception"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.count("nope").await.unwrap_err() {
        PipelineError::Api { status, message } => {
            assert_eq!(status, 404);
            assert!(message.contains("index_not_found_exception"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_missing_index_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.delete_index("gone").await.unwrap();
}

#[tokio::test]
async fn test_bulk_insert_sends_ndjson_and_reports_item_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/it-assets/_bulk"))
        .and(query_param("refresh", "true"))
        .and(header("content-type", "application/x-ndjson"))
        .and(body_string_contains("{\"index\":{}}\n{\"hostname\":\"web-01\"}\n"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": true,
            "items": [
                { "index": { "_id": "a1", "status": 201 } },
                { "index": { "_id": "a2", "status": 400,
                    "error": { "type": "mapper_parsing_exception", "reason": "bad field" } } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut first = Document::new();
    first.insert("hostname", "web-01");
    let mut second = Document::new();
    second.insert("hostname", "db-01");

    let client = client_for(&server);
    let response = client.bulk_insert("it-assets", &[first, second]).await.unwrap();
    assert_eq!(response.succeeded, 1);
    assert_eq!(response.failures.len(), 1);
    assert_eq!(response.failures[0].id.as_deref(), Some("a2"));
    assert_eq!(response.failures[0].reason, "bad field");
}

#[tokio::test]
async fn test_bulk_update_sends_partial_docs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/it-assets-transformed/_bulk"))
        .and(body_string_contains("{\"update\":{\"_id\":\"a1\"}}\n"))
        .and(body_string_contains("\"risk_level\":\"High\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": false,
            "items": [ { "update": { "_id": "a1", "status": 200 } } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut doc = Document::new();
    doc.insert("risk_level", "High");
    doc.insert("system_age", 4i64);

    let client = client_for(&server);
    let response = client
        .bulk_update(
            "it-assets-transformed",
            &[PartialUpdate {
                id: "a1".to_string(),
                doc,
            }],
        )
        .await
        .unwrap();
    assert_eq!(response.succeeded, 1);
    assert!(response.failures.is_empty());
}

#[tokio::test]
async fn test_scroll_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/it-assets-transformed/_search"))
        .and(query_param("scroll", "2m"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_scroll_id": "scroll-1",
            "hits": { "hits": [
                { "_id": "a1", "_source": { "hostname": "web-01", "cpus": 4 } }
            ] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_search/scroll"))
        .and(body_json(json!({ "scroll": "2m", "scroll_id": "scroll-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_scroll_id": "scroll-1",
            "hits": { "hits": [] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/_search/scroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "succeeded": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let first = client.open_scroll("it-assets-transformed", 100).await.unwrap();
    assert_eq!(first.scroll_id.as_deref(), Some("scroll-1"));
    assert_eq!(first.hits.len(), 1);
    assert_eq!(first.hits[0].id, "a1");
    assert_eq!(first.hits[0].source.text("hostname"), Some("web-01"));

    let next = client.next_scroll("scroll-1").await.unwrap();
    assert!(next.hits.is_empty());
    client.clear_scroll("scroll-1").await.unwrap();
}

#[tokio::test]
async fn test_delete_by_query_returns_deleted_count() {
    let rule = PurgeRule::from_config(&TransformerConfig::default());
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/it-assets-transformed/_delete_by_query"))
        .and(query_param("conflicts", "proceed"))
        .and(body_json(json!({ "query": rule.to_query() })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 3, "deleted": 3, "failures": []
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(
        client.delete_by_query("it-assets-transformed", &rule).await.unwrap(),
        3
    );
}

#[tokio::test]
async fn test_reindex_waits_and_reports_created() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_reindex"))
        .and(query_param("wait_for_completion", "true"))
        .and(body_json(json!({
            "source": { "index": "it-assets" },
            "dest": { "index": "it-assets-transformed" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 7, "created": 7, "failures": []
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(
        client.reindex("it-assets", "it-assets-transformed").await.unwrap(),
        7
    );
}

#[tokio::test]
async fn test_create_index_turns_off_date_detection() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/it-assets"))
        .and(body_json(json!({ "mappings": { "date_detection": false } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.create_index("it-assets").await.unwrap();
}

#[tokio::test]
async fn test_copy_creates_target_before_reindex() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/it-assets"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/it-assets-transformed"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/it-assets-transformed"))
        .and(body_json(json!({ "mappings": { "date_detection": false } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_reindex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 3, "created": 3, "failures": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transformer = Transformer::new(
        Arc::new(client_for(&server)),
        TransformerConfig::default(),
        "it-assets",
        "it-assets-transformed",
    );
    assert_eq!(transformer.copy().await.unwrap(), 3);
}
