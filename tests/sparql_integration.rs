//! Integration tests for the SPARQL change source against a mock endpoint

use cubesweep::config::SparqlConfig;
use cubesweep::sparql::SparqlClient;

fn sparql_config(endpoint: &str) -> SparqlConfig {
    SparqlConfig {
        endpoint_url: endpoint.to_string(),
        username: None,
        password: None,
    }
}

const RESULTS: &str = r#"{
    "head": {"vars": ["dataset", "lastModified"]},
    "results": {"bindings": [
        {
            "dataset": {"type": "uri", "value": "https://example.org/cube/2"},
            "lastModified": {
                "type": "literal",
                "datatype": "http://www.w3.org/2001/XMLSchema#dateTime",
                "value": "2024-06-10T00:00:00Z"
            }
        },
        {
            "dataset": {"type": "uri", "value": "https://example.org/cube/1"},
            "lastModified": {
                "type": "literal",
                "datatype": "http://www.w3.org/2001/XMLSchema#dateTime",
                "value": "2024-05-01T10:00:00Z"
            }
        }
    ]}
}"#;

#[tokio::test]
async fn test_modified_datasets_parses_rows_in_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("accept", "application/sparql-results+json")
        .with_status(200)
        .with_header("content-type", "application/sparql-results+json")
        .with_body(RESULTS)
        .create_async()
        .await;

    let client = SparqlClient::new(&sparql_config(&server.url())).unwrap();
    let changes = client.modified_datasets().await.unwrap();

    mock.assert_async().await;
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].dataset, "https://example.org/cube/2");
    assert_eq!(changes[1].dataset, "https://example.org/cube/1");
    assert_eq!(
        changes[1].last_modified.as_ref().unwrap().value,
        "2024-05-01T10:00:00Z"
    );
}

#[tokio::test]
async fn test_endpoint_error_status_is_fatal() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let client = SparqlClient::new(&sparql_config(&server.url())).unwrap();
    let err = client.modified_datasets().await.unwrap_err();
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_malformed_response_is_fatal() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(200)
        .with_body("<html>not sparql json</html>")
        .create_async()
        .await;

    let client = SparqlClient::new(&sparql_config(&server.url())).unwrap();
    let err = client.modified_datasets().await.unwrap_err();
    assert!(err.to_string().contains("Malformed"));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_fatal() {
    let client = SparqlClient::new(&sparql_config("http://127.0.0.1:9")).unwrap();
    assert!(client.modified_datasets().await.is_err());
}
