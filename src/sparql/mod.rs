//! SPARQL change source
//!
//! Executes the fixed modified-datasets query against a SPARQL endpoint over
//! HTTP and parses the standard `application/sparql-results+json` response into
//! [`DatasetChange`] rows. Endpoint failures and malformed responses are fatal
//! for the run; nothing here is retried.

use crate::config::SparqlConfig;
use crate::error::{Error, Result};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Query for every cube or dataset carrying a modification timestamp.
///
/// Version lineages are resolved through `schema:hasPart`: for a versioned
/// cube, each prior-or-current version of the same type becomes its own result
/// row (the effective dataset), carrying the newest modification timestamp seen
/// at or after its own. Entities without a version lineage stand for
/// themselves.
pub const MODIFIED_DATASETS_QUERY: &str = r#"
  PREFIX xsd:    <http://www.w3.org/2001/XMLSchema#>
  PREFIX cube:   <https://cube.link/>
  PREFIX schema: <http://schema.org/>
  PREFIX void:   <http://rdfs.org/ns/void#>

  SELECT DISTINCT ?dataset (MAX(xsd:dateTime(?dateModified)) AS ?lastModified) WHERE {
    # All cubes and datasets carrying a modification timestamp
    VALUES ?type { cube:Cube void:Dataset }
    ?entity a ?type .
    ?entity schema:dateModified ?dateModified.

    # Prior-or-current versions reachable through the shared parent, restricted
    # to siblings of the same type whose own timestamp is not newer. The casts
    # keep the comparison sound when mixed date/dateTime literals occur.
    OPTIONAL
    {
      ?entity ^schema:hasPart ?parent.
      ?parent schema:hasPart ?previousInclCurrent.
      ?previousInclCurrent a ?type .
      ?previousInclCurrent schema:dateModified ?previousInclCurrentDateModified.
      FILTER(xsd:dateTime(?previousInclCurrentDateModified) <= xsd:dateTime(?dateModified))
    }

    # Fall back to the entity itself when no version lineage exists
    BIND(COALESCE(?previousInclCurrent, ?entity) AS ?dataset)
  }
  GROUP BY ?dataset
  ORDER BY DESC(STR(?lastModified))
"#;

/// One row of the change query: a dataset IRI and its modification literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetChange {
    pub dataset: String,
    /// Absent when the endpoint returned no `lastModified` binding for the row
    pub last_modified: Option<LiteralValue>,
}

/// A literal binding value together with its declared datatype IRI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralValue {
    pub value: String,
    pub datatype: Option<String>,
}

/// SPARQL JSON results envelope (only the parts this client reads).
#[derive(Debug, Deserialize)]
struct SelectResults {
    results: BindingSet,
}

#[derive(Debug, Deserialize)]
struct BindingSet {
    bindings: Vec<HashMap<String, Term>>,
}

#[derive(Debug, Deserialize)]
struct Term {
    value: String,
    datatype: Option<String>,
}

/// HTTP client for the change query.
pub struct SparqlClient {
    client: Client,
    endpoint_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl SparqlClient {
    pub fn new(config: &SparqlConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint_url: config.endpoint_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Run the modified-datasets query and return its rows in endpoint order.
    pub async fn modified_datasets(&self) -> Result<Vec<DatasetChange>> {
        debug!("Querying {} for modified datasets", self.endpoint_url);

        let mut request = self
            .client
            .post(&self.endpoint_url)
            .header(ACCEPT, "application/sparql-results+json")
            .form(&[("query", MODIFIED_DATASETS_QUERY)]);
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Query(format!("SPARQL endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Query(format!(
                "SPARQL endpoint returned {status}: {body}"
            )));
        }

        let results: SelectResults = response
            .json()
            .await
            .map_err(|e| Error::Query(format!("Malformed SPARQL results: {e}")))?;

        results
            .results
            .bindings
            .into_iter()
            .map(dataset_change_from_binding)
            .collect()
    }
}

fn dataset_change_from_binding(mut binding: HashMap<String, Term>) -> Result<DatasetChange> {
    let dataset = binding
        .remove("dataset")
        .ok_or_else(|| Error::Query("Result row without a ?dataset binding".to_string()))?
        .value;
    let last_modified = binding.remove("lastModified").map(|term| LiteralValue {
        value: term.value,
        datatype: term.datatype,
    });

    Ok(DatasetChange {
        dataset,
        last_modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_results() {
        let json = r#"{
            "head": {"vars": ["dataset", "lastModified"]},
            "results": {"bindings": [
                {
                    "dataset": {"type": "uri", "value": "https://example.org/cube/1"},
                    "lastModified": {
                        "type": "literal",
                        "datatype": "http://www.w3.org/2001/XMLSchema#dateTime",
                        "value": "2024-05-01T10:00:00Z"
                    }
                },
                {
                    "dataset": {"type": "uri", "value": "https://example.org/cube/2"}
                }
            ]}
        }"#;

        let results: SelectResults = serde_json::from_str(json).unwrap();
        let changes: Vec<DatasetChange> = results
            .results
            .bindings
            .into_iter()
            .map(dataset_change_from_binding)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].dataset, "https://example.org/cube/1");
        let literal = changes[0].last_modified.as_ref().unwrap();
        assert_eq!(literal.value, "2024-05-01T10:00:00Z");
        assert_eq!(
            literal.datatype.as_deref(),
            Some("http://www.w3.org/2001/XMLSchema#dateTime")
        );
        assert!(changes[1].last_modified.is_none());
    }

    #[test]
    fn test_row_without_dataset_binding_is_malformed() {
        let json = r#"{
            "results": {"bindings": [
                {"lastModified": {"type": "literal", "value": "2024-05-01T10:00:00Z"}}
            ]}
        }"#;

        let results: SelectResults = serde_json::from_str(json).unwrap();
        let parsed: Result<Vec<DatasetChange>> = results
            .results
            .bindings
            .into_iter()
            .map(dataset_change_from_binding)
            .collect();
        assert!(parsed.is_err());
    }
}
