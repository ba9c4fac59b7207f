//! TopBraid knowledge system client
//!
//! Queries are POSTed as form data (`format=json-simple`, `query=...`) with
//! the session cookie attached. The `json-simple` result format is a flat
//! JSON array of objects keyed by the SELECT variable names, which map
//! directly onto [`AttributeRecord`] fields.
//!
//! A failed query is retried exactly once after forcing a fresh session.

use super::{MetadataSource, RawOverrides, SessionManager, SourceError};
use cdd_common::config::SourceConfig;
use cdd_common::AttributeRecord;
use reqwest::header::{ACCEPT, COOKIE};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("cdd-service/", env!("CARGO_PKG_VERSION"));
const RESULT_FORMAT: &str = "json-simple";

pub struct SparqlSource {
    http_client: reqwest::Client,
    session: SessionManager,
    service_url: String,
    namespace_prefix: String,
    graph_id: String,
}

impl SparqlSource {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let login_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            session: SessionManager::new(
                login_client,
                config.login_url.clone(),
                config.username.clone(),
                config.password.clone(),
            ),
            service_url: config.service_url.clone(),
            namespace_prefix: config.namespace_prefix.clone(),
            graph_id: config.graph_id.clone(),
        })
    }

    fn attributes_query(&self) -> String {
        format!(
            "PREFIX cdd:<{ns}> \
             PREFIX skos:<http://www.w3.org/2004/02/skos/core#> \
             SELECT ?column_header ?display_name ?attribute_type ?datatype ?description ?priority \
             WHERE {{ \
                 GRAPH <{graph}> {{ \
                     ?subject skos:prefLabel ?column_header. \
                     ?subject cdd:AttributeType ?attribute_type. \
                     ?subject cdd:Datatype ?datatype. \
                     ?subject cdd:Description ?description. \
                     ?subject cdd:DisplayName ?display_name. \
                     ?subject cdd:Priority ?priority. \
                 }} \
             }}",
            ns = self.namespace_prefix,
            graph = self.graph_id,
        )
    }

    fn overrides_query(&self) -> String {
        format!(
            "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> \
             PREFIX cdd:<{ns}> \
             PREFIX skos:<http://www.w3.org/2004/02/skos/core#> \
             SELECT DISTINCT ?study_id ?column_header \
                 (SAMPLE(?PriorityValue) AS ?priority) \
                 (SAMPLE(?AttributeTypeValue) AS ?attribute_type) \
                 (SAMPLE(?DatatypeValue) AS ?datatype) \
                 (SAMPLE(?DescriptionValue) AS ?description) \
                 (SAMPLE(?DisplayNameValue) AS ?display_name) \
             WHERE {{ \
                 GRAPH <{graph}> {{ \
                     ?node rdf:type ?type. \
                     ?node skos:broader ?parent. \
                     ?parent cdd:StudyId ?study_id. \
                     ?parent skos:broader ?grandparent. \
                     ?grandparent skos:prefLabel ?column_header. \
                     OPTIONAL{{?node cdd:PriorityValue ?PriorityValue}}. \
                     OPTIONAL{{?node cdd:AttributeTypeValue ?AttributeTypeValue}}. \
                     OPTIONAL{{?node cdd:DatatypeValue ?DatatypeValue}}. \
                     OPTIONAL{{?node cdd:DescriptionValue ?DescriptionValue}}. \
                     OPTIONAL{{?node cdd:DisplayNameValue ?DisplayNameValue}}. \
                 }} \
             }} \
             GROUP BY ?study_id ?column_header \
             ORDER BY ?study_id ?column_header \
             VALUES ?type {{cdd:ClinicalAttributeOverridePriorityValue \
                 cdd:ClinicalAttributeOverrideAttributeTypeValue \
                 cdd:ClinicalAttributeOverrideDatatypeValue \
                 cdd:ClinicalAttributeOverrideDescriptionValue \
                 cdd:ClinicalAttributeOverrideDisplayNameValue}}",
            ns = self.namespace_prefix,
            graph = self.graph_id,
        )
    }

    /// Run a query, refreshing the session and retrying once on failure
    async fn query(&self, query: &str) -> Result<Vec<AttributeRecord>, SourceError> {
        let session_id = self.session.session_id().await?;
        match self.post_query(query, session_id.as_deref()).await {
            Ok(rows) => Ok(rows),
            Err(first) => {
                debug!("SPARQL query failed ({}), retrying with a fresh session", first);
                let session_id = self.session.fresh_session_id().await?;
                self.post_query(query, session_id.as_deref()).await
            }
        }
    }

    async fn post_query(
        &self,
        query: &str,
        session_id: Option<&str>,
    ) -> Result<Vec<AttributeRecord>, SourceError> {
        debug!(url = %self.service_url, "Posting SPARQL query");

        let mut request = self
            .http_client
            .post(&self.service_url)
            .header(ACCEPT, "application/sparql-results+json-simple, application/json")
            .form(&[("format", RESULT_FORMAT), ("query", query)]);
        if let Some(id) = session_id {
            request = request.header(COOKIE, format!("JSESSIONID={}", id));
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(status.as_u16(), error_text));
        }

        // Content type is application/sparql-results+json-simple, so decode by hand
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;
        parse_rows(&body)
    }
}

fn parse_rows(body: &str) -> Result<Vec<AttributeRecord>, SourceError> {
    serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))
}

/// Group override rows by their study id
fn group_by_study(rows: Vec<AttributeRecord>) -> RawOverrides {
    let mut grouped: RawOverrides = BTreeMap::new();
    for row in rows {
        match row.study_id().map(str::to_string) {
            Some(study_id) if !study_id.trim().is_empty() => {
                grouped.entry(study_id).or_default().push(row);
            }
            _ => warn!(
                column_header = row.column_header(),
                "Skipping override row without a study id"
            ),
        }
    }
    grouped
}

#[async_trait::async_trait]
impl MetadataSource for SparqlSource {
    fn name(&self) -> &'static str {
        "sparql"
    }

    async fn fetch_attributes(&self) -> Result<Vec<AttributeRecord>, SourceError> {
        info!("Fetching clinical attribute metadata from TopBraid...");
        self.query(&self.attributes_query()).await
    }

    async fn fetch_overrides(&self) -> Result<RawOverrides, SourceError> {
        info!("Fetching clinical attribute metadata overrides from TopBraid...");
        let rows = self.query(&self.overrides_query()).await?;
        Ok(group_by_study(rows))
    }
}
