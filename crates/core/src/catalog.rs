use crate::config::HttpConfig;
use crate::traits::Catalog;
use crate::{ConfigError, FetchError, ListQuery, PropositionDetail, PropositionSummary};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

/// Every response of the open-data API wraps its payload in `dados`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    dados: T,
}

/// Client for the Chamber of Deputies open-data API (`/proposicoes`).
pub struct CamaraCatalogClient {
    base_url: Url,
    list_client: Client,
    detail_client: Client,
}

impl CamaraCatalogClient {
    pub fn new(base_url: &str, http: &HttpConfig) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(base_url)?;
        Ok(Self {
            base_url,
            list_client: http.client(http.list_timeout)?,
            detail_client: http.client(http.request_timeout)?,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Payload {
                url: self.base_url.to_string(),
                details: "base url cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        client: &Client,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let response = client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.bytes().await?;
        let envelope: Envelope<T> =
            serde_json::from_slice(&body).map_err(|error| FetchError::Payload {
                url: url.to_string(),
                details: error.to_string(),
            })?;
        Ok(envelope.dados)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim_end_matches('/')).map_err(|source| ConfigError::BaseUrl {
        url: raw.to_string(),
        source,
    })
}

#[async_trait]
impl Catalog for CamaraCatalogClient {
    #[instrument(skip(self), fields(kind = %query.kind, page = query.page))]
    async fn list_page(&self, query: &ListQuery) -> Result<Vec<PropositionSummary>, FetchError> {
        let url = self.endpoint(&["proposicoes"])?;
        let params = [
            ("ano", query.year.to_string()),
            ("siglaTipo", query.kind.clone()),
            ("itens", query.page_size.to_string()),
            ("pagina", query.page.to_string()),
            ("ordem", query.sort_order.as_str().to_string()),
            ("ordenarPor", query.sort_field.clone()),
        ];

        let items: Vec<PropositionSummary> =
            self.get_json(&self.list_client, url, &params).await?;
        debug!(count = items.len(), "listing page fetched");
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn detail(&self, id: i64) -> Result<PropositionDetail, FetchError> {
        let url = self.endpoint(&["proposicoes", &id.to_string()])?;
        self.get_json(&self.detail_client, url, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SortOrder;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn list_query(page: u32) -> ListQuery {
        ListQuery {
            kind: "PL".to_string(),
            year: 2024,
            page,
            page_size: 15,
            sort_field: "id".to_string(),
            sort_order: SortOrder::Desc,
        }
    }

    fn client_for(server: &MockServer) -> CamaraCatalogClient {
        CamaraCatalogClient::new(&format!("{}/api/v2/", server.uri()), &HttpConfig::default())
            .expect("client should build")
    }

    #[tokio::test]
    async fn list_page_sends_paging_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/proposicoes"))
            .and(query_param("ano", "2024"))
            .and(query_param("siglaTipo", "PL"))
            .and(query_param("itens", "15"))
            .and(query_param("pagina", "2"))
            .and(query_param("ordem", "DESC"))
            .and(query_param("ordenarPor", "id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dados": [
                    {"id": 2401, "siglaTipo": "PL", "numero": 295, "ano": 2024, "ementa": "x"},
                    {"id": 2400, "siglaTipo": "PL", "numero": 294, "ano": 2024}
                ],
                "links": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = client_for(&server)
            .list_page(&list_query(2))
            .await
            .expect("listing should succeed");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 2401);
        assert_eq!(items[0].key().to_string(), "PL 295/2024");
    }

    #[tokio::test]
    async fn empty_listing_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/proposicoes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dados": []})))
            .mount(&server)
            .await;

        let items = client_for(&server)
            .list_page(&list_query(9))
            .await
            .expect("empty page should succeed");
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn server_errors_are_reported_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/proposicoes"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .list_page(&list_query(1))
            .await
            .expect_err("503 should fail");
        assert!(matches!(
            error,
            FetchError::Status { status, .. } if status.as_u16() == 503
        ));
    }

    #[tokio::test]
    async fn detail_reads_summary_document_and_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/proposicoes/2401"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dados": {
                    "id": 2401,
                    "ementa": "Institui o programa.",
                    "urlInteiroTeor": "https://example.org/2401.pdf",
                    "dataApresentacao": "2024-02-01T16:55"
                }
            })))
            .mount(&server)
            .await;

        let detail = client_for(&server)
            .detail(2401)
            .await
            .expect("detail should succeed");
        assert_eq!(detail.summary.as_deref(), Some("Institui o programa."));
        assert_eq!(detail.document_url(), Some("https://example.org/2401.pdf"));
        assert!(detail.presented_on().is_some());
    }

    #[tokio::test]
    async fn malformed_body_is_a_payload_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/proposicoes/7"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .detail(7)
            .await
            .expect_err("html should not decode");
        assert!(matches!(error, FetchError::Payload { .. }));
    }

    #[test]
    fn malformed_base_url_is_a_config_error() {
        assert!(matches!(
            CamaraCatalogClient::new("::nope", &HttpConfig::default()),
            Err(ConfigError::BaseUrl { .. })
        ));
    }
}
