use super::{NavError, NavigationSource, PageFilter};
use crate::config::SupplierConfig;
use crate::model::{EntitlementSet, RemotePage};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

const ENTITLEMENT_ENDPOINT: &str = "entitlement";
const PAGES_ENDPOINT: &str = "pages";

// Entitlement response: data.viewer.entitlements.edges[].node.offer.id
#[derive(Debug, Deserialize)]
struct EntitlementResponse {
    data: EntitlementData,
}

#[derive(Debug, Deserialize)]
struct EntitlementData {
    viewer: Viewer,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    entitlements: EntitlementConnection,
}

#[derive(Debug, Deserialize)]
struct EntitlementConnection {
    edges: Vec<EntitlementEdge>,
}

#[derive(Debug, Deserialize)]
struct EntitlementEdge {
    node: EntitlementNode,
}

#[derive(Debug, Deserialize)]
struct EntitlementNode {
    offer: Offer,
}

#[derive(Debug, Deserialize)]
struct Offer {
    id: String,
}

impl From<EntitlementResponse> for EntitlementSet {
    fn from(response: EntitlementResponse) -> Self {
        response
            .data
            .viewer
            .entitlements
            .edges
            .into_iter()
            .map(|edge| edge.node.offer.id)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageCollectionResponse {
    docs: Vec<RemotePage>,
    #[serde(default)]
    total_docs: Option<u64>,
    #[serde(default)]
    has_next_page: bool,
}

/// Talks to the entitlement endpoint and the content API over HTTP.
pub struct HttpNavigationSource {
    client: Client,
    app_base_url: Url,
    content_base_url: Url,
    page_limit: Option<u32>,
}

impl HttpNavigationSource {
    pub fn new(config: &SupplierConfig) -> Result<Self, NavError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| NavError::Api(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            app_base_url: Url::parse(&config.app_base_url)?,
            content_base_url: Url::parse(&config.content_base_url)?,
            page_limit: config.page_limit,
        })
    }

    /// `{app}/api/offers/entitlement/{token}`, with the token escaped as a single segment.
    pub fn entitlement_url(&self, token: &str) -> Result<Url, NavError> {
        append_segments(&self.app_base_url, &["api", "offers", "entitlement", token])
    }

    /// `{content}/api/pages/?where[...]=...`
    pub fn pages_url(&self, filter: &PageFilter) -> Result<Url, NavError> {
        let mut url = append_segments(&self.content_base_url, &["api", "pages", ""])?;
        {
            let mut query = url.query_pairs_mut();
            query.extend_pairs(filter.query_pairs());
            if let Some(limit) = self.page_limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        endpoint: &'static str,
        transport_error: fn(reqwest::Error) -> NavError,
    ) -> Result<T, NavError> {
        let response = self.client.get(url).send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NavError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(|source| NavError::Malformed { endpoint, source })
    }
}

fn append_segments(base: &Url, segments: &[&str]) -> Result<Url, NavError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| NavError::Api(format!("{} cannot be used as a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[async_trait]
impl NavigationSource for HttpNavigationSource {
    async fn fetch_entitlements(&self, token: &str) -> Result<EntitlementSet, NavError> {
        let url = self.entitlement_url(token)?;
        debug!("Requesting entitlements from {}", self.app_base_url);

        let response: EntitlementResponse = self
            .get_json(url, ENTITLEMENT_ENDPOINT, NavError::Entitlement)
            .await?;
        let entitlements = EntitlementSet::from(response);
        debug!("Viewer is entitled to {} offers", entitlements.len());
        Ok(entitlements)
    }

    async fn fetch_pages(&self, filter: &PageFilter) -> Result<Vec<RemotePage>, NavError> {
        let url = self.pages_url(filter)?;
        debug!("Requesting pages: {}", url);

        let response: PageCollectionResponse = self
            .get_json(url, PAGES_ENDPOINT, NavError::Content)
            .await?;
        if response.has_next_page {
            warn!(
                "Page list truncated: got {} of {} documents",
                response.docs.len(),
                response
                    .total_docs
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "?".to_string())
            );
        }
        Ok(response.docs)
    }
}
