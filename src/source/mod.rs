use async_trait::async_trait;

use crate::model::{EntitlementSet, RemotePage};

pub mod http;

pub use http::HttpNavigationSource;

/// Field on a page document that holds its access offer id.
pub const OFFER_ID_FIELD: &str = "accessOfferIds.magineOfferId";

/// Field on a page document that marks it private.
pub const PRIVATE_FIELD: &str = "isPrivate";

#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("entitlement request failed: {0}")]
    Entitlement(#[source] reqwest::Error),
    #[error("page request failed: {0}")]
    Content(#[source] reqwest::Error),
    #[error("{endpoint} endpoint returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("malformed {endpoint} response: {source}")]
    Malformed {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("API error: {0}")]
    Api(String),
    #[error("fetch superseded by a newer request")]
    Cancelled,
}

impl NavError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NavError::Cancelled)
    }
}

/// Access filter sent with the page query: a page is visible if its offer id
/// is one the viewer is entitled to, or if it is explicitly not private.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFilter {
    entitlements: EntitlementSet,
}

impl PageFilter {
    pub fn entitled(entitlements: EntitlementSet) -> Self {
        Self { entitlements }
    }

    pub fn entitlements(&self) -> &EntitlementSet {
        &self.entitlements
    }

    /// Evaluates the filter locally, the same way the content API does.
    pub fn matches(&self, page: &RemotePage) -> bool {
        let entitled = page
            .offer_id()
            .map(|id| self.entitlements.contains(id))
            .unwrap_or(false);
        entitled || page.is_private == Some(false)
    }

    /// Encodes the filter as bracketed `where` query pairs.
    ///
    /// An empty entitlement set produces no membership clause at all, which
    /// leaves the public-page clause at index 1.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .entitlements
            .iter()
            .enumerate()
            .map(|(i, id)| (format!("where[or][0][{}][in][{}]", OFFER_ID_FIELD, i), id.to_string()))
            .collect();
        pairs.push((
            format!("where[or][1][{}][equals]", PRIVATE_FIELD),
            "false".to_string(),
        ));
        pairs
    }
}

/// Where navigation data comes from.
#[async_trait]
pub trait NavigationSource: Send + Sync {
    /// Looks up the offers the holder of `token` is entitled to.
    async fn fetch_entitlements(&self, token: &str) -> Result<EntitlementSet, NavError>;

    /// Lists the page documents that pass `filter`.
    async fn fetch_pages(&self, filter: &PageFilter) -> Result<Vec<RemotePage>, NavError>;
}
