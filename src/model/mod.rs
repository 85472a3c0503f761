use serde::{Deserialize, Serialize};

/// Where a page is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Placement {
    Main,
    Footer,
    /// Any navigation value we don't render; dropped by [`NavigationState::partition`].
    Other(String),
    /// The record carried no navigation field at all.
    Unassigned,
}

impl From<String> for Placement {
    fn from(value: String) -> Self {
        match value.as_str() {
            "main" => Placement::Main,
            "footer" => Placement::Footer,
            "" => Placement::Unassigned,
            _ => Placement::Other(value),
        }
    }
}

impl From<Placement> for String {
    fn from(placement: Placement) -> Self {
        match placement {
            Placement::Main => "main".to_string(),
            Placement::Footer => "footer".to_string(),
            Placement::Other(value) => value,
            Placement::Unassigned => String::new(),
        }
    }
}

impl From<Option<String>> for Placement {
    fn from(value: Option<String>) -> Self {
        value.map(Placement::from).unwrap_or(Placement::Unassigned)
    }
}

/// A navigation entry as handed to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub label: String,
    pub slug: String,
    pub is_private: bool,
    pub display_in_header: bool,
    pub placement: Placement,
}

impl Page {
    pub fn new(label: impl Into<String>, slug: impl Into<String>, placement: Placement) -> Self {
        Self {
            label: label.into(),
            slug: slug.into(),
            is_private: false,
            display_in_header: false,
            placement,
        }
    }

    pub fn in_header(mut self) -> Self {
        self.display_in_header = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessOfferIds {
    #[serde(default)]
    pub magine_offer_id: Option<String>,
}

/// A page document as returned by the content API. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePage {
    pub label: String,
    pub slug: String,
    #[serde(default)]
    pub display_in_header: Option<bool>,
    #[serde(default)]
    pub navigation: Option<String>,
    #[serde(default)]
    pub is_private: Option<bool>,
    #[serde(default)]
    pub access_offer_ids: Option<AccessOfferIds>,
}

impl RemotePage {
    pub fn offer_id(&self) -> Option<&str> {
        self.access_offer_ids
            .as_ref()
            .and_then(|ids| ids.magine_offer_id.as_deref())
    }
}

impl From<RemotePage> for Page {
    // The private flag is deliberately not carried over: every output page is public.
    fn from(remote: RemotePage) -> Self {
        Page {
            label: remote.label,
            slug: remote.slug,
            is_private: false,
            display_in_header: remote.display_in_header.unwrap_or(false),
            placement: Placement::from(remote.navigation),
        }
    }
}

/// Offer ids the viewer is entitled to, in response order without repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementSet {
    offer_ids: Vec<String>,
}

impl EntitlementSet {
    pub fn contains(&self, offer_id: &str) -> bool {
        self.offer_ids.iter().any(|id| id == offer_id)
    }

    pub fn is_empty(&self) -> bool {
        self.offer_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.offer_ids.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.offer_ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for EntitlementSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut offer_ids: Vec<String> = Vec::new();
        for id in iter {
            let id = id.into();
            if !offer_ids.contains(&id) {
                offer_ids.push(id);
            }
        }
        Self { offer_ids }
    }
}

/// The grouped view published to consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub footer_nav: Vec<Page>,
    pub main_nav: Vec<Page>,
}

impl NavigationState {
    /// Splits pages by placement, keeping their relative order. Pages placed
    /// anywhere other than main or footer end up in neither list.
    pub fn partition(pages: impl IntoIterator<Item = Page>) -> Self {
        let mut state = NavigationState::default();
        for page in pages {
            match page.placement {
                Placement::Main => state.main_nav.push(page),
                Placement::Footer => state.footer_nav.push(page),
                Placement::Other(_) | Placement::Unassigned => {}
            }
        }
        state
    }

    /// Transforms fetched records and appends the fallback pages after them.
    pub fn merge(remote: Vec<RemotePage>, fallback: &[Page]) -> Self {
        let pages = remote
            .into_iter()
            .map(Page::from)
            .chain(fallback.iter().cloned());
        Self::partition(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(label: &str, navigation: Option<&str>, is_private: Option<bool>) -> RemotePage {
        RemotePage {
            label: label.to_string(),
            slug: label.to_lowercase(),
            display_in_header: None,
            navigation: navigation.map(str::to_string),
            is_private,
            access_offer_ids: None,
        }
    }

    #[test]
    fn test_transform_forces_public() {
        let page = Page::from(remote("Secret", Some("main"), Some(true)));
        assert!(!page.is_private);
        assert!(!page.display_in_header);
        assert_eq!(page.placement, Placement::Main);
    }

    #[test]
    fn test_placement_parsing() {
        assert_eq!(Placement::from("main".to_string()), Placement::Main);
        assert_eq!(Placement::from("footer".to_string()), Placement::Footer);
        assert_eq!(
            Placement::from("sidebar".to_string()),
            Placement::Other("sidebar".to_string())
        );
        assert_eq!(Placement::from(None::<String>), Placement::Unassigned);
    }

    #[test]
    fn test_partition_drops_unknown_placements() {
        let pages = vec![
            Page::new("A", "a", Placement::Main),
            Page::new("B", "b", Placement::Footer),
            Page::new("C", "c", Placement::Other("sidebar".to_string())),
            Page::new("D", "d", Placement::Unassigned),
            Page::new("E", "e", Placement::Main),
        ];
        let state = NavigationState::partition(pages);

        let main: Vec<_> = state.main_nav.iter().map(|p| p.label.as_str()).collect();
        let footer: Vec<_> = state.footer_nav.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(main, vec!["A", "E"]);
        assert_eq!(footer, vec!["B"]);
    }

    #[test]
    fn test_merge_appends_fallback_without_dedup() {
        let fallback = vec![Page::new("Home", "home", Placement::Main)];
        let state = NavigationState::merge(vec![remote("Home", Some("main"), None)], &fallback);
        assert_eq!(state.main_nav.len(), 2);
        assert_eq!(state.main_nav[1], fallback[0]);
    }

    #[test]
    fn test_remote_page_decoding() {
        let json = r#"{
            "id": "64f0",
            "label": "Shop",
            "slug": "shop",
            "displayInHeader": null,
            "navigation": "footer",
            "isPrivate": true,
            "accessOfferIds": { "magineOfferId": "o1" }
        }"#;
        let page: RemotePage = serde_json::from_str(json).unwrap();
        assert_eq!(page.offer_id(), Some("o1"));
        assert_eq!(page.display_in_header, None);

        let page = Page::from(page);
        assert_eq!(page.placement, Placement::Footer);
        assert!(!page.is_private);
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let value = serde_json::to_value(Page::new("Home", "home", Placement::Footer).in_header()).unwrap();
        assert_eq!(value["displayInHeader"], true);
        assert_eq!(value["isPrivate"], false);
        assert_eq!(value["placement"], "footer");
    }

    #[test]
    fn test_entitlement_set_dedups_in_order() {
        let set: EntitlementSet = ["o2", "o1", "o2"].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["o2", "o1"]);
        assert!(set.contains("o1"));
        assert!(!set.contains("o3"));
    }
}
