//! Navigation data for a web front end.
//!
//! [`NavigationSupplier`] fetches the pages a viewer may see from a content
//! API, appends a static fallback list and publishes them split into main and
//! footer navigation. Hosts drive it with auth token changes and read the
//! result through a `watch` subscription.

pub mod config;
pub mod model;
pub mod source;
pub mod supplier;
pub mod telemetry;

pub use config::{FallbackPage, SupplierConfig, TokenPolicy};
pub use model::{EntitlementSet, NavigationState, Page, Placement, RemotePage};
pub use source::{HttpNavigationSource, NavError, NavigationSource, PageFilter};
pub use supplier::{NavigationSupplier, RefreshOutcome};
pub use telemetry::init_tracing;
