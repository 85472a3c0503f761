//! The navigation supplier.
//!
//! Holds the grouped navigation state and refreshes it whenever the host
//! reports a new auth token. At most one fetch runs per supplier; starting a
//! new one cancels the previous, and only the latest fetch may publish.

use futures::Stream;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{SupplierConfig, TokenPolicy};
use crate::model::{NavigationState, Page};
use crate::source::{HttpNavigationSource, NavError, NavigationSource, PageFilter};

/// How a single refresh ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// State was replaced with the given group sizes.
    Updated { main: usize, footer: usize },
    /// The token policy said not to fetch.
    Skipped,
    /// A newer fetch started before this one could publish.
    Superseded,
}

/// Handle for one fetch: its generation and the token that cancels it.
#[derive(Debug, Clone)]
struct FetchTicket {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct InFlight {
    next_generation: u64,
    current: Option<FetchTicket>,
}

pub struct NavigationSupplier {
    source: Arc<dyn NavigationSource>,
    fallback: Vec<Page>,
    policy: TokenPolicy,
    state: watch::Sender<NavigationState>,
    in_flight: Mutex<InFlight>,
}

impl NavigationSupplier {
    pub fn new(source: Arc<dyn NavigationSource>, fallback: Vec<Page>, policy: TokenPolicy) -> Self {
        let (state, _) = watch::channel(NavigationState::default());
        Self {
            source,
            fallback,
            policy,
            state,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    /// Builds a supplier backed by the HTTP source described in `config`.
    pub fn from_config(config: &SupplierConfig) -> Result<Self, NavError> {
        let source = HttpNavigationSource::new(config)?;
        Ok(Self::new(Arc::new(source), config.fallback(), config.token_policy))
    }

    /// Loads config from `path` (plus env overrides) and builds a supplier from it.
    pub fn from_config_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let config = SupplierConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        Self::from_config(&config).context("failed to set up navigation source")
    }

    pub fn policy(&self) -> TokenPolicy {
        self.policy
    }

    /// Current navigation state.
    pub fn snapshot(&self) -> NavigationState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state replacement.
    pub fn subscribe(&self) -> watch::Receiver<NavigationState> {
        self.state.subscribe()
    }

    /// Stream of states, starting with the current one and yielding each replacement.
    pub fn updates(&self) -> impl Stream<Item = NavigationState> + Send + 'static {
        let mut rx = self.subscribe();
        rx.mark_changed();
        futures::stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let state = rx.borrow_and_update().clone();
            Some((state, rx))
        })
    }

    /// Calls `callback` after every state replacement until the supplier is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn on_change<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(&NavigationState) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                callback(&state);
            }
        })
    }

    /// Entry point for the host: the auth token changed.
    ///
    /// Any running fetch is cancelled before this returns; the new fetch runs
    /// in the background and its failures are logged, never surfaced. When the
    /// token policy skips the fetch, the returned handle is already finished.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn on_auth_token_change(self: &Arc<Self>, token: Option<&str>) -> JoinHandle<()> {
        let Some(token) = self.policy.token_to_fetch(token).map(str::to_string) else {
            debug!("No auth token, skipping navigation fetch");
            self.cancel_in_flight();
            return tokio::spawn(async {});
        };

        let ticket = self.begin();
        let supplier = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = supplier.run(ticket, &token).await;
            log_outcome(outcome);
        })
    }

    /// Feeds token changes from `tokens` into [`Self::on_auth_token_change`],
    /// starting with its current value. Notifications that repeat the last
    /// token are ignored. Stops when the sender goes away.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn_token_listener(
        self: &Arc<Self>,
        mut tokens: watch::Receiver<Option<String>>,
    ) -> JoinHandle<()> {
        let supplier = Arc::clone(self);
        tokio::spawn(async move {
            let mut last: Option<Option<String>> = None;
            loop {
                let token = tokens.borrow_and_update().clone();
                if last.as_ref() != Some(&token) {
                    supplier.on_auth_token_change(token.as_deref());
                    last = Some(token);
                } else {
                    debug!("Auth token unchanged, keeping current navigation fetch");
                }
                if tokens.changed().await.is_err() {
                    break;
                }
            }
            debug!("Auth token source closed");
            supplier.cancel_in_flight();
        })
    }

    /// Runs one fetch to completion, superseding any fetch already running.
    pub async fn refresh(&self, token: Option<&str>) -> Result<RefreshOutcome, NavError> {
        let Some(token) = self.policy.token_to_fetch(token) else {
            self.cancel_in_flight();
            return Ok(RefreshOutcome::Skipped);
        };

        let ticket = self.begin();
        self.run(ticket, token).await
    }

    pub fn cancel_in_flight(&self) {
        if let Some(ticket) = self.lock_in_flight().current.take() {
            debug!("Cancelling navigation fetch #{}", ticket.generation);
            ticket.cancel.cancel();
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self) -> FetchTicket {
        let mut in_flight = self.lock_in_flight();
        if let Some(previous) = in_flight.current.take() {
            debug!("Superseding navigation fetch #{}", previous.generation);
            previous.cancel.cancel();
        }

        in_flight.next_generation += 1;
        let ticket = FetchTicket {
            generation: in_flight.next_generation,
            cancel: CancellationToken::new(),
        };
        in_flight.current = Some(ticket.clone());
        ticket
    }

    async fn run(&self, ticket: FetchTicket, token: &str) -> Result<RefreshOutcome, NavError> {
        let result = self.fetch_state(&ticket.cancel, token).await;

        let mut in_flight = self.lock_in_flight();
        let is_current = !ticket.cancel.is_cancelled()
            && in_flight
                .current
                .as_ref()
                .is_some_and(|current| current.generation == ticket.generation);
        if is_current {
            in_flight.current = None;
        }

        let Some(state) = settle(ticket.generation, result, is_current)? else {
            return Ok(RefreshOutcome::Superseded);
        };

        let outcome = RefreshOutcome::Updated {
            main: state.main_nav.len(),
            footer: state.footer_nav.len(),
        };
        // Published while still holding the slot lock so a fetch started
        // concurrently cannot slip in between the check and the write.
        self.state.send_replace(state);
        Ok(outcome)
    }

    async fn fetch_state(&self, cancel: &CancellationToken, token: &str) -> Result<NavigationState, NavError> {
        let entitlements = until_cancelled(cancel, self.source.fetch_entitlements(token)).await?;
        let filter = PageFilter::entitled(entitlements);
        let remote = until_cancelled(cancel, self.source.fetch_pages(&filter)).await?;
        debug!("Fetched {} pages, appending {} fallback pages", remote.len(), self.fallback.len());
        Ok(NavigationState::merge(remote, &self.fallback))
    }
}

impl Drop for NavigationSupplier {
    fn drop(&mut self) {
        self.cancel_in_flight();
    }
}

async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, NavError>
where
    F: Future<Output = Result<T, NavError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NavError::Cancelled),
        result = fut => result,
    }
}

/// Decides what a finished fetch may do: `Some` to publish, `None` when it
/// was superseded. Only the current fetch reports errors; a stale one's
/// failure no longer concerns anyone.
fn settle(
    generation: u64,
    result: Result<NavigationState, NavError>,
    is_current: bool,
) -> Result<Option<NavigationState>, NavError> {
    match result {
        Ok(state) if is_current => Ok(Some(state)),
        Ok(_) | Err(NavError::Cancelled) => Ok(None),
        Err(e) if is_current => Err(e),
        Err(e) => {
            debug!("Superseded navigation fetch #{} failed: {}", generation, e);
            Ok(None)
        }
    }
}

fn log_outcome(outcome: Result<RefreshOutcome, NavError>) {
    match outcome {
        Ok(RefreshOutcome::Updated { main, footer }) => {
            info!("Navigation updated: {} main, {} footer", main, footer)
        }
        Ok(RefreshOutcome::Superseded) => debug!("Navigation fetch superseded"),
        Ok(RefreshOutcome::Skipped) => {}
        Err(e) => error!("Error fetching pages: {}", e),
    }
}
