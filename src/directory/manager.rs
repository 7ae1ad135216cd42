use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

use crate::config::DirectorySettings;
use crate::directory::bootstrap::{self, BootstrapHandle};
use crate::directory::card::AgentCard;
use crate::directory::error::DirectoryError;
use crate::directory::fetch::{self, Fetch};
use crate::directory::resolver;
use crate::directory::store::AgentDirectory;

/// Notifications emitted while agents are being added.
/// The host decides how to surface them (toast, status line, log).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEvent {
    /// An agent card was fetched and registered.
    Added { name: String, url: String },
    /// Fetching an agent card failed.
    Failed { url: String, message: String },
}

impl DirectoryEvent {
    /// Human-readable text for the notification.
    pub fn message(&self) -> String {
        match self {
            DirectoryEvent::Added { name, .. } => format!("Added {name}"),
            DirectoryEvent::Failed { message, .. } => {
                format!("Failed to fetch agent card: {message}")
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DirectoryEvent::Failed { .. })
    }
}

/// The directory state as last committed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectorySnapshot {
    pub agents: Vec<AgentCard>,
    pub active: Option<AgentCard>,
}

impl DirectorySnapshot {
    fn of(directory: &AgentDirectory) -> Self {
        Self {
            agents: directory.list_all(),
            active: directory.get_active(),
        }
    }
}

/// Session-scoped owner of the agent directory.
///
/// `DirectoryManager` is responsible for:
/// - Resolving agent URLs through the configured fetch (with its extra headers).
/// - Serializing every mutation of the directory and its active selection.
/// - Publishing a fresh `DirectorySnapshot` after each mutation.
/// - Emitting a `DirectoryEvent` for every add attempt that succeeds or fails.
pub struct DirectoryManager {
    shared: Arc<Shared>,
    events_rx: UnboundedReceiver<DirectoryEvent>,
}

/// State reachable from bootstrap tasks.
struct Shared {
    directory: Mutex<AgentDirectory>,
    fetch: Arc<dyn Fetch>,
    snapshots: watch::Sender<DirectorySnapshot>,
    events_tx: UnboundedSender<DirectoryEvent>,
    initialized: AtomicBool,
}

impl DirectoryManager {
    /// Creates an empty directory that resolves agents through `fetch`.
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(DirectorySnapshot::default());
        Self {
            shared: Arc::new(Shared {
                directory: Mutex::new(AgentDirectory::new()),
                fetch,
                snapshots,
                events_tx,
                initialized: AtomicBool::new(false),
            }),
            events_rx,
        }
    }

    /// Creates a directory whose requests carry the configured headers and timeout.
    pub fn from_settings(settings: &DirectorySettings) -> Result<Self> {
        let proxy = fetch::create_proxy_fetch(Some(settings.resolved_headers()), settings.timeout())
            .context("Failed to build HTTP client for agent discovery")?;
        Ok(Self::new(Arc::new(proxy)))
    }

    /// Registers the default agents. Meant to be called once per session; later calls
    /// start nothing and return an empty handle.
    ///
    /// The returned handle may be awaited for a report or dropped.
    pub fn initialize(&self, urls: Vec<String>) -> BootstrapHandle {
        let urls = if self.shared.initialized.swap(true, Ordering::SeqCst) {
            warn!("Agent directory already initialized, ignoring default URLs.");
            Vec::new()
        } else {
            info!("Loading {} default agent(s)", urls.len());
            urls
        };
        bootstrap::load_defaults(urls, |url| {
            let shared = self.shared.clone();
            async move { shared.add(&url).await }
        })
    }

    /// Resolves `url` and registers the agent, making it active.
    ///
    /// A blank URL does nothing. A failure is reported as a `DirectoryEvent::Failed` and
    /// also returned so the caller can update its own state.
    pub async fn add_agent_by_url(&self, url: &str) -> Result<(), DirectoryError> {
        match self.shared.add(url).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_invalid_input() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Changes the active agent. Cards not in the directory are rejected.
    pub fn set_active_agent(&self, card: Option<&AgentCard>) -> Result<(), DirectoryError> {
        let result = self.shared.commit(|directory| directory.set_active(card));
        if let Err(err) = &result {
            warn!("Rejected active agent change: {}", err);
        }
        result
    }

    /// All known agents, in directory order.
    pub fn agents(&self) -> Vec<AgentCard> {
        self.shared.read(AgentDirectory::list_all)
    }

    pub fn active_agent(&self) -> Option<AgentCard> {
        self.shared.read(AgentDirectory::get_active)
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        self.shared.snapshots.borrow().clone()
    }

    /// Receiver that observes every committed change.
    pub fn subscribe(&self) -> watch::Receiver<DirectorySnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Takes the next pending notification without waiting.
    pub fn poll_event(&mut self) -> Option<DirectoryEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Waits for the next notification.
    pub async fn next_event(&mut self) -> Option<DirectoryEvent> {
        self.events_rx.recv().await
    }
}

impl Shared {
    async fn add(&self, url: &str) -> Result<AgentCard, DirectoryError> {
        let source = url.trim();
        let resolved = match resolver::resolve(source, self.fetch.clone()).await {
            Ok(resolved) => resolved,
            Err(DirectoryError::InvalidInput) => {
                debug!("Ignoring empty agent URL");
                return Err(DirectoryError::InvalidInput);
            }
            Err(err) => {
                error!("Error adding agent {}: {}", source, err);
                self.notify(DirectoryEvent::Failed {
                    url: source.to_string(),
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        let card = resolved.card;
        let index = self.commit(|directory| directory.register(card.clone()));
        info!("Registered agent {} ({}) at position {}", card.name, card.url, index);
        self.notify(DirectoryEvent::Added {
            name: card.name.clone(),
            url: card.url.clone(),
        });
        Ok(card)
    }

    /// Applies `mutate` under the directory lock and publishes the resulting snapshot.
    /// Subscribers are only woken when the snapshot actually differs.
    fn commit<T>(&self, mutate: impl FnOnce(&mut AgentDirectory) -> T) -> T {
        let mut directory = self
            .directory
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let result = mutate(&mut directory);
        let next = DirectorySnapshot::of(&directory);
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        result
    }

    fn read<T>(&self, view: impl FnOnce(&AgentDirectory) -> T) -> T {
        let directory = self
            .directory
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        view(&directory)
    }

    fn notify(&self, event: DirectoryEvent) {
        // The receiver lives in the manager; a closed channel only means nobody listens.
        let _ = self.events_tx.send(event);
    }
}
