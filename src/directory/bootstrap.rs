use std::future::Future;

use futures_util::future::join_all;
use log::{debug, warn};
use tokio::task::JoinHandle;

use super::card::AgentCard;
use super::error::DirectoryError;

/// Splits a comma-separated URL list, trimming entries and dropping blank ones.
pub fn parse_agent_urls(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(String::from)
        .collect()
}

/// Result of one bootstrap registration attempt.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub url: String,
    pub result: Result<AgentCard, DirectoryError>,
}

/// Every attempt of a bootstrap run, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    pub outcomes: Vec<BootstrapOutcome>,
}

impl BootstrapReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &AgentCard> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &DirectoryError)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            Ok(_) => None,
            Err(err) => Some((outcome.url.as_str(), err)),
        })
    }
}

/// Tasks launched by `load_defaults`.
///
/// The tasks run whether or not the handle is awaited; dropping it detaches them.
#[derive(Debug)]
pub struct BootstrapHandle {
    tasks: Vec<(String, JoinHandle<BootstrapOutcome>)>,
}

impl BootstrapHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every attempt to finish.
    pub async fn wait(self) -> BootstrapReport {
        let (urls, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        let results = join_all(handles).await;
        let outcomes = urls
            .into_iter()
            .zip(results)
            .map(|(url, joined)| match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!("Bootstrap task for {} did not complete: {}", url, err);
                    let result = Err(DirectoryError::resolution(
                        url.clone(),
                        format!("bootstrap task did not complete: {err}"),
                    ));
                    BootstrapOutcome { url, result }
                }
            })
            .collect();
        BootstrapReport { outcomes }
    }
}

/// Starts one independent registration task per URL.
///
/// `register` resolves and registers a single URL. Each attempt runs in its own task,
/// so a slow or failing endpoint never holds back the others.
pub fn load_defaults<F, Fut>(urls: Vec<String>, register: F) -> BootstrapHandle
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<AgentCard, DirectoryError>> + Send + 'static,
{
    let tasks = urls
        .into_iter()
        .map(|url| {
            debug!("Bootstrapping default agent {}", url);
            let attempt = register(url.clone());
            let task_url = url.clone();
            let handle = tokio::spawn(async move {
                let result = attempt.await;
                BootstrapOutcome {
                    url: task_url,
                    result,
                }
            });
            (url, handle)
        })
        .collect();
    BootstrapHandle { tasks }
}
