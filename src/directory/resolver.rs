use std::sync::Arc;

use log::debug;
use reqwest::Url;

use super::card::AgentCard;
use super::error::DirectoryError;
use super::fetch::{Fetch, FetchRequest, FetchResponse};

/// Well-known location of an agent's self-description.
pub const AGENT_CARD_PATH: &str = ".well-known/agent-card.json";
/// Location used by agents published before the card path was renamed.
pub const LEGACY_AGENT_CARD_PATH: &str = ".well-known/agent.json";

/// A client bound to one agent's card location.
///
/// Holds the fetch function it was resolved with so the card can be fetched again with
/// the same headers.
#[derive(Clone)]
pub struct AgentClient {
    base_url: Url,
    card_url: Url,
    fetch: Arc<dyn Fetch>,
    card: AgentCard,
}

impl AgentClient {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The URL the card was actually served from.
    pub fn card_url(&self) -> &Url {
        &self.card_url
    }

    /// The card fetched during resolution.
    pub fn agent_card(&self) -> &AgentCard {
        &self.card
    }

    /// Fetches the card again from the location found during discovery.
    pub async fn refresh_card(&mut self) -> Result<AgentCard, DirectoryError> {
        let source = self.base_url.to_string();
        let response = fetch_document(self.fetch.as_ref(), &source, &self.card_url).await?;
        if !response.is_success() {
            return Err(status_error(&source, &self.card_url, &response));
        }
        let card = parse_card(&source, &self.card_url, &response)?;
        self.card = card.clone();
        Ok(card)
    }
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("base_url", &self.base_url.as_str())
            .field("card_url", &self.card_url.as_str())
            .field("card", &self.card.name)
            .finish()
    }
}

/// The outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub client: AgentClient,
    pub card: AgentCard,
}

/// Discovers the agent at `url` and fetches its card.
///
/// An input whose path ends in `.json` is treated as the card location itself. Otherwise
/// the well-known card path under the input is tried, then the legacy path when the
/// first answers 404. No retries are made.
pub async fn resolve(url: &str, fetch: Arc<dyn Fetch>) -> Result<Resolved, DirectoryError> {
    let source = url.trim();
    if source.is_empty() {
        return Err(DirectoryError::InvalidInput);
    }
    let base_url = normalize_url(source)?;

    let mut last_error = None;
    for card_url in discovery_urls(&base_url)? {
        debug!("Fetching agent card from {}", card_url);
        let response = fetch_document(fetch.as_ref(), source, &card_url).await?;
        if response.status == 404 {
            last_error = Some(status_error(source, &card_url, &response));
            continue;
        }
        if !response.is_success() {
            return Err(status_error(source, &card_url, &response));
        }
        let card = parse_card(base_url.as_str(), &card_url, &response)?;
        let client = AgentClient {
            base_url,
            card_url,
            fetch,
            card: card.clone(),
        };
        return Ok(Resolved { client, card });
    }

    Err(last_error
        .unwrap_or_else(|| DirectoryError::resolution(source, "no agent card location found")))
}

/// Trims, parses and strips the fragment of an agent URL.
pub fn normalize_url(raw: &str) -> Result<Url, DirectoryError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|err| DirectoryError::resolution(raw, format!("invalid agent URL {raw}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DirectoryError::resolution(
            raw,
            format!("unsupported URL scheme: {}", url.scheme()),
        ));
    }
    url.set_fragment(None);
    Ok(url)
}

/// Lists the locations tried for the card, in order.
pub fn discovery_urls(base_url: &Url) -> Result<Vec<Url>, DirectoryError> {
    if base_url.path().ends_with(".json") {
        return Ok(vec![base_url.clone()]);
    }
    let mut root = base_url.clone();
    root.set_query(None);
    let mut prefix = root.to_string();
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    [AGENT_CARD_PATH, LEGACY_AGENT_CARD_PATH]
        .iter()
        .map(|path| {
            Url::parse(&format!("{prefix}{path}")).map_err(|err| {
                DirectoryError::resolution(base_url.as_str(), format!("invalid card URL: {err}"))
            })
        })
        .collect()
}

async fn fetch_document(
    fetch: &dyn Fetch,
    source: &str,
    card_url: &Url,
) -> Result<FetchResponse, DirectoryError> {
    fetch
        .fetch(FetchRequest::get(card_url.as_str()))
        .await
        .map_err(|err| {
            DirectoryError::resolution(source, format!("request to {card_url} failed: {err}"))
        })
}

fn status_error(source: &str, card_url: &Url, response: &FetchResponse) -> DirectoryError {
    let excerpt = response.excerpt();
    let message = if excerpt.is_empty() {
        format!("HTTP {} from {card_url}", response.status)
    } else {
        format!("HTTP {} from {card_url}: {excerpt}", response.status)
    };
    DirectoryError::resolution(source, message)
}

fn parse_card(
    fallback_url: &str,
    card_url: &Url,
    response: &FetchResponse,
) -> Result<AgentCard, DirectoryError> {
    AgentCard::from_document(&response.body, fallback_url)
        .map_err(|message| DirectoryError::resolution(card_url.as_str(), message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::fetch::testing::FakeFetch;

    const CARD_A: &str = r#"{"name":"Agent A","url":"https://agenta.example/","version":"1"}"#;

    fn shared(fake: FakeFetch) -> Arc<FakeFetch> {
        Arc::new(fake)
    }

    #[tokio::test]
    async fn resolves_from_well_known_path() {
        let fake = shared(
            FakeFetch::new().json("https://agenta.example/.well-known/agent-card.json", CARD_A),
        );
        let resolved = resolve("  https://agentA.example/  ", fake.clone()).await.unwrap();

        assert_eq!(resolved.card.name, "Agent A");
        assert_eq!(resolved.card.url, "https://agenta.example/");
        assert_eq!(
            resolved.client.card_url().as_str(),
            "https://agenta.example/.well-known/agent-card.json"
        );
        assert_eq!(resolved.client.agent_card(), &resolved.card);
        assert_eq!(fake.requested_urls().len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_legacy_path_on_not_found() {
        let fake = shared(
            FakeFetch::new().json("https://old.example/api/.well-known/agent.json", r#"{"name":"Old"}"#),
        );
        let resolved = resolve("https://old.example/api", fake.clone()).await.unwrap();

        assert_eq!(resolved.card.name, "Old");
        assert_eq!(resolved.card.url, "https://old.example/api");
        assert_eq!(
            fake.requested_urls(),
            vec![
                "https://old.example/api/.well-known/agent-card.json",
                "https://old.example/api/.well-known/agent.json",
            ]
        );
    }

    #[tokio::test]
    async fn json_url_is_fetched_directly() {
        let fake = shared(FakeFetch::new().json("https://c.example/cards/c.json", CARD_A));
        let resolved = resolve("https://c.example/cards/c.json", fake.clone())
            .await
            .unwrap();
        assert_eq!(resolved.card.name, "Agent A");
        assert_eq!(fake.requested_urls(), vec!["https://c.example/cards/c.json"]);
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let fake = shared(FakeFetch::new());
        assert_eq!(
            resolve("   ", fake.clone()).await.unwrap_err(),
            DirectoryError::InvalidInput
        );
        assert!(fake.requested_urls().is_empty());
    }

    #[tokio::test]
    async fn failures_carry_upstream_message() {
        let fake = shared(
            FakeFetch::new()
                .fail("https://down.example/.well-known/agent-card.json", "connection refused")
                .respond("https://broken.example/.well-known/agent-card.json", 500, "boom")
                .json("https://garbage.example/.well-known/agent-card.json", "not json"),
        );

        let err = resolve("https://down.example/", fake.clone()).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"), "{err}");

        let err = resolve("https://broken.example/", fake.clone()).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"), "{err}");
        assert!(err.to_string().contains("boom"), "{err}");

        let err = resolve("https://garbage.example/", fake.clone()).await.unwrap_err();
        assert!(err.to_string().contains("malformed agent card"), "{err}");

        let err = resolve("https://missing.example/", fake.clone()).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 404"), "{err}");

        let err = resolve("ftp://files.example/", fake).await.unwrap_err();
        assert!(matches!(err, DirectoryError::ResolutionFailed { .. }));
    }

    #[tokio::test]
    async fn refresh_card_refetches_from_same_location() {
        let fake = shared(
            FakeFetch::new()
                .json("https://agenta.example/.well-known/agent-card.json", CARD_A)
                .json(
                    "https://agenta.example/.well-known/agent-card.json",
                    r#"{"name":"Agent A v2","url":"https://agenta.example/"}"#,
                ),
        );
        let mut resolved = resolve("https://agenta.example/", fake).await.unwrap();
        let refreshed = resolved.client.refresh_card().await.unwrap();
        assert_eq!(refreshed.name, "Agent A v2");
        assert_eq!(resolved.client.agent_card().name, "Agent A v2");
    }

    #[tokio::test]
    async fn refresh_card_rejects_error_status_with_card_like_body() {
        let fake = shared(
            FakeFetch::new()
                .json("https://agenta.example/.well-known/agent-card.json", CARD_A)
                .respond(
                    "https://agenta.example/.well-known/agent-card.json",
                    503,
                    r#"{"name":"Maintenance page"}"#,
                ),
        );
        let mut resolved = resolve("https://agenta.example/", fake).await.unwrap();
        assert_eq!(resolved.client.base_url().as_str(), "https://agenta.example/");

        let err = resolved.client.refresh_card().await.unwrap_err();
        assert!(matches!(err, DirectoryError::ResolutionFailed { .. }));
        assert!(err.to_string().contains("HTTP 503"), "{err}");
        assert_eq!(resolved.client.agent_card().name, "Agent A");
    }

    #[tokio::test]
    async fn unresponsive_endpoint_times_out_as_resolution_failure() {
        use std::time::{Duration, Instant};

        use tokio::net::TcpListener;

        use crate::directory::fetch::HttpFetch;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and hold them open without ever answering.
        let server = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let fetch = Arc::new(HttpFetch::new(Duration::from_millis(50)).unwrap());
        let started = Instant::now();
        let err = resolve(&format!("http://{addr}/"), fetch).await.unwrap_err();

        assert!(matches!(err, DirectoryError::ResolutionFailed { .. }), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }

    #[test]
    fn discovery_drops_query_and_fragment() {
        let base = normalize_url("https://q.example/agent?x=1#frag").unwrap();
        let urls = discovery_urls(&base).unwrap();
        assert_eq!(
            urls[0].as_str(),
            "https://q.example/agent/.well-known/agent-card.json"
        );
    }
}
