use super::card::AgentCard;
use super::error::DirectoryError;

/// Ordered collection of known agent cards, keyed by `url`, with one active selection.
///
/// New URLs are appended; a card whose URL is already present replaces the old entry at
/// its existing position. Entries are never removed, so the active selection can only
/// point at a registered card.
#[derive(Debug, Clone, Default)]
pub struct AgentDirectory {
    entries: Vec<AgentCard>,
    active: Option<String>,
}

impl AgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `card` and makes it the active selection.
    ///
    /// Returns the index the card now occupies.
    pub fn register(&mut self, card: AgentCard) -> usize {
        let url = card.url.clone();
        let index = match self.position(&url) {
            Some(index) => {
                self.entries[index] = card;
                index
            }
            None => {
                self.entries.push(card);
                self.entries.len() - 1
            }
        };
        self.active = Some(url);
        index
    }

    /// Snapshot of all cards in directory order.
    pub fn list_all(&self) -> Vec<AgentCard> {
        self.entries.clone()
    }

    pub fn entries(&self) -> &[AgentCard] {
        &self.entries
    }

    pub fn get(&self, url: &str) -> Option<&AgentCard> {
        self.entries.iter().find(|card| card.url == url)
    }

    pub fn get_active(&self) -> Option<AgentCard> {
        self.active_card().cloned()
    }

    pub fn active_card(&self) -> Option<&AgentCard> {
        self.active.as_deref().and_then(|url| self.get(url))
    }

    /// Changes the active selection.
    ///
    /// `None` clears it. A card is matched by `url`; one that is not registered is
    /// rejected and the current selection is kept.
    pub fn set_active(&mut self, card: Option<&AgentCard>) -> Result<(), DirectoryError> {
        match card {
            None => {
                self.active = None;
                Ok(())
            }
            Some(card) if self.position(&card.url).is_some() => {
                self.active = Some(card.url.clone());
                Ok(())
            }
            Some(card) => Err(DirectoryError::DirectoryInvariantViolation {
                url: card.url.clone(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, url: &str) -> Option<usize> {
        self.entries.iter().position(|card| card.url == url)
    }
}
