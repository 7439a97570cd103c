use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator Anki uses between the segments of a nested deck name
pub const DECK_SEPARATOR: &str = "::";

/// Result of the `list_decks` tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckListing {
    pub decks: Vec<DeckInfo>,
    pub hierarchy: Vec<DeckHierarchyNode>,
    pub connection_info: ConnectionInfo,
}

/// A single deck as reported by AnkiConnect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckInfo {
    pub id: String,
    pub name: String,
    pub deck_type: DeckType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    pub base_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<DeckStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_count: Option<usize>,
    pub cards_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeckType {
    Root,
    Subdeck,
}

/// Due counts for a deck, as returned by `getDeckStats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckStatistics {
    pub new_count: u32,
    pub learn_count: u32,
    pub review_count: u32,
    pub total_in_deck: u32,
}

/// Node of the deck tree rebuilt from `::`-separated names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckHierarchyNode {
    pub name: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub children: Vec<DeckHierarchyNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ankiconnect_version: Option<String>,
    pub endpoint: String,
    pub total_decks: usize,
    pub timestamp: u64,
    pub connection_successful: bool,
}

impl DeckInfo {
    pub fn new(name: &str, id: i64) -> Self {
        let (parent_name, base_name) = match name.rsplit_once(DECK_SEPARATOR) {
            Some((parent, base)) => (Some(parent.to_string()), base.to_string()),
            None => (None, name.to_string()),
        };

        Self {
            id: id.to_string(),
            name: name.to_string(),
            deck_type: if parent_name.is_some() {
                DeckType::Subdeck
            } else {
                DeckType::Root
            },
            parent_name,
            base_name,
            statistics: None,
            card_count: None,
            cards_available: false,
        }
    }
}

impl DeckHierarchyNode {
    /// Builds the deck forest from a name -> id map.
    ///
    /// Parents missing from the map still get a node, without an id.
    pub fn build(decks: &BTreeMap<String, i64>) -> Vec<Self> {
        let mut roots: Vec<Self> = Vec::new();

        for (full_name, id) in decks {
            let mut level = &mut roots;
            let mut path = String::new();

            for segment in full_name.split(DECK_SEPARATOR) {
                if !path.is_empty() {
                    path.push_str(DECK_SEPARATOR);
                }
                path.push_str(segment);

                let index = match level.iter().position(|node| node.name == segment) {
                    Some(index) => index,
                    None => {
                        level.push(Self {
                            name: segment.to_string(),
                            full_name: path.clone(),
                            id: None,
                            children: Vec::new(),
                        });
                        level.len() - 1
                    }
                };

                let node = &mut level[index];
                if node.full_name == *full_name {
                    node.id = Some(id.to_string());
                }
                level = &mut node.children;
            }
        }

        roots
    }
}

impl ConnectionInfo {
    pub fn connected(version: u16, endpoint: &str, total_decks: usize) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();

        Self {
            ankiconnect_version: Some(version.to_string()),
            endpoint: endpoint.to_string(),
            total_decks,
            timestamp,
            connection_successful: true,
        }
    }
}
