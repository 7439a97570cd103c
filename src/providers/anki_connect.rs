use crate::{
    Config, ConnectionInfo, DeckHierarchyNode, DeckInfo, DeckListing, DeckStatistics, Error,
    Result,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use url::Url;

#[derive(Clone)]
pub struct AnkiConnectProvider(Arc<State>);

struct State {
    client: reqwest::Client,
    endpoint: Url,
    api_version: u8,
}

#[derive(Serialize)]
struct Request<'a> {
    action: &'a str,
    version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Deserialize)]
struct Reply<T> {
    result: Option<T>,
    error: Option<String>,
}

/// One entry of the `getDeckStats` reply, keyed by deck id
#[derive(Debug, Deserialize)]
struct RawDeckStats {
    name: String,
    new_count: u32,
    learn_count: u32,
    review_count: u32,
    total_in_deck: u32,
}

impl From<RawDeckStats> for DeckStatistics {
    fn from(raw: RawDeckStats) -> Self {
        Self {
            new_count: raw.new_count,
            learn_count: raw.learn_count,
            review_count: raw.review_count,
            total_in_deck: raw.total_in_deck,
        }
    }
}

impl AnkiConnectProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let state = State {
            client,
            endpoint: config.anki_url.clone(),
            api_version: config.api_version,
        };
        Ok(Self(Arc::new(state)))
    }

    pub fn endpoint(&self) -> &Url {
        &self.0.endpoint
    }

    /// Performs a single AnkiConnect action and unwraps its `{result, error}` reply.
    pub async fn invoke<T: DeserializeOwned>(&self, action: &str, params: Option<Value>) -> Result<T> {
        let request = Request {
            action,
            version: self.0.api_version,
            params,
        };

        tracing::debug!(action, "AnkiConnect request");
        let response = self
            .0
            .client
            .post(self.0.endpoint.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let reply: Reply<T> = response.json().await?;

        if let Some(message) = reply.error {
            return Err(Error::AnkiConnect {
                action: action.to_string(),
                message,
            });
        }

        reply
            .result
            .ok_or_else(|| Error::MissingResult(action.to_string()))
    }

    pub async fn version(&self) -> Result<u16> {
        self.invoke("version", None).await
    }

    pub async fn deck_names_and_ids(&self) -> Result<BTreeMap<String, i64>> {
        self.invoke("deckNamesAndIds", None).await
    }

    /// Returns statistics keyed by deck name.
    pub async fn deck_stats(&self, decks: &[String]) -> Result<HashMap<String, DeckStatistics>> {
        let raw: HashMap<String, RawDeckStats> = self
            .invoke("getDeckStats", Some(json!({ "decks": decks })))
            .await?;

        Ok(raw
            .into_values()
            .map(|stats| (stats.name.clone(), stats.into()))
            .collect())
    }

    pub async fn find_cards(&self, query: &str) -> Result<Vec<i64>> {
        self.invoke("findCards", Some(json!({ "query": query })))
            .await
    }

    /// Collects every deck with its statistics, card count and place in the deck tree.
    ///
    /// Only the `version` and `deckNamesAndIds` calls are required to succeed; the
    /// per-deck details degrade to absent fields.
    pub async fn deck_listing(&self) -> Result<DeckListing> {
        let version = self.version().await.map_err(|err| {
            Error::Connection(format!(
                "Failed to connect to AnkiConnect. Please ensure Anki is running and AnkiConnect plugin is installed. Error: {err}"
            ))
        })?;
        tracing::info!(version, endpoint = %self.0.endpoint, "connected to AnkiConnect");

        if version < u16::from(self.0.api_version) {
            tracing::warn!(
                version,
                requested = self.0.api_version,
                "AnkiConnect is older than the requested API version"
            );
        }

        let decks = self.deck_names_and_ids().await.map_err(|err| {
            Error::Connection(format!("Failed to retrieve decks from Anki: {err}"))
        })?;

        let names: Vec<String> = decks.keys().cloned().collect();
        let mut stats = match self.deck_stats(&names).await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::warn!("Failed to get deck statistics: {err}");
                HashMap::new()
            }
        };

        let mut infos = Vec::with_capacity(decks.len());
        for (name, id) in &decks {
            let mut info = DeckInfo::new(name, *id);
            info.statistics = stats.remove(name);

            match self.find_cards(&deck_query(name)).await {
                Ok(cards) => {
                    info.card_count = Some(cards.len());
                    info.cards_available = true;
                }
                Err(err) => {
                    tracing::warn!("Failed to get cards for deck '{name}': {err}");
                }
            }

            infos.push(info);
        }

        let hierarchy = DeckHierarchyNode::build(&decks);
        let connection_info =
            ConnectionInfo::connected(version, self.0.endpoint.as_str(), decks.len());

        Ok(DeckListing {
            decks: infos,
            hierarchy,
            connection_info,
        })
    }
}

/// Anki search query matching every card of a deck (subdecks included).
pub fn deck_query(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '\\' | '"' | '*' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("\"deck:{escaped}\"")
}
