use serde::{Deserialize, Deserializer, Serialize};

/// One simulated social-media post.
///
/// Sourced verbatim from a wave file; unknown fields are preserved in
/// `extra` so the dashboard sees exactly what the fixture contained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub user: String,
    pub text: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub retweets: u64,
    #[serde(default)]
    pub timestamp: String,
    /// Wave this item was loaded from; set by the loader, not the file.
    #[serde(default)]
    pub wave: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FeedItem {
    pub fn new(id: impl Into<String>, user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user: user.into(),
            text: text.into(),
            likes: 0,
            retweets: 0,
            timestamp: String::new(),
            wave: 0,
            extra: serde_json::Map::new(),
        }
    }
}

/// On-disk shape of a wave source: `{ "wave": n, "tweets": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveFile {
    #[serde(default)]
    pub wave: Option<u32>,
    #[serde(default)]
    pub tweets: Vec<FeedItem>,
}

impl WaveFile {
    /// Items tagged with their wave number. The file's own `wave` wins over
    /// the number it was requested under.
    pub fn into_items(self, requested: u32) -> Vec<FeedItem> {
        let wave = self.wave.unwrap_or(requested);
        self.tweets
            .into_iter()
            .map(|mut item| {
                item.wave = wave;
                item
            })
            .collect()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
