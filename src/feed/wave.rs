//! Wave sources.
//!
//! A wave is a numbered batch of simulated posts. On disk wave 1 lives in
//! `tweets.json` and wave `n` in `tweets_wave{n}.json`, each shaped as
//! `{ "wave": n, "tweets": [...] }`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use crisis_common::{FeedItem, WaveFile};
use regex::Regex;
use std::sync::LazyLock;

use crate::errors::FeedError;

static WAVE_FILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^tweets(?:_wave(\d+))?\.json$").unwrap());

#[async_trait]
pub trait WaveLoader: Send + Sync {
    /// The wave's file as stored, or `None` when the wave does not exist.
    async fn load_file(&self, wave: u32) -> Result<Option<WaveFile>, FeedError>;

    /// The wave's items, tagged with their wave number.
    async fn load(&self, wave: u32) -> Result<Option<Vec<FeedItem>>, FeedError> {
        Ok(self.load_file(wave).await?.map(|file| file.into_items(wave)))
    }
}

pub fn wave_file_name(wave: u32) -> String {
    if wave == 1 {
        "tweets.json".to_string()
    } else {
        format!("tweets_wave{}.json", wave)
    }
}

/// Inverse of [`wave_file_name`].
pub fn wave_number(file_name: &str) -> Option<u32> {
    let caps = WAVE_FILE_REGEX.captures(file_name)?;
    match caps.get(1) {
        Some(n) => n.as_str().parse().ok(),
        None => Some(1),
    }
}

/// Reads waves from JSON files in a data directory.
#[derive(Debug, Clone)]
pub struct FileWaveLoader {
    data_dir: PathBuf,
}

impl FileWaveLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, wave: u32) -> PathBuf {
        self.data_dir.join(wave_file_name(wave))
    }
}

#[async_trait]
impl WaveLoader for FileWaveLoader {
    async fn load_file(&self, wave: u32) -> Result<Option<WaveFile>, FeedError> {
        let path = self.path_for(wave);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(FeedError::Io { path, source }),
        };
        let file = serde_json::from_str(&contents).map_err(|source| FeedError::Parse {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(wave, path = %path.display(), "loaded wave file");
        Ok(Some(file))
    }
}

/// In-memory waves, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryWaveLoader {
    waves: BTreeMap<u32, WaveFile>,
}

impl MemoryWaveLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wave(mut self, wave: u32, tweets: Vec<FeedItem>) -> Self {
        self.waves.insert(
            wave,
            WaveFile {
                wave: Some(wave),
                tweets,
            },
        );
        self
    }
}

#[async_trait]
impl WaveLoader for MemoryWaveLoader {
    async fn load_file(&self, wave: u32) -> Result<Option<WaveFile>, FeedError> {
        Ok(self.waves.get(&wave).cloned())
    }
}

/// A wave file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveSummary {
    pub wave: u32,
    pub path: PathBuf,
    /// Item count, or the parse error if the file is unreadable
    pub items: Result<usize, String>,
}

/// List the wave files in `data_dir`, ordered by wave number.
pub fn discover_waves(data_dir: &Path) -> Result<Vec<WaveSummary>, FeedError> {
    let entries = std::fs::read_dir(data_dir).map_err(|source| FeedError::Io {
        path: data_dir.to_path_buf(),
        source,
    })?;

    let mut waves = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(wave) = file_name.to_str().and_then(wave_number) else {
            continue;
        };
        let path = entry.path();
        let items = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<WaveFile>(&s).map_err(|e| e.to_string()))
            .map(|file| file.tweets.len());
        waves.push(WaveSummary { wave, path, items });
    }
    waves.sort_by_key(|w| w.wave);
    Ok(waves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_wave_file_names() {
        assert_eq!(wave_file_name(1), "tweets.json");
        assert_eq!(wave_file_name(3), "tweets_wave3.json");
        assert_eq!(wave_number("tweets.json"), Some(1));
        assert_eq!(wave_number("tweets_wave12.json"), Some(12));
        assert_eq!(wave_number("tweets_wave.json"), None);
        assert_eq!(wave_number("crew_run.json"), None);
    }

    #[tokio::test]
    async fn test_file_loader_missing_wave_is_none() {
        let dir = TempDir::new().unwrap();
        let loader = FileWaveLoader::new(dir.path());
        assert!(loader.load(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_loader_tags_items_with_file_wave() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "tweets_wave2.json",
            r#"{"wave": 5, "tweets": [{"id": 7, "user": "@a", "text": "bad", "likes": 3}]}"#,
        );
        let loader = FileWaveLoader::new(dir.path());
        let items = loader.load(2).await.unwrap().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "7");
        assert_eq!(items[0].wave, 5);
        assert_eq!(items[0].likes, 3);
    }

    #[tokio::test]
    async fn test_file_loader_requested_wave_when_file_has_none() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "tweets.json",
            r#"{"tweets": [{"id": "1", "user": "@b", "text": "fine"}]}"#,
        );
        let items = FileWaveLoader::new(dir.path()).load(1).await.unwrap().unwrap();
        assert_eq!(items[0].wave, 1);
    }

    #[tokio::test]
    async fn test_file_loader_bad_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "tweets.json", "{ nope");
        let err = FileWaveLoader::new(dir.path()).load(1).await.unwrap_err();
        assert!(matches!(err, FeedError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_memory_loader() {
        let loader = MemoryWaveLoader::new().with_wave(3, vec![FeedItem::new("1", "@c", "hi")]);
        let items = loader.load(3).await.unwrap().unwrap();
        assert_eq!(items[0].wave, 3);
        assert!(loader.load(1).await.unwrap().is_none());
    }

    #[test]
    fn test_discover_waves_sorted_with_counts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "tweets_wave2.json", r#"{"tweets": [{"id": 1, "user": "u", "text": "t"}]}"#);
        write(dir.path(), "tweets.json", r#"{"tweets": []}"#);
        write(dir.path(), "tweets_wave3.json", "garbage");
        write(dir.path(), "notes.txt", "ignored");

        let waves = discover_waves(dir.path()).unwrap();
        let numbers: Vec<u32> = waves.iter().map(|w| w.wave).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(waves[0].items, Ok(0));
        assert_eq!(waves[1].items, Ok(1));
        assert!(waves[2].items.is_err());
    }
}
