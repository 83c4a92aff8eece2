//! Secret word supply.
//!
//! [`FileWordSource`] keeps the word list and the already-used words in two
//! newline separated files. Words are handed out unused-first; once every word
//! has been used the used list is cleared and the full pool is available again.

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::types::PlayerId;

/// How long a player must wait between word suggestions
pub const WORD_REQUEST_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Whole words rejected as suggestions, matched with or without a plural suffix
const BLOCKED_WORDS: &[&str] = &[
    "arse", "arsehole", "ass", "asshole", "bastard", "bitch", "bollocks", "bullshit", "cock",
    "cocksucker", "crap", "cunt", "dick", "dickhead", "dildo", "fag", "faggot", "fuck",
    "fucker", "fucking", "horseshit", "jackass", "motherfucker", "nigger", "piss", "pissed",
    "prick", "pussy", "retard", "shit", "shithead", "slut", "twat", "wank", "wanker", "whore",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WordError {
    #[error("Please wait 5 minutes between word requests.")]
    Cooldown,

    #[error("This word is not appropriate or contains invalid characters.")]
    Inappropriate,

    #[error("This word already exists in the word list.")]
    Duplicate,

    #[error("The word list is empty")]
    EmptyPool,

    #[error("Word list I/O failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for WordError {
    fn from(e: std::io::Error) -> Self {
        WordError::Io(e.to_string())
    }
}

/// Supplier of secret words
#[async_trait]
pub trait WordSource: Send + Sync {
    /// A word not handed out since the pool was last exhausted
    async fn random_word(&self) -> Result<String, WordError>;

    /// Letters only and free of blocked terms
    fn is_appropriate(&self, word: &str) -> bool {
        is_appropriate_word(word)
    }

    /// Add a community-suggested word, returning the normalized form
    async fn add_word(&self, word: &str, submitter: &PlayerId) -> Result<String, WordError>;
}

pub fn is_appropriate_word(word: &str) -> bool {
    if word.is_empty() || !word.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    let lower = word.to_ascii_lowercase();
    let singular = [lower.strip_suffix("es"), lower.strip_suffix('s')];
    !BLOCKED_WORDS.iter().any(|blocked| {
        lower == *blocked || singular.iter().flatten().any(|stem| stem == blocked)
    })
}

pub struct FileWordSource {
    words_path: PathBuf,
    used_path: PathBuf,
    cooldown: Duration,
    last_request: Mutex<HashMap<PlayerId, Instant>>,
    /// Serializes reads and writes of the two files
    files: Mutex<()>,
}

impl FileWordSource {
    /// Create the source, making sure both files exist
    pub async fn open(
        words_path: impl AsRef<Path>,
        used_path: impl AsRef<Path>,
    ) -> Result<Self, WordError> {
        let words_path = words_path.as_ref().to_path_buf();
        let used_path = used_path.as_ref().to_path_buf();
        for path in [&words_path, &used_path] {
            if tokio::fs::metadata(path).await.is_err() {
                tokio::fs::write(path, "").await?;
            }
        }
        Ok(Self {
            words_path,
            used_path,
            cooldown: WORD_REQUEST_COOLDOWN,
            last_request: Mutex::new(HashMap::new()),
            files: Mutex::new(()),
        })
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    async fn check_cooldown(&self, submitter: &PlayerId) -> bool {
        match self.last_request.lock().await.get(submitter) {
            Some(last) => last.elapsed() >= self.cooldown,
            None => true,
        }
    }
}

async fn read_lines(path: &Path) -> Result<BTreeSet<String>, WordError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

async fn append_line(path: &Path, line: &str) -> Result<(), WordError> {
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .await?;
    file.write_all(format!("{}\n", line).as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[async_trait]
impl WordSource for FileWordSource {
    async fn random_word(&self) -> Result<String, WordError> {
        let _files = self.files.lock().await;
        let words = read_lines(&self.words_path).await?;
        if words.is_empty() {
            return Err(WordError::EmptyPool);
        }
        let used = read_lines(&self.used_path).await?;

        let mut available: Vec<&String> = words.difference(&used).collect();
        if available.is_empty() {
            tracing::info!("All {} words used, resetting used list", words.len());
            tokio::fs::write(&self.used_path, "").await?;
            available = words.iter().collect();
        }

        let word = available
            .choose(&mut rand::rng())
            .map(|w| (*w).clone())
            .ok_or(WordError::EmptyPool)?;
        append_line(&self.used_path, &word).await?;
        Ok(word)
    }

    async fn add_word(&self, word: &str, submitter: &PlayerId) -> Result<String, WordError> {
        if !self.check_cooldown(submitter).await {
            return Err(WordError::Cooldown);
        }

        let word = word.trim().to_lowercase();
        if !self.is_appropriate(&word) {
            return Err(WordError::Inappropriate);
        }

        let _files = self.files.lock().await;
        if read_lines(&self.words_path).await?.contains(&word) {
            return Err(WordError::Duplicate);
        }
        append_line(&self.words_path, &word).await?;

        self.last_request
            .lock()
            .await
            .insert(submitter.clone(), Instant::now());
        tracing::info!("Player {} added word '{}'", submitter, word);
        Ok(word)
    }
}
