use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Stored tweet, as listed back to callers (embedding omitted).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tweet {
    pub id: String,
    pub partner_id: String,
    pub date: DateTime<Utc>,
    pub content: String,
    pub username: Option<String>,
    pub handle: Option<String>,
    pub reply_count: i32,
    pub retweet_count: i32,
    pub like_count: i32,
    pub view_count: i32,
    pub image_url: Option<String>,
    pub is_verified: bool,
}

impl Tweet {
    /// Label used in retrieval results and prompts.
    pub fn label(&self) -> String {
        tweet_label(self.handle.as_deref(), &self.date)
    }
}

pub(crate) fn tweet_label(handle: Option<&str>, date: &DateTime<Utc>) -> String {
    let day = date.format("%Y-%m-%d");
    match handle {
        Some(h) if !h.is_empty() => format!("@{} {}", h.trim_start_matches('@'), day),
        _ => format!("tweet {}", day),
    }
}

/// A tweet ready for insertion, id already derived and embedding attached.
#[derive(Debug, Clone)]
pub struct NewTweet {
    pub id: String,
    pub partner_id: String,
    pub date: DateTime<Utc>,
    pub content: String,
    pub username: Option<String>,
    pub handle: Option<String>,
    pub reply_count: i32,
    pub retweet_count: i32,
    pub like_count: i32,
    pub view_count: i32,
    pub image_url: Option<String>,
    pub is_verified: bool,
    pub embedding: Vec<f32>,
}

/// Raw import record as submitted by callers.
///
/// Every field decodes leniently: `null`, a wrong type or an unreadable count
/// falls back to the default, so one malformed record is skipped by the
/// importer instead of failing the whole batch at deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TweetRecord {
    #[serde(default, alias = "text", deserialize_with = "lenient_string")]
    pub content: String,
    #[serde(default, alias = "created_at", deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub handle: Option<String>,
    #[serde(default, alias = "replyCount", deserialize_with = "lenient_count")]
    pub reply_count: i32,
    #[serde(default, alias = "retweetCount", deserialize_with = "lenient_count")]
    pub retweet_count: i32,
    #[serde(default, alias = "likeCount", deserialize_with = "lenient_count")]
    pub like_count: i32,
    #[serde(default, alias = "viewCount", deserialize_with = "lenient_count")]
    pub view_count: i32,
    #[serde(default, alias = "imageUrl", deserialize_with = "lenient_opt_string")]
    pub image_url: Option<String>,
    #[serde(default, alias = "isVerified", deserialize_with = "lenient_bool")]
    pub is_verified: bool,
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(d)?.unwrap_or_default())
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().map(clamp_count).unwrap_or(0),
        Value::String(s) => parse_count(&s).unwrap_or(0),
        _ => 0,
    })
}

fn clamp_count(value: f64) -> i32 {
    if value.is_finite() {
        value.round().clamp(0.0, i32::MAX as f64) as i32
    } else {
        0
    }
}

/// Display-style counts as scraped from a profile page: `"1,234"`, `"1.2K"`, `"3M"`.
pub fn parse_count(raw: &str) -> Option<i32> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    let (digits, scale) = match cleaned.chars().last()? {
        'k' | 'K' => (&cleaned[..cleaned.len() - 1], 1_000.0),
        'm' | 'M' => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        'b' | 'B' => (&cleaned[..cleaned.len() - 1], 1_000_000_000.0),
        _ => (cleaned.as_str(), 1.0),
    };
    let value: f64 = digits.trim().parse().ok()?;
    Some(clamp_count(value * scale))
}

/// Deterministic tweet id: hex SHA-256 of `content + "\n" + date` (RFC 3339, UTC, seconds).
pub fn tweet_id(content: &str, date: &DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(b"\n");
    hasher.update(date.to_rfc3339_opts(SecondsFormat::Secs, true).as_bytes());
    hex::encode(hasher.finalize())
}
