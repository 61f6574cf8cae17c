//! Discussion-forum search backend and the category→forum directory.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use kor_client::HttpClient;
use serde::Deserialize;
use tracing::warn;

/// One post returned by a forum search, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ForumPost {
    pub title: String,
    pub url: String,
    pub score: u64,
    pub num_comments: u64,
    pub created_at: DateTime<Utc>,
}

/// Seam over the discussion-forum backend so the social fetcher and
/// pain-point scanner can be exercised without a network.
#[async_trait]
pub trait ForumSearchBackend: Send + Sync {
    /// Search one forum for posts from the last 30 days.
    async fn search(&self, forum: &str, query: &str) -> Result<Vec<ForumPost>>;

    /// Cheap availability probe for operators and the UI.
    async fn is_available(&self) -> bool;
}

/// Public unauthenticated Reddit JSON search.
pub struct RedditBackend {
    client: std::sync::Arc<HttpClient>,
}

impl RedditBackend {
    pub fn new(client: std::sync::Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ForumSearchBackend for RedditBackend {
    async fn search(&self, forum: &str, query: &str) -> Result<Vec<ForumPost>> {
        let url = format!(
            "https://www.reddit.com/r/{forum}/search.json?q={}&restrict_sr=on&sort=new&t=month&limit=100",
            urlencode(query)
        );
        let fetched = self
            .client
            .fetch_json(&url)
            .await
            .with_context(|| format!("searching r/{forum}"))?;
        Ok(parse_reddit_listing(&fetched.body))
    }

    async fn is_available(&self) -> bool {
        self.client
            .fetch_json("https://www.reddit.com/r/all/about.json")
            .await
            .is_ok()
    }
}

/// Pull posts out of a Reddit listing payload, discarding any child
/// with a shape we do not recognize rather than failing the fetch.
pub fn parse_reddit_listing(body: &serde_json::Value) -> Vec<ForumPost> {
    let Some(children) = body
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(|c| c.as_array())
    else {
        return Vec::new();
    };

    children
        .iter()
        .filter_map(|child| {
            let data = child.get("data")?;
            let title = data.get("title")?.as_str()?.to_string();
            let permalink = data.get("permalink")?.as_str()?;
            let created = data.get("created_utc")?.as_f64()?;
            Some(ForumPost {
                title,
                url: format!("https://www.reddit.com{permalink}"),
                score: data.get("score").and_then(|v| v.as_u64()).unwrap_or(0),
                num_comments: data.get("num_comments").and_then(|v| v.as_u64()).unwrap_or(0),
                created_at: Utc
                    .timestamp_opt(created as i64, 0)
                    .single()
                    .unwrap_or_else(Utc::now),
            })
        })
        .collect()
}

pub(crate) fn urlencode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => out.push(ch),
            ' ' => out.push('+'),
            other => {
                let mut buf = [0u8; 4];
                for byte in other.encode_utf8(&mut buf).as_bytes() {
                    out.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    out
}

/// Forum names come from configuration, which is untrusted with respect
/// to request construction: a name is only ever interpolated into a URL
/// after passing this allow-list check.
pub fn is_valid_forum_name(name: &str) -> bool {
    (2..=30).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Deserialize)]
struct ForumsFile {
    #[serde(default)]
    categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    default: Vec<String>,
}

/// Category→forum mapping, loaded from `forums.yaml` with a compiled-in
/// default for categories the file does not cover.
#[derive(Debug, Clone)]
pub struct ForumDirectory {
    categories: BTreeMap<String, Vec<String>>,
    default: Vec<String>,
}

impl Default for ForumDirectory {
    fn default() -> Self {
        let mut categories = BTreeMap::new();
        for (category, forums) in DEFAULT_FORUMS {
            categories.insert(
                category.to_string(),
                forums.iter().map(|f| f.to_string()).collect(),
            );
        }
        Self {
            categories,
            default: vec!["apps".to_string(), "androidapps".to_string()],
        }
    }
}

impl ForumDirectory {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let parsed: ForumsFile =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        let fallback = Self::default();
        Ok(Self {
            categories: if parsed.categories.is_empty() {
                fallback.categories
            } else {
                parsed.categories
            },
            default: if parsed.default.is_empty() {
                fallback.default
            } else {
                parsed.default
            },
        })
    }

    /// Forums for a category, with invalid names dropped up front.
    pub fn forums_for(&self, category: &str) -> Vec<&str> {
        let raw = self
            .categories
            .get(&category.to_ascii_lowercase())
            .unwrap_or(&self.default);
        raw.iter()
            .map(String::as_str)
            .filter(|name| {
                let ok = is_valid_forum_name(name);
                if !ok {
                    warn!(forum = name, "dropping forum name that fails the allow-list");
                }
                ok
            })
            .collect()
    }
}

const DEFAULT_FORUMS: &[(&str, &[&str])] = &[
    ("health", &["fitness", "loseit", "running"]),
    ("productivity", &["productivity", "getdisciplined", "apps"]),
    ("finance", &["personalfinance", "budget", "frugal"]),
    ("education", &["languagelearning", "studytips", "apps"]),
    ("lifestyle", &["selfimprovement", "simpleliving", "apps"]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_rejects_injection_shapes() {
        assert!(is_valid_forum_name("fitness"));
        assert!(is_valid_forum_name("get_disciplined"));
        assert!(!is_valid_forum_name("a"));
        assert!(!is_valid_forum_name("fitness/../admin"));
        assert!(!is_valid_forum_name("fitness?x=1"));
        assert!(!is_valid_forum_name("fit ness"));
        assert!(!is_valid_forum_name(&"x".repeat(31)));
    }

    #[test]
    fn directory_drops_invalid_names() {
        let mut dir = ForumDirectory::default();
        dir.categories.insert(
            "health".to_string(),
            vec!["fitness".to_string(), "evil/path".to_string()],
        );
        assert_eq!(dir.forums_for("health"), vec!["fitness"]);
    }

    #[test]
    fn unknown_category_uses_default_forums() {
        let dir = ForumDirectory::default();
        assert_eq!(dir.forums_for("unheard-of"), vec!["apps", "androidapps"]);
    }

    #[test]
    fn reddit_listing_parse_discards_malformed_children() {
        let body = serde_json::json!({
            "data": { "children": [
                { "data": { "title": "ok", "permalink": "/r/x/1", "created_utc": 1700000000.0,
                            "score": 5, "num_comments": 2 } },
                { "data": { "permalink": "/r/x/2" } },
                { "nope": true }
            ]}
        });
        let posts = parse_reddit_listing(&body);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "https://www.reddit.com/r/x/1");
        assert_eq!(posts[0].score, 5);
    }

    #[test]
    fn urlencode_keeps_queries_safe() {
        assert_eq!(urlencode("habit tracker"), "habit+tracker");
        assert_eq!(urlencode("a&b=c"), "a%26b%3Dc");
    }
}
