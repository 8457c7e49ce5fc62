//! copost-cli: command-line client for the copost HTTP API
//!
//! Every subcommand is one request against a running `copost-server`; nothing
//! here touches the store or the model providers directly.
//!
//! # Subcommands
//! - `status`                                         show server and store health
//! - `search <query> --partner <id> [-n] [--sources]` nearest-neighbour search
//! - `ingest <file> --partner <id>`                   chunk, embed and store a document
//! - `import-tweets <json> --partner <id>`            import a tweet export
//! - `ideas <event> [--context]`                      generate post ideas for an event
//! - `generate <event> --template <t> --words <n>`    write a post for an event

use std::path::Path;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";
const DEFAULT_LIMIT: u32 = 5;
const PREVIEW_CHARS: usize = 200;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "copost-cli", version, about = "Copost co-marketing assistant CLI")]
struct Cli {
    /// Copost HTTP server URL (overrides COPOST_HTTP_URL env var)
    #[arg(long, env = "COPOST_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourcesArg {
    Documents,
    Tweets,
    All,
}

impl SourcesArg {
    fn as_str(&self) -> &'static str {
        match self {
            SourcesArg::Documents => "documents",
            SourcesArg::Tweets => "tweets",
            SourcesArg::All => "all",
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show server status
    Status,

    /// Search a partner's stored documents and tweets
    Search {
        query: String,

        /// Partner id ("self" for your own project)
        #[arg(short, long)]
        partner: String,

        /// Maximum number of results to return
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,

        #[arg(long, value_enum, default_value = "documents")]
        sources: SourcesArg,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Ingest a text or markdown file for a partner
    Ingest {
        file: String,

        #[arg(short, long)]
        partner: String,
    },

    /// Import a JSON tweet export for a partner
    ImportTweets {
        file: String,

        #[arg(short, long)]
        partner: String,
    },

    /// Generate post ideas for a scheduled event
    Ideas {
        event: String,

        /// Extra guidance for the ideas
        #[arg(long)]
        context: Option<String>,
    },

    /// Generate post content for a scheduled event
    Generate {
        event: String,

        /// Template title
        #[arg(short, long)]
        template: String,

        /// Target word count
        #[arg(short, long)]
        words: u32,

        /// Extra guidance for the post
        #[arg(long)]
        context: Option<String>,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchHit {
    pub source: String,
    pub source_id: String,
    pub content: String,
    pub label: String,
    pub distance: f64,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub query: String,
    pub partner_id: String,
    pub count: usize,
    pub took_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct IdeaView {
    pub title: String,
    pub template: String,
    pub topic: String,
    pub relevance: f64,
    #[serde(default)]
    pub brief: String,
}

// ============================================================================
// Formatting
// ============================================================================

/// Collapse whitespace and cut to `max` characters, marking the cut.
pub fn preview(content: &str, max: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut cut: String = flat.chars().take(max).collect();
    cut.push('…');
    cut
}

/// Cosine distance rendered as a similarity percentage.
pub fn similarity_percent(distance: f64) -> String {
    let similarity = (1.0 - distance).clamp(0.0, 1.0);
    format!("{:.0}%", similarity * 100.0)
}

pub fn format_hit(rank: usize, hit: &SearchHit) -> String {
    format!(
        "{}. [{}] {}  ({})\n   {}",
        rank,
        hit.source,
        hit.label,
        similarity_percent(hit.distance),
        preview(&hit.content, PREVIEW_CHARS)
    )
}

pub fn format_idea(rank: usize, idea: &IdeaView) -> String {
    let mut out = format!(
        "{}. {}  [{}] relevance {:.2}\n   {}",
        rank, idea.title, idea.template, idea.relevance, idea.topic
    );
    if !idea.brief.trim().is_empty() {
        out.push_str("\n   ");
        out.push_str(&preview(&idea.brief, PREVIEW_CHARS));
    }
    out
}

/// Accept either a bare array of tweet records or an object wrapping one
/// under `tweets`.
pub fn tweet_records(raw: &str) -> anyhow::Result<Vec<serde_json::Value>> {
    let value: serde_json::Value = serde_json::from_str(raw).context("tweet file is not JSON")?;
    match value {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Object(mut obj) => match obj.remove("tweets") {
            Some(serde_json::Value::Array(items)) => Ok(items),
            _ => bail!("expected an array of tweets or an object with a \"tweets\" array"),
        },
        _ => bail!("expected an array of tweets or an object with a \"tweets\" array"),
    }
}

/// Pull the error message out of a failed API response body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

struct Api {
    client: reqwest::blocking::Client,
    server: String,
}

impl Api {
    fn new(server: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, path: &str) -> anyhow::Result<serde_json::Value> {
        let url = format!("{}{}", self.server, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("connection failed to {}", url))?;
        Self::read(resp)
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let url = format!("{}{}", self.server, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .with_context(|| format!("connection failed to {}", url))?;
        Self::read(resp)
    }

    fn read(resp: reqwest::blocking::Response) -> anyhow::Result<serde_json::Value> {
        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            bail!("server returned {}: {}", status, error_message(&text));
        }
        serde_json::from_str(&text).context("failed to parse server response")
    }
}

fn do_status(api: &Api) -> anyhow::Result<()> {
    let body = api.get("/health")?;
    let store = &body["store"];
    println!("Copost server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
    println!("Store:         {}", store["backend"].as_str().unwrap_or("?"));
    if let Some(v) = store["server_version"].as_str() {
        println!("PostgreSQL:    {}", v);
    }
    if let Some(v) = store["pgvector_version"].as_str() {
        println!("pgvector:      {}", v);
    }
    println!(
        "Contents:      {} documents, {} chunks, {} tweets",
        store["documents"], store["chunks"], store["tweets"]
    );
    println!("Embedding:     {}", body["embedding"].as_str().unwrap_or("?"));
    println!("Chat:          {}", body["chat"].as_str().unwrap_or("?"));
    println!("Socket:        {}", body["socket"].as_str().unwrap_or("?"));
    Ok(())
}

fn do_search(
    api: &Api,
    query: &str,
    partner: &str,
    limit: u32,
    sources: SourcesArg,
    json_output: bool,
) -> anyhow::Result<()> {
    let body = serde_json::json!({
        "query": query,
        "partner_id": partner,
        "limit": limit,
        "sources": sources.as_str(),
    });
    let value = api.post("/search", &body)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let response: SearchResponse =
        serde_json::from_value(value).context("failed to parse search response")?;
    if response.results.is_empty() {
        eprintln!("No results for \"{}\" in {}", response.query, response.partner_id);
        return Ok(());
    }
    for (i, hit) in response.results.iter().enumerate() {
        println!("{}\n", format_hit(i + 1, hit));
    }
    if let Some(ms) = response.took_ms {
        eprintln!("{} results in {} ms", response.count, ms);
    }
    Ok(())
}

fn do_ingest(api: &Api, file: &str, partner: &str) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("cannot read {}", file))?;
    let filename = Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file);
    let body = serde_json::json!({
        "partner_id": partner,
        "filename": filename,
        "text": text,
    });
    let report = api.post("/documents", &body)?;
    println!(
        "Ingested {} as document {} ({} chunks)",
        filename, report["document_id"], report["chunks"]
    );
    Ok(())
}

fn do_import_tweets(api: &Api, file: &str, partner: &str) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("cannot read {}", file))?;
    let records = tweet_records(&raw)?;
    let body = serde_json::json!({
        "partner_id": partner,
        "records": records,
    });
    let summary = api.post("/tweets/import", &body)?;
    println!(
        "Imported {}, skipped {}, failed {}",
        summary["imported"], summary["skipped"], summary["failed"]
    );
    Ok(())
}

fn do_ideas(api: &Api, event: &str, context: Option<String>) -> anyhow::Result<()> {
    let body = serde_json::json!({ "user_context": context });
    let value = api.post(&format!("/events/{}/ideas", event), &body)?;
    let ideas: Vec<IdeaView> =
        serde_json::from_value(value["ideas"].clone()).context("failed to parse ideas")?;
    if ideas.is_empty() {
        eprintln!("No ideas returned");
    }
    for (i, idea) in ideas.iter().enumerate() {
        println!("{}\n", format_idea(i + 1, idea));
    }
    Ok(())
}

fn do_generate(
    api: &Api,
    event: &str,
    template: &str,
    words: u32,
    context: Option<String>,
) -> anyhow::Result<()> {
    let body = serde_json::json!({
        "template": template,
        "word_count": words,
        "user_context": context,
    });
    let value = api.post(&format!("/events/{}/content", event), &body)?;
    println!("{}", value["content"].as_str().unwrap_or_default());
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    // Generation makes several model calls per request.
    let timeout = match cli.command {
        Commands::Ideas { .. } | Commands::Generate { .. } | Commands::Ingest { .. } => 300,
        _ => 30,
    };

    let result = Api::new(&cli.server, timeout).and_then(|api| match cli.command {
        Commands::Status => do_status(&api),
        Commands::Search {
            query,
            partner,
            limit,
            sources,
            json,
        } => do_search(&api, &query, &partner, limit, sources, json),
        Commands::Ingest { file, partner } => do_ingest(&api, &file, &partner),
        Commands::ImportTweets { file, partner } => do_import_tweets(&api, &file, &partner),
        Commands::Ideas { event, context } => do_ideas(&api, &event, context),
        Commands::Generate {
            event,
            template,
            words,
            context,
        } => do_generate(&api, &event, &template, words, context),
    });

    if let Err(e) = result {
        eprintln!("copost-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(content: &str, distance: f64) -> SearchHit {
        SearchHit {
            source: "chunk".to_string(),
            source_id: "12".to_string(),
            content: content.to_string(),
            label: "guide.md".to_string(),
            distance,
        }
    }

    // ========================================================================
    // TEST 1: preview collapses whitespace and marks truncation
    // ========================================================================
    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("a\n\n  b   c", 10), "a b c");
        let long = "x".repeat(50);
        let cut = preview(&long, 10);
        assert_eq!(cut.chars().count(), 11);
        assert!(cut.ends_with('…'));
    }

    // ========================================================================
    // TEST 2: distance → similarity percent, clamped
    // ========================================================================
    #[test]
    fn test_similarity_percent() {
        assert_eq!(similarity_percent(0.0), "100%");
        assert_eq!(similarity_percent(0.25), "75%");
        assert_eq!(similarity_percent(1.7), "0%");
    }

    // ========================================================================
    // TEST 3: hit line carries rank, source, label and preview
    // ========================================================================
    #[test]
    fn test_format_hit() {
        let line = format_hit(2, &hit("Partnership launch details", 0.1));
        assert!(line.starts_with("2. [chunk] guide.md  (90%)"));
        assert!(line.contains("Partnership launch details"));
    }

    // ========================================================================
    // TEST 4: tweet files as bare array or wrapped object
    // ========================================================================
    #[test]
    fn test_tweet_records_shapes() {
        let bare = tweet_records(r#"[{"content":"gm","date":"2024-01-02"}]"#).unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped = tweet_records(r#"{"tweets":[{"text":"a"},{"text":"b"}]}"#).unwrap();
        assert_eq!(wrapped.len(), 2);

        assert!(tweet_records(r#"{"data":[]}"#).is_err());
        assert!(tweet_records("42").is_err());
        assert!(tweet_records("not json").is_err());
    }

    // ========================================================================
    // TEST 5: error bodies surface the server message
    // ========================================================================
    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"error":"event not found: e1","kind":"not_found"}"#),
            "event not found: e1"
        );
        assert_eq!(error_message("  Bad Gateway \n"), "Bad Gateway");
    }

    // ========================================================================
    // TEST 6: search response parses the server's shape
    // ========================================================================
    #[test]
    fn test_search_response_parses() {
        let body = serde_json::json!({
            "results": [{
                "source": "tweet",
                "source_id": "abc",
                "content": "gm",
                "label": "@acme 2024-01-02",
                "distance": 0.2
            }],
            "query": "gm",
            "partner_id": "acme",
            "count": 1,
            "took_ms": 4
        });
        let resp: SearchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.count, 1);
        assert_eq!(resp.results[0].source, "tweet");
        assert_eq!(resp.took_ms, Some(4));
    }

    // ========================================================================
    // TEST 7: idea line formatting
    // ========================================================================
    #[test]
    fn test_format_idea() {
        let idea = IdeaView {
            title: "Launch thread".to_string(),
            template: "Partnership Announcement".to_string(),
            topic: "Joint launch".to_string(),
            relevance: 0.8,
            brief: String::new(),
        };
        assert_eq!(
            format_idea(1, &idea),
            "1. Launch thread  [Partnership Announcement] relevance 0.80\n   Joint launch"
        );

        let with_brief = IdeaView {
            brief: "Thread on the\nshared roadmap".to_string(),
            ..idea
        };
        assert!(format_idea(1, &with_brief).ends_with("\n   Thread on the shared roadmap"));
    }

    // ========================================================================
    // TEST 8: CLI parses the search subcommand
    // ========================================================================
    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "copost-cli", "search", "launch", "--partner", "acme", "-n", "3", "--sources", "all",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                partner,
                limit,
                sources,
                ..
            } => {
                assert_eq!(partner, "acme");
                assert_eq!(limit, 3);
                assert_eq!(sources.as_str(), "all");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
