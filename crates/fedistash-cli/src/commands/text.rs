//! Text command implementation: plain-text search and export.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use regex::{Regex, RegexBuilder};

use fedistash_core::{AccountId, Collection, Record};
use fedistash_store::load_combined;

use crate::commands::working_dir;

#[derive(Args, Debug)]
pub struct TextArgs {
    /// Account whose archive to search, as user@domain
    pub account: String,

    /// Regular expressions; only posts matching every pattern are printed
    pub patterns: Vec<String>,

    /// Which collection to search
    #[arg(long, default_value = "statuses")]
    pub collection: Collection,

    /// Print oldest first
    #[arg(long)]
    pub reverse: bool,

    /// Include split continuation files
    #[arg(long)]
    pub combine: bool,
}

pub async fn run(args: TextArgs) -> Result<ExitCode> {
    let dir = working_dir();
    let account = AccountId::new(&args.account)?;

    let patterns = args
        .patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("invalid pattern '{}'", pattern))
        })
        .collect::<Result<Vec<_>>>()?;

    let document = load_combined(dir, &account, true, args.combine)?
        .unwrap_or_default();

    let records = document.collection(args.collection);
    let ordered: Box<dyn Iterator<Item = &Record>> = if args.reverse {
        Box::new(records.iter().rev())
    } else {
        Box::new(records.iter())
    };

    let mut matched = false;
    for record in ordered {
        let text = record_text(record);
        if !patterns.iter().all(|pattern| pattern.is_match(&text)) {
            continue;
        }
        matched = true;

        println!("{}", record.created_at);
        if let Some(url) = record.payload.get("url").and_then(|v| v.as_str()) {
            println!("{}", url);
        }
        println!("{}", text.trim());
        println!();
    }

    if matched {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(3))
    }
}

/// The searchable text of a record: the boosted post's content when the
/// record is a boost, the record's own content otherwise, with markup
/// stripped.
fn record_text(record: &Record) -> String {
    let source = record.reblog.as_deref().unwrap_or(record);
    let content = source
        .payload
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    strip_tags(content)
}

/// Reduce an HTML fragment to readable plain text: paragraph and line
/// breaks become newlines, other tags disappear, common entities decode.
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        text.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('>') else {
            rest = "";
            break;
        };
        let tag = &rest[start + 1..start + end];
        let name = tag
            .trim_start_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if name.trim_end_matches('/') == "br" || (name == "p" && tag.starts_with('/')) {
            text.push('\n');
        }
        rest = &rest[start + end + 1..];
    }
    text.push_str(rest);

    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_markup_and_decodes_entities() {
        let html = "<p>Hello <a href=\"https://example.org\">world</a></p><p>&amp; more<br>lines</p>";
        assert_eq!(strip_tags(html), "Hello world\n& more\nlines\n");
    }

    #[test]
    fn boosts_expose_the_boosted_text() {
        let record: Record = serde_json::from_value(json!({
            "id": "1",
            "created_at": "2024-01-05T00:00:00Z",
            "content": "",
            "reblog": {
                "id": "2",
                "created_at": "2024-01-04T00:00:00Z",
                "content": "<p>original words</p>",
            },
        }))
        .unwrap();
        assert_eq!(record_text(&record), "original words\n");
    }

    #[test]
    fn unterminated_tags_do_not_panic() {
        assert_eq!(strip_tags("before <unterminated"), "before ");
    }
}
