//! Html command implementation: static-page export.

use std::fmt::Write as _;
use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use fedistash_core::{AccountId, Collection, Record};
use fedistash_store::load_combined;

use crate::commands::working_dir;
use crate::output;

#[derive(Args, Debug)]
pub struct HtmlArgs {
    /// Account whose archive to export, as user@domain
    pub account: String,

    /// Which collection to export
    #[arg(long, default_value = "statuses")]
    pub collection: Collection,

    /// Posts per generated page
    #[arg(long, default_value_t = 2000)]
    pub items_per_page: usize,

    /// Include split continuation files
    #[arg(long)]
    pub combine: bool,
}

pub async fn run(args: HtmlArgs) -> Result<ExitCode> {
    let dir = working_dir();
    let account = AccountId::new(&args.account)?;
    let per_page = args.items_per_page.max(1);

    let document = load_combined(dir, &account, true, args.combine)?
        .unwrap_or_default();
    let records = document.collection(args.collection);

    if records.is_empty() {
        output::field(args.collection.as_str(), "nothing to export");
        return Ok(ExitCode::from(3));
    }

    let title = format!("{} - {}", account, args.collection);
    let page_count = records.len().div_ceil(per_page);

    for (page, chunk) in records.chunks(per_page).enumerate() {
        let file = page_file(&account, args.collection, page);
        let html = render_page(&title, chunk, page, page_count, &account, args.collection);
        fs::write(dir.join(&file), html).with_context(|| format!("failed to write {}", file))?;
        output::field("wrote", &file);
    }

    output::success(&format!(
        "Exported {} {} across {} page(s)",
        records.len(),
        args.collection,
        page_count,
    ));
    Ok(ExitCode::SUCCESS)
}

fn page_file(account: &AccountId, collection: Collection, page: usize) -> String {
    format!(
        "{}.user.{}.{}.{}.html",
        account.domain(),
        account.username(),
        collection,
        page,
    )
}

fn render_page(
    title: &str,
    records: &[Record],
    page: usize,
    page_count: usize,
    account: &AccountId,
    collection: Collection,
) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>\n\
         body {{ max-width: 42em; margin: 2em auto; font-family: sans-serif; }}\n\
         .entry {{ border-bottom: 1px solid #ccc; padding: 1em 0; }}\n\
         .meta {{ color: #666; font-size: smaller; }}\n\
         nav {{ margin: 1em 0; }}\n\
         </style>\n</head>\n<body>\n<h1>{}</h1>\n",
        escape(title),
        escape(title),
    );

    html.push_str(&nav(account, collection, page, page_count));

    for record in records {
        html.push_str("<div class=\"entry\">\n");

        let boosted = record.reblog.as_deref();
        let source = boosted.unwrap_or(record);
        let _ = write!(html, "<p class=\"meta\">{}", escape(&record.created_at));
        if boosted.is_some() {
            html.push_str(" (boost)");
        }
        if let Some(url) = source.payload.get("url").and_then(|v| v.as_str()) {
            let _ = write!(html, " &middot; <a href=\"{}\">link</a>", escape(url));
        }
        html.push_str("</p>\n");

        // Server content is already sanitized HTML; embed it as-is.
        if let Some(content) = source.payload.get("content").and_then(|v| v.as_str()) {
            html.push_str(content);
            html.push('\n');
        }

        if let Some(attachments) = source
            .payload
            .get("media_attachments")
            .and_then(|v| v.as_array())
        {
            for attachment in attachments {
                if let Some(url) = attachment.get("url").and_then(|v| v.as_str()) {
                    let _ = write!(
                        html,
                        "<p><a href=\"{}\">attachment</a></p>\n",
                        escape(url)
                    );
                }
            }
        }

        html.push_str("</div>\n");
    }

    html.push_str(&nav(account, collection, page, page_count));
    html.push_str("</body>\n</html>\n");
    html
}

fn nav(account: &AccountId, collection: Collection, page: usize, page_count: usize) -> String {
    let mut nav = String::from("<nav>");
    if page > 0 {
        let _ = write!(
            nav,
            "<a href=\"{}\">newer</a> ",
            page_file(account, collection, page - 1)
        );
    }
    let _ = write!(nav, "page {} of {}", page + 1, page_count);
    if page + 1 < page_count {
        let _ = write!(
            nav,
            " <a href=\"{}\">older</a>",
            page_file(account, collection, page + 1)
        );
    }
    nav.push_str("</nav>\n");
    nav
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_files_follow_the_archive_naming_convention() {
        let account = AccountId::new("alice@example.org").unwrap();
        assert_eq!(
            page_file(&account, Collection::Statuses, 0),
            "example.org.user.alice.statuses.0.html"
        );
    }

    #[test]
    fn rendered_pages_escape_metadata_but_embed_content() {
        let account = AccountId::new("alice@example.org").unwrap();
        let record: Record = serde_json::from_value(json!({
            "id": "1",
            "created_at": "2024-01-05T00:00:00Z",
            "content": "<p>hello</p>",
            "url": "https://example.org/@alice/1?a=1&b=2",
        }))
        .unwrap();

        let page = render_page(
            "t",
            std::slice::from_ref(&record),
            0,
            1,
            &account,
            Collection::Statuses,
        );
        assert!(page.contains("<p>hello</p>"));
        assert!(page.contains("a=1&amp;b=2"));
        assert!(page.contains("page 1 of 1"));
    }
}
