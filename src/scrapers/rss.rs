//! RSS 2.0 feed parsing.
//!
//! Only `channel/item/{title, link, description}` is read; everything else in
//! the feed is ignored. Descriptions are HTML in practice, so they are reduced
//! to their text content before the word budget is applied.

use crate::error::{Error, Result};
use crate::models::{CandidateArticle, Site};
use crate::utils::truncate_words;
use scraper::Html;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Parse an RSS document into at most `n` candidates for `site`.
///
/// Items without a link are skipped. Summaries are stripped of markup and cut
/// to `news_len` words.
///
/// # Errors
///
/// Returns [`Error::Feed`] when the document is not an RSS feed.
pub fn parse_feed(xml: &str, site: Site, n: usize, news_len: usize) -> Result<Vec<CandidateArticle>> {
    let rss: Rss = quick_xml::de::from_str(xml).map_err(|e| Error::Feed(format!("{site}: {e}")))?;

    let items: Vec<CandidateArticle> = rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            let url = item.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
            let Some(url) = url else {
                debug!(%site, title = ?item.title, "Skipping feed item without link");
                return None;
            };
            let title = item.title.as_deref().map(collapse_whitespace).unwrap_or_default();
            let summary = item.description.as_deref().map(html_to_text).unwrap_or_default();
            Some(CandidateArticle {
                site,
                title,
                summary: truncate_words(&summary, news_len),
                url,
            })
        })
        .take(n)
        .collect();

    Ok(items)
}

/// Text content of an HTML fragment, whitespace-normalized.
pub fn html_to_text(fragment: &str) -> String {
    let doc = Html::parse_fragment(fragment);
    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>SVT Nyheter</title>
    <link>https://www.svt.se/nyheter/</link>
    <atom:link href="https://www.svt.se/nyheter/rss.xml" rel="self"/>
    <item>
      <title>Regeringen möter press efter NATO-beslut</title>
      <link>https://www.svt.se/nyheter/inrikes/nato-1</link>
      <description><![CDATA[<p>Oppositionen <b>kräver</b> svar om de nya styrkorna.</p>]]></description>
      <pubDate>Sat, 17 Oct 2026 08:00:00 +0200</pubDate>
    </item>
    <item>
      <title>Utan länk</title>
      <description>Ska hoppas över</description>
    </item>
    <item>
      <title>  Riksbanken   sänker räntan </title>
      <link> https://www.svt.se/nyheter/ekonomi/ranta-2 </link>
      <description>Ett två tre fyra fem sex</description>
    </item>
    <item>
      <title>Tredje</title>
      <link>https://www.svt.se/nyheter/3</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_reads_items() {
        let items = parse_feed(FEED, Site::Svt, 10, 70).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Regeringen möter press efter NATO-beslut");
        assert_eq!(items[0].summary, "Oppositionen kräver svar om de nya styrkorna.");
        assert_eq!(items[0].url, "https://www.svt.se/nyheter/inrikes/nato-1");
        assert_eq!(items[1].title, "Riksbanken sänker räntan");
        assert_eq!(items[1].url, "https://www.svt.se/nyheter/ekonomi/ranta-2");
        assert_eq!(items[2].summary, "");
        assert!(items.iter().all(|item| item.site == Site::Svt));
    }

    #[test]
    fn test_parse_feed_applies_limits() {
        let items = parse_feed(FEED, Site::Svt, 2, 3).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].summary, "Ett två tre…");
    }

    #[test]
    fn test_parse_feed_rejects_non_feed() {
        let err = parse_feed("<html><body>Not found</body></html>", Site::Dn, 10, 70).unwrap_err();
        assert!(matches!(err, Error::Feed(_)));
    }

    #[test]
    fn test_html_to_text() {
        assert_eq!(html_to_text("<p>Hej <a href='#'>världen</a></p>\n<p>igen</p>"), "Hej världen igen");
        assert_eq!(html_to_text("ren text"), "ren text");
    }
}
