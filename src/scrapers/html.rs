//! Front page scraping, used when an outlet's feed is unavailable.
//!
//! Every `<article>` element with an `h2` or `h3` heading is a candidate. The
//! heading text is the title; the heading's link (or failing that the first
//! link in the article) is resolved against the front page URL. Front pages
//! carry no usable summary, so summaries are empty.

use crate::error::{Error, Result};
use crate::models::CandidateArticle;
use crate::scrapers::SiteSource;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

static ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").expect("article selector"));
static HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h2, h3").expect("heading selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("link selector"));

/// Parse a front page into at most `n` candidates.
///
/// # Errors
///
/// Returns [`Error::Feed`] if the source's front page URL is not a valid base URL.
pub fn parse_front_page(
    page: &str,
    source: &SiteSource,
    n: usize,
) -> Result<Vec<CandidateArticle>> {
    let base = Url::parse(source.html_url).map_err(|e| Error::Feed(format!("{}: {e}", source.site)))?;
    let document = Html::parse_document(page);

    let mut items = Vec::new();
    for article in document.select(&ARTICLE) {
        if items.len() >= n {
            break;
        }
        let Some(heading) = article.select(&HEADING).next() else {
            continue;
        };
        let title = text_of(heading);
        if title.is_empty() {
            continue;
        }
        let href = first_href(heading).or_else(|| first_href(article));
        let Some(url) = href.and_then(|href| base.join(href).ok()) else {
            debug!(site = %source.site, %title, "Skipping front page article without link");
            continue;
        };

        items.push(CandidateArticle {
            site: source.site,
            title,
            summary: String::new(),
            url: url.to_string(),
        });
    }
    Ok(items)
}

fn first_href<'a>(element: ElementRef<'a>) -> Option<&'a str> {
    element
        .select(&LINK)
        .next()
        .and_then(|link| link.value().attr("href"))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}
