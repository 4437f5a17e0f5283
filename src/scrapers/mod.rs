//! Headline ingestion for the configured Swedish outlets.
//!
//! Each outlet is read in two tiers:
//!
//! 1. **RSS**: the outlet's feed, parsed with [`rss::parse_feed`]
//! 2. **HTML**: when the feed cannot be fetched or parsed, the outlet's front
//!    page, parsed with [`html::parse_front_page`]
//!
//! A site whose feed and front page both fail yields no items; the batch
//! moves on to the next site.
//!
//! # Supported Sources
//!
//! | Site | Name | Feed |
//! |------|------|------|
//! | `svt` | SVT Nyheter | RSS |
//! | `aftonbladet` | Aftonbladet | RSS |
//! | `expressen` | Expressen | RSS |
//! | `dn` | Dagens Nyheter | RSS |
//! | `dagens` | Dagens | RSS |

pub mod html;
pub mod rss;

use crate::error::Result;
use crate::models::{CandidateArticle, Site};
use rand::rng;
use rand::seq::IndexedRandom;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Per-request timeout for feed and front page downloads.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENTS: [&str; 2] = [
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

const SWEDISH_FIRST: &str = "sv-SE,sv;q=0.9,en;q=0.5";

/// Where an outlet publishes its headlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteSource {
    pub site: Site,
    pub name: &'static str,
    pub rss_url: &'static str,
    pub html_url: &'static str,
}

pub fn source_for(site: Site) -> SiteSource {
    match site {
        Site::Svt => SiteSource {
            site,
            name: "SVT Nyheter",
            rss_url: "https://www.svt.se/nyheter/rss.xml",
            html_url: "https://www.svt.se/nyheter/",
        },
        Site::Aftonbladet => SiteSource {
            site,
            name: "Aftonbladet",
            rss_url: "https://rss.aftonbladet.se/rss2/small/pages/sections/senastenytt/",
            html_url: "https://www.aftonbladet.se/nyheter/",
        },
        Site::Expressen => SiteSource {
            site,
            name: "Expressen",
            rss_url: "https://feeds.expressen.se/nyheter/",
            html_url: "https://www.expressen.se/",
        },
        Site::Dn => SiteSource {
            site,
            name: "Dagens Nyheter",
            rss_url: "https://www.dn.se/rss/",
            html_url: "https://www.dn.se/",
        },
        Site::Dagens => SiteSource {
            site,
            name: "Dagens",
            rss_url: "https://www.dagens.se/feed/",
            html_url: "https://dagens.se/",
        },
    }
}

/// Anything that can deliver the latest headlines of a site.
///
/// Implementations never fail: a site that cannot be read yields no items.
pub trait NewsSource {
    async fn collect(&self, site: Site, per_site: usize, news_len: usize) -> Vec<CandidateArticle>;
}

/// [`NewsSource`] that downloads feeds and front pages over HTTP.
#[derive(Debug, Clone)]
pub struct HttpNewsSource {
    client: reqwest::Client,
}

impl HttpNewsSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self { client })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let user_agent = USER_AGENTS.choose(&mut rng()).copied().unwrap_or(USER_AGENTS[0]);
        let body = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(ACCEPT_LANGUAGE, SWEDISH_FIRST)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }

    /// Top `n` items of the outlet's RSS feed.
    #[instrument(level = "info", skip(self), fields(site = %source.site))]
    pub async fn rss_top(&self, source: &SiteSource, n: usize, news_len: usize) -> Result<Vec<CandidateArticle>> {
        let xml = self.get_text(source.rss_url).await?;
        rss::parse_feed(&xml, source.site, n, news_len)
    }

    /// Top `n` headlines scraped from the outlet's front page.
    #[instrument(level = "info", skip(self), fields(site = %source.site))]
    pub async fn html_top(&self, source: &SiteSource, n: usize) -> Result<Vec<CandidateArticle>> {
        let page = self.get_text(source.html_url).await?;
        html::parse_front_page(&page, source, n)
    }
}

impl NewsSource for HttpNewsSource {
    #[instrument(level = "info", skip(self))]
    async fn collect(&self, site: Site, per_site: usize, news_len: usize) -> Vec<CandidateArticle> {
        let source = source_for(site);
        match self.rss_top(&source, per_site, news_len).await {
            Ok(items) => {
                info!(count = items.len(), "Collected headlines from RSS");
                return items;
            }
            Err(e) => warn!(error = %e, "RSS failed; falling back to HTML"),
        }

        match self.html_top(&source, per_site).await {
            Ok(items) => {
                info!(count = items.len(), "Collected headlines from HTML");
                items
            }
            Err(e) => {
                error!(error = %e, "HTML fallback failed; skipping site");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_site_has_a_source() {
        for site in Site::ALL {
            let source = source_for(site);
            assert_eq!(source.site, site);
            assert!(url::Url::parse(source.rss_url).is_ok());
            assert!(url::Url::parse(source.html_url).is_ok());
        }
        assert_eq!(source_for(Site::Dn).name, "Dagens Nyheter");
    }
}
