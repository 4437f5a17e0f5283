//! Plain-text front page.

use crate::models::Article;
use crate::utils::truncate_words;
use std::fmt::Write;

/// One block per article: id, site, fetch time and analysis status on the
/// first line, then the title, the summary (cut to 25 words) and the URL.
pub fn front_page(articles: &[Article]) -> String {
    let mut out = String::new();
    for article in articles {
        let status = match (&article.nuanced_perspective, article.analysis()) {
            (None, _) => "ej analyserad".to_string(),
            (Some(_), None) => "analyserad (äldre format)".to_string(),
            (Some(_), Some(result)) => match result.quality_scores.as_ref().and_then(|s| s.overall()) {
                Some(overall) => format!("kvalitet {overall:.0}/100"),
                None => "analyserad".to_string(),
            },
        };
        let _ = writeln!(
            out,
            "#{} [{}] {} | {}",
            article.id,
            article.site,
            article.fetched_at.format("%Y-%m-%d %H:%M"),
            status
        );
        let _ = writeln!(out, "    {}", article.title);
        if !article.summary.is_empty() {
            let _ = writeln!(out, "    {}", truncate_words(&article.summary, 25));
        }
        let _ = writeln!(out, "    {}", article.url);
    }
    out
}
