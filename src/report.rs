use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DumpError, Result};
use crate::store::{RatingRecord, RatingStore};
use crate::subject::{Subject, Target};

const STYLE: &str = r#"
    body { color: #333; font-family: Verdana, Arial, helvetica, sans-serif; }
    h1, h6 { color: #999; }
    .rate_block { border-bottom: 1px solid #eee; padding: 0.4em; padding-bottom: 1.2em; }
    .rating { font-size: 1.5em; }
    .info, .description { display: inline-block; margin-left: 0.7em; vertical-align: middle; }
    .rating .current { color: #800; }
    .rating .total { font-size: 0.7em; color: #aaa; }
    .title_ru { font-size: 1.7em; }
    .title_orig { color: #aaa; font-size: 1.4em; }
    .author { color: #aaa; font-size: 1.2em; }
    .links { padding-top: 0.5em; font-size: 0.8em; }
    .link { display: inline-block; margin-right: 0.5em; }
"#;

/// Which title a search link was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleVariant {
    Original,
    Localized,
}

impl TitleVariant {
    fn label(self) -> &'static str {
        match self {
            TitleVariant::Original => "title_orig",
            TitleVariant::Localized => "title_ru",
        }
    }

    fn pick(self, record: &RatingRecord) -> Option<&str> {
        let title = match self {
            TitleVariant::Original => record.title_original.as_deref(),
            TitleVariant::Localized => Some(record.title_localized.as_str()),
        };
        title.filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchLink {
    pub target: Target,
    pub variant: TitleVariant,
    pub url: String,
}

pub struct ReportRow<'a> {
    pub record: &'a RatingRecord,
    pub links: Vec<SearchLink>,
}

pub fn search_links(record: &RatingRecord, subject: Subject) -> Vec<SearchLink> {
    let mut links = Vec::new();
    for &target in subject.targets() {
        for variant in [TitleVariant::Original, TitleVariant::Localized] {
            if let Some(term) = variant.pick(record) {
                links.push(SearchLink {
                    target,
                    variant,
                    url: target.search_url(term),
                });
            }
        }
    }
    links
}

pub fn rows(store: &RatingStore, subject: Subject) -> Vec<ReportRow<'_>> {
    store
        .iter()
        .map(|record| ReportRow {
            record,
            links: search_links(record, subject),
        })
        .collect()
}

/// Render the saved collection at `path` into a sibling `.html` file.
pub fn render(path: &Path, subject: Subject) -> Result<PathBuf> {
    let store = RatingStore::load(path)?;
    let target = path.with_extension("html");
    info!("Writing report {}", target.display());
    let html = to_html(&rows(&store, subject), subject);
    fs::write(&target, html).map_err(|e| DumpError::io(&target, e))?;
    Ok(target)
}

pub fn to_html(rows: &[ReportRow], subject: Subject) -> String {
    let mut body = String::new();
    for row in rows {
        write_row(&mut body, row);
    }
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>imhonet ratings: {subject}</title>
    <meta http-equiv="content-type" content="text/html; charset=utf-8" />
    <style>{style}</style>
</head>
<body>
    <h1>imhonet ratings: {subject}</h1>
    <h6>Total ratings: {total}</h6>
{body}</body>
</html>
"#,
        subject = subject,
        style = STYLE,
        total = rows.len(),
        body = body,
    )
}

fn write_row(out: &mut String, row: &ReportRow) {
    let r = row.record;
    let opt = |v: &Option<String>| escape(v.as_deref().unwrap_or(""));

    let secondary: Vec<String> = [
        r.title_original.clone(),
        r.release_year.as_ref().map(ToString::to_string),
    ]
    .into_iter()
    .flatten()
    .filter(|s| !s.is_empty())
    .map(|s| format!("({})", escape(&s)))
    .collect();
    let orig = if secondary.is_empty() {
        String::new()
    } else {
        format!(r#" <span class="title_orig">{}</span>"#, secondary.join(" "))
    };

    let _ = write!(
        out,
        r#"    <div class="rate_block">
        <div class="info">
            <div class="year">{date}</div>
            <div class="rating"><span class="current">{rating}</span><span class="total">/10</span></div>
        </div>
        <div class="description">
            <div class="titles">
                <label><span class="title_ru"><input type="checkbox"> {title}</span>{orig}</label>
                <div class="author">{author}</div>
            </div>
            <div class="links">
"#,
        date = opt(&r.user_rating_date),
        rating = r.user_rating,
        title = escape(&r.title_localized),
        orig = orig,
        author = opt(&r.author),
    );

    if !row.links.is_empty() {
        out.push_str("                Search:\n");
    }
    let mut last_target = None;
    for link in &row.links {
        if last_target.is_some_and(|t| t != link.target) {
            out.push_str("                <br/>\n");
        }
        last_target = Some(link.target);
        let _ = writeln!(
            out,
            r#"                <div class="link"><a href="{}" target="_blank">{} ({})</a></div>"#,
            escape(&link.url),
            link.target.name(),
            link.variant.label(),
        );
    }
    out.push_str("            </div>\n        </div>\n    </div>\n");
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{record, ReleaseYear};

    fn book(orig: Option<&str>) -> RatingRecord {
        RatingRecord {
            title_localized: "Пикник на обочине".into(),
            title_original: orig.map(str::to_string),
            author: Some("Стругацкие".into()),
            ..record("http://books.imhonet.ru/element/5/", 10)
        }
    }

    #[test]
    fn links_per_target_and_variant() {
        let links = search_links(&book(Some("Roadside Picnic")), Subject::Books);
        let pairs: Vec<_> = links.iter().map(|l| (l.target, l.variant)).collect();
        assert_eq!(
            pairs,
            vec![
                (Target::Goodreads, TitleVariant::Original),
                (Target::Goodreads, TitleVariant::Localized),
                (Target::Livelib, TitleVariant::Original),
                (Target::Livelib, TitleVariant::Localized),
            ]
        );
        assert!(links[0].url.contains("q=Roadside%20Picnic"));
    }

    #[test]
    fn null_original_title_has_no_original_links() {
        let links = search_links(&book(None), Subject::Books);
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.variant == TitleVariant::Localized));

        let store = RatingStore::from_records([book(None)]);
        let html = to_html(&rows(&store, Subject::Books), Subject::Books);
        assert!(!html.contains("(title_orig)"));
        assert!(html.contains("Goodreads (title_ru)"));
    }

    #[test]
    fn absent_original_title_and_year_leave_no_brackets() {
        let store = RatingStore::from_records([book(None)]);
        let html = to_html(&rows(&store, Subject::Books), Subject::Books);
        assert!(!html.contains(r#"class="title_orig""#));
        assert!(!html.contains("()"));

        let mut film = record("http://films.imhonet.ru/element/3/", 9);
        film.title_original = Some("Solaris".into());
        let store = RatingStore::from_records([film.clone()]);
        let html = to_html(&rows(&store, Subject::Films), Subject::Films);
        assert!(html.contains(r#"<span class="title_orig">(Solaris)</span>"#));

        film.release_year = Some(ReleaseYear::Number(1972));
        let store = RatingStore::from_records([film]);
        let html = to_html(&rows(&store, Subject::Films), Subject::Films);
        assert!(html.contains(r#"<span class="title_orig">(Solaris) (1972)</span>"#));
    }

    #[test]
    fn games_have_no_links() {
        let mut game = record("http://games.imhonet.ru/element/9/", 8);
        game.title_original = Some("Half-Life".into());
        let store = RatingStore::from_records([game, record("http://games.imhonet.ru/element/10/", 6)]);
        let rows = rows(&store, Subject::Games);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.links.is_empty()));

        let html = to_html(&rows, Subject::Games);
        assert!(html.contains("Half-Life"));
        assert!(!html.contains("class=\"link\""));
        assert!(html.contains("Total ratings: 2"));
    }

    #[test]
    fn titles_are_escaped() {
        let mut r = record("u", 5);
        r.title_localized = "Tom & Jerry <3".into();
        let store = RatingStore::from_records([r]);
        let html = to_html(&rows(&store, Subject::Games), Subject::Games);
        assert!(html.contains("Tom &amp; Jerry &lt;3"));
    }

    #[test]
    fn render_writes_sibling_html() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imho_rates_films_alice.json");
        fs::write(&path, serde_json::to_string(&vec![record("u", 7)]).unwrap()).unwrap();
        let out = render(&path, Subject::Films).unwrap();
        assert_eq!(out, dir.path().join("imho_rates_films_alice.html"));
        let html = fs::read_to_string(out).unwrap();
        assert!(html.contains("Kinopoisk (title_ru)"));
        // Source collection untouched.
        assert_eq!(RatingStore::load(&path).unwrap().len(), 1);
    }
}
