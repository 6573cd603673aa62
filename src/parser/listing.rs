use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

use crate::error::DumpError;

static ITEM_BOX: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.m-inlineitemslist-item.m-inlineitemslist-no_header").unwrap()
});
static HEADING_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.m-inlineitemslist-describe-h2 > a").unwrap());
static PAGINATION_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.m-pagination > a").unwrap());

/// Comment markers the site wraps around navigation chrome.
const NOINDEX_MARKERS: [&str; 2] = ["<!--noindex-->", "<!--/noindex-->"];

/// One entry of a listing page, before its detail page is fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingItem {
    pub external_id: String,
    pub title: String,
    pub detail_url: String,
}

#[derive(Debug)]
pub struct ListingPage {
    /// One entry per item box, in page order. Boxes missing required nodes
    /// are kept as `FieldExtraction` errors so the caller decides what to do.
    pub items: Vec<Result<ListingItem, DumpError>>,
    pub next_page: Option<String>,
}

pub fn strip_noindex(body: &str) -> String {
    NOINDEX_MARKERS
        .iter()
        .fold(body.to_string(), |acc, marker| acc.replace(marker, ""))
}

pub fn parse_listing(body: &str, page_url: &Url) -> ListingPage {
    let doc = Html::parse_document(&strip_noindex(body));

    let items = doc
        .select(&ITEM_BOX)
        .enumerate()
        .map(|(index, item_box)| parse_item(item_box, index, page_url))
        .collect();

    ListingPage {
        items,
        next_page: next_page(&doc, page_url),
    }
}

fn parse_item(item_box: ElementRef, index: usize, page_url: &Url) -> Result<ListingItem, DumpError> {
    let missing = |field| DumpError::FieldExtraction {
        page: page_url.to_string(),
        index,
        field,
    };

    let external_id = item_box
        .value()
        .attr("data-object_id")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| missing("data-object_id"))?;

    let heading = item_box
        .select(&HEADING_LINK)
        .next()
        .ok_or_else(|| missing("title link"))?;

    let title = heading.text().collect::<String>().trim().to_string();
    if title.is_empty() {
        return Err(missing("title text"));
    }

    let detail_url = heading
        .value()
        .attr("href")
        .and_then(|href| detail_link(href.trim(), page_url))
        .ok_or_else(|| missing("detail link"))?;

    Ok(ListingItem {
        external_id: external_id.to_string(),
        title,
        detail_url,
    })
}

/// Detail URLs key the saved collection, so an absolute href is kept exactly
/// as the page wrote it. Only relative links are resolved.
fn detail_link(href: &str, page_url: &Url) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    match Url::parse(href) {
        Ok(_) => Some(href.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            page_url.join(href).ok().map(String::from)
        }
        Err(_) => None,
    }
}

/// The last pagination anchor is the "next" control; on the final page it
/// points back at the page itself, which means there is nothing further.
fn next_page(doc: &Html, page_url: &Url) -> Option<String> {
    let href = doc.select(&PAGINATION_LINK).last()?.value().attr("href")?;
    let next = match page_url.join(href.trim()) {
        Ok(url) => url,
        Err(e) => {
            warn!("Ignoring unparsable pagination link {:?}: {}", href, e);
            return None;
        }
    };
    if &next == page_url {
        None
    } else {
        Some(next.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE1: &str = "http://alice.imhonet.ru/content/films/rates/10/";

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn noindex_markers_removed() {
        let body = "a<!--noindex-->b<!--/noindex-->c";
        assert_eq!(strip_noindex(body), "abc");
    }

    #[test]
    fn items_in_page_order() {
        let page = parse_listing(&fixture("listing_page1"), &Url::parse(PAGE1).unwrap());
        assert_eq!(page.items.len(), 3);

        let first = page.items[0].as_ref().unwrap();
        assert_eq!(first.external_id, "101");
        assert_eq!(first.title, "Интерстеллар (2014)");
        assert_eq!(first.detail_url, "http://films.imhonet.ru/element/101/");

        let third = page.items[2].as_ref().unwrap();
        assert_eq!(third.external_id, "103");
        assert_eq!(third.detail_url, "http://alice.imhonet.ru/element/103/");
    }

    #[test]
    fn box_without_heading_link_is_field_error() {
        let page = parse_listing(&fixture("listing_page1"), &Url::parse(PAGE1).unwrap());
        let err = page.items[1].as_ref().unwrap_err();
        assert!(matches!(
            err,
            DumpError::FieldExtraction { index: 1, field: "title link", .. }
        ));
    }

    #[test]
    fn absolute_detail_link_kept_verbatim() {
        let html = r#"<div class="m-inlineitemslist-item m-inlineitemslist-no_header" data-object_id="7">
            <div class="m-inlineitemslist-describe-h2"><a href=" http://Films.imhonet.ru/element/фильм "> X </a></div></div>"#;
        let page = parse_listing(html, &Url::parse(PAGE1).unwrap());
        let item = page.items[0].as_ref().unwrap();
        assert_eq!(item.detail_url, "http://Films.imhonet.ru/element/фильм");
    }

    #[test]
    fn box_without_object_id_is_field_error() {
        let html = r#"<div class="m-inlineitemslist-item m-inlineitemslist-no_header">
            <div class="m-inlineitemslist-describe-h2"><a href="/e/1/">X</a></div></div>"#;
        let page = parse_listing(html, &Url::parse(PAGE1).unwrap());
        assert!(matches!(
            page.items[0],
            Err(DumpError::FieldExtraction { field: "data-object_id", .. })
        ));
    }

    #[test]
    fn next_page_is_last_pagination_link() {
        let page = parse_listing(&fixture("listing_page1"), &Url::parse(PAGE1).unwrap());
        assert_eq!(
            page.next_page.as_deref(),
            Some("http://alice.imhonet.ru/content/films/rates/10/?page=2")
        );
    }

    #[test]
    fn self_link_means_no_next_page() {
        let url = Url::parse("http://alice.imhonet.ru/content/films/rates/10/?page=2").unwrap();
        let page = parse_listing(&fixture("listing_last"), &url);
        assert_eq!(page.next_page, None);
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn no_pagination_means_no_next_page() {
        let page = parse_listing("<html><body></body></html>", &Url::parse(PAGE1).unwrap());
        assert!(page.items.is_empty());
        assert_eq!(page.next_page, None);
    }
}
