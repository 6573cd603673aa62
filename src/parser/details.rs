use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static ORIGINAL_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.m-elementprimary-language").unwrap());
static INFO_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.m-elementdescription-info span").unwrap());

const YEAR_LABEL: &str = "Год выпуска:";
const AUTHOR_LABEL: &str = "Автор книги:";

/// Secondary fields read from an item's detail page. All optional.
#[derive(Debug, Default, PartialEq)]
pub struct DetailFields {
    pub title_original: Option<String>,
    pub release_year: Option<String>,
    pub author: Option<String>,
}

pub fn parse_details(body: &str) -> DetailFields {
    let doc = Html::parse_document(body);

    let title_original = doc
        .select(&ORIGINAL_TITLE)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    // Label/value pairs are sibling spans: the value is the span right after its label.
    let spans: Vec<String> = doc.select(&INFO_SPAN).map(leading_text).collect();

    DetailFields {
        title_original,
        release_year: value_after(&spans, YEAR_LABEL),
        author: value_after(&spans, AUTHOR_LABEL),
    }
}

/// Text before the element's first child element, trimmed. Nested spans
/// contribute only to their own entry.
fn leading_text(el: ElementRef) -> String {
    el.children()
        .take_while(|node| !node.value().is_element())
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
        .collect::<String>()
        .trim()
        .to_string()
}

fn value_after(spans: &[String], label: &str) -> Option<String> {
    let pos = spans.iter().position(|s| s == label)?;
    spans.get(pos + 1).filter(|v| !v.is_empty()).cloned()
}

/// Drop a `(<year>)` suffix the site embeds in localized titles.
pub fn clean_title(title: &str, year: Option<&str>) -> String {
    match year {
        Some(year) => title.replace(&format!("({})", year), "").trim().to_string(),
        None => title.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn film_details() {
        let d = parse_details(&fixture("details_film"));
        assert_eq!(d.title_original.as_deref(), Some("Interstellar"));
        assert_eq!(d.release_year.as_deref(), Some("2014"));
        assert_eq!(d.author, None);
    }

    #[test]
    fn book_details_nested_spans() {
        let d = parse_details(&fixture("details_book"));
        assert_eq!(d.title_original, None);
        assert_eq!(d.author.as_deref(), Some("Аркадий и Борис Стругацкие"));
        assert_eq!(d.release_year.as_deref(), Some("1972"));
    }

    #[test]
    fn wrapper_span_does_not_repeat_its_label() {
        let d = parse_details(&fixture("details_wrapped"));
        assert_eq!(d.release_year.as_deref(), Some("2014"));
        assert_eq!(d.author.as_deref(), Some("Станислав Лем"));
    }

    #[test]
    fn missing_blocks_are_silent() {
        assert_eq!(parse_details(&fixture("details_bare")), DetailFields::default());
    }

    #[test]
    fn label_as_last_span_has_no_value() {
        let html = r#"<div class="m-elementdescription-info"><span>Год выпуска:</span></div>"#;
        assert_eq!(parse_details(html).release_year, None);
    }

    #[test]
    fn year_removed_from_title() {
        assert_eq!(clean_title("Interstellar (2014)", Some("2014")), "Interstellar");
        assert_eq!(clean_title("Interstellar (2014)", Some("2015")), "Interstellar (2014)");
        assert_eq!(clean_title(" Брат ", None), "Брат");
    }
}
