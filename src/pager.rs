use std::collections::HashSet;

use tracing::info;
use url::Url;

use crate::error::{DumpError, Result};
use crate::extract::PageRecords;
use crate::net::Transport;
use crate::parser::parse_listing;
use crate::settings::Settings;
use crate::store::RatingRecord;

/// Walks the listing pages of one rating bucket and yields their records in
/// page order. A page is fetched only once the previous page's records have
/// been consumed.
pub struct Pager<'a, T: Transport> {
    transport: &'a T,
    settings: &'a Settings,
    rating: u8,
    recursive: bool,
    next_url: Option<String>,
    visited: HashSet<String>,
    current: Option<PageRecords<'a, T>>,
    pages: usize,
    skipped: usize,
}

impl<'a, T: Transport> Pager<'a, T> {
    pub fn new(
        transport: &'a T,
        settings: &'a Settings,
        start_url: &str,
        rating: u8,
        recursive: bool,
    ) -> Self {
        Pager {
            transport,
            settings,
            rating,
            recursive,
            next_url: Some(start_url.to_string()),
            visited: HashSet::new(),
            current: None,
            pages: 0,
            skipped: 0,
        }
    }

    /// Listing pages fetched so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Item boxes skipped for missing structure so far.
    pub fn skipped(&self) -> usize {
        self.skipped + self.current.as_ref().map_or(0, PageRecords::skipped)
    }

    fn open_page(&mut self, url: &str) -> Result<()> {
        info!("Fetching page {}", url);
        let page_url = Url::parse(url).map_err(|source| DumpError::Url {
            url: url.to_string(),
            source,
        })?;
        let body = self.transport.get(url)?;
        let listing = parse_listing(&body, &page_url);

        self.visited.insert(page_url.to_string());
        self.pages += 1;
        self.next_url = match listing.next_page {
            Some(next) if self.recursive && !self.visited.contains(&next) => Some(next),
            _ => None,
        };
        info!("Next page: {:?}", self.next_url);

        self.current = Some(PageRecords::new(
            self.transport,
            self.settings,
            self.rating,
            listing.items,
        ));
        Ok(())
    }
}

impl<T: Transport> Iterator for Pager<'_, T> {
    type Item = Result<RatingRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.current.as_mut() {
                if let Some(record) = current.next() {
                    return Some(record);
                }
                self.skipped += current.skipped();
                self.current = None;
            }

            let url = self.next_url.take()?;
            if let Err(e) = self.open_page(&url) {
                return Some(Err(e));
            }
        }
    }
}
