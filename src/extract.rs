use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{DumpError, Result};
use crate::net::Transport;
use crate::parser::{clean_title, parse_details, ListingItem};
use crate::settings::Settings;
use crate::store::{RatingRecord, ReleaseYear};

#[derive(Deserialize)]
struct RateInfoResponse {
    rate: RateInfo,
}

#[derive(Deserialize)]
struct RateInfo {
    read_date: String,
}

/// Turns the item boxes of one listing page into records, one detail page
/// and one rating-date request per box, fetched as the iterator advances.
///
/// Boxes that failed structural extraction are logged, counted and skipped.
/// Any other error is yielded to the caller.
pub struct PageRecords<'a, T: Transport> {
    transport: &'a T,
    settings: &'a Settings,
    rating: u8,
    items: std::vec::IntoIter<Result<ListingItem>>,
    skipped: usize,
}

impl<'a, T: Transport> PageRecords<'a, T> {
    pub fn new(
        transport: &'a T,
        settings: &'a Settings,
        rating: u8,
        items: Vec<Result<ListingItem>>,
    ) -> Self {
        PageRecords {
            transport,
            settings,
            rating,
            items: items.into_iter(),
            skipped: 0,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn complete(&self, item: ListingItem) -> Result<RatingRecord> {
        info!("Processing \"{}\"", item.title);

        let details = parse_details(&self.transport.get(&item.detail_url)?);
        debug!(
            title_original = ?details.title_original,
            year = ?details.release_year,
            author = ?details.author,
            "Detail page parsed"
        );

        let user_rating_date = fetch_rating_date(self.transport, self.settings, &item.external_id)?;

        Ok(RatingRecord {
            title_localized: clean_title(&item.title, details.release_year.as_deref()),
            title_original: details.title_original,
            user_rating: self.rating,
            user_rating_date: Some(user_rating_date),
            release_year: details.release_year.map(ReleaseYear::Text),
            detail_url: item.detail_url,
            author: details.author,
            external_id: item.external_id,
        })
    }
}

impl<T: Transport> Iterator for PageRecords<'_, T> {
    type Item = Result<RatingRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.items.next()? {
                Ok(item) => return Some(self.complete(item)),
                Err(e @ DumpError::FieldExtraction { .. }) => {
                    warn!("Skipping item: {}", e);
                    self.skipped += 1;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Ask the site when the user rated `object_id`. The answer is required, so
/// any malformed response is an error.
pub fn fetch_rating_date<T: Transport>(
    transport: &T,
    settings: &Settings,
    object_id: &str,
) -> Result<String> {
    let body = transport.post_form(
        &settings.rate_info_url,
        &[
            ("action", "ExRateInfo"),
            ("content_id", &settings.rate_content_id),
            ("object_id", object_id),
        ],
    )?;
    let parsed: RateInfoResponse =
        serde_json::from_str(&body).map_err(|e| DumpError::RatingDateFetch {
            object_id: object_id.to_string(),
            reason: e.to_string(),
        })?;
    Ok(parsed.rate.read_date)
}
