use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, info_span, warn};

use crate::error::Result;
use crate::net::Transport;
use crate::pager::Pager;
use crate::report;
use crate::settings::Settings;
use crate::store::{self, RatingStore, StoreWriter};
use crate::subject::Subject;

pub const MAX_RATING: u8 = 10;

const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {prefix} {msg}";

/// Counters reported after a dump.
#[derive(Debug, Default, PartialEq)]
pub struct DumpStats {
    pub existing: usize,
    pub added: usize,
    pub skipped: usize,
    pub pages: usize,
    pub backup: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

/// Scrapes every rating bucket of one user and subject into the saved
/// collection, then renders the report.
///
/// Runs against the same output file must not overlap: each run rewrites the
/// file from scratch.
pub struct Dumper<'a, T: Transport> {
    transport: &'a T,
    settings: &'a Settings,
    username: String,
    subject: Subject,
}

impl<'a, T: Transport> Dumper<'a, T> {
    pub fn new(transport: &'a T, settings: &'a Settings, username: &str, subject: Subject) -> Self {
        Dumper {
            transport,
            settings,
            username: username.to_string(),
            subject,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.settings.output_path(&self.username, self.subject)
    }

    pub fn run(&self, from_rating: u8) -> Result<DumpStats> {
        let span = info_span!("dump", user = %self.username, subject = %self.subject);
        let _enter = span.enter();

        let path = self.output_path();
        info!("Collecting ratings into {}", path.display());

        let existing = RatingStore::load(&path)?;
        let mut stats = DumpStats {
            existing: existing.len(),
            ..DumpStats::default()
        };
        if !existing.is_empty() {
            stats.backup = Some(store::backup(&path)?);
        }

        let mut writer = StoreWriter::create(&path)?;
        let streamed = self.stream(&existing, &mut writer, from_rating, &mut stats);
        let closed = writer.finish();
        if let Err(e) = &streamed {
            warn!("Dump stopped early, {} kept: {}", path.display(), e);
        }
        streamed?;
        closed?;

        stats.report = Some(report::render(&path, self.subject)?);
        Ok(stats)
    }

    fn stream(
        &self,
        existing: &RatingStore,
        writer: &mut StoreWriter,
        from_rating: u8,
        stats: &mut DumpStats,
    ) -> Result<()> {
        writer.append_store(existing)?;

        let mut seen: HashSet<String> = existing.keys().map(str::to_string).collect();

        for rating in from_rating..=MAX_RATING {
            let url = self.settings.rates_url(&self.username, self.subject, rating);
            info!(rating, "Scanning bucket {}", url);

            let pb = bucket_progress(rating);
            let mut pager = Pager::new(self.transport, self.settings, &url, rating, true);
            let result = self.drain(&mut pager, &mut seen, writer, stats, &pb);
            stats.pages += pager.pages();
            stats.skipped += pager.skipped();
            pb.finish_and_clear();
            result?;
        }
        Ok(())
    }

    fn drain(
        &self,
        pager: &mut Pager<'_, T>,
        seen: &mut HashSet<String>,
        writer: &mut StoreWriter,
        stats: &mut DumpStats,
        pb: &ProgressBar,
    ) -> Result<()> {
        for record in pager {
            let record = record?;
            if !seen.insert(record.detail_url.clone()) {
                continue;
            }
            writer.append(&record)?;
            stats.added += 1;
            pb.set_message(format!("{} new", stats.added));
            pb.tick();
        }
        Ok(())
    }
}

fn bucket_progress(rating: u8) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template(SPINNER_TEMPLATE).unwrap());
    pb.set_prefix(format!("rating {}/{}", rating, MAX_RATING));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
