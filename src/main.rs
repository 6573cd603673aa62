mod dump;
mod error;
mod extract;
mod net;
mod pager;
mod parser;
mod report;
mod settings;
mod store;
mod subject;

use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::dump::{Dumper, MAX_RATING};
use crate::net::HttpClient;
use crate::settings::Settings;
use crate::subject::Subject;

#[derive(Parser)]
#[command(
    name = "imho_dump",
    version,
    about = "Export your imhonet ratings to JSON and a browsable HTML page",
    after_help = "Do not run two dumps for the same user and subject at once: \
                  each run rewrites the output file."
)]
struct Cli {
    /// imhonet username
    username: String,
    /// imhonet password
    password: String,
    /// Category to export
    #[arg(value_enum)]
    subject: Subject,
    /// Only render the HTML report from the already saved ratings
    #[arg(long = "html-only", alias = "html_only")]
    html_only: bool,
    /// Start scraping at this rating bucket (resume an interrupted dump)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=MAX_RATING as i64))]
    from_rating: u8,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("Failed to load settings")?;
    info!(settings = ?settings, "Settings loaded");

    if cli.html_only {
        let path = settings.output_path(&cli.username, cli.subject);
        let html = report::render(&path, cli.subject)
            .with_context(|| format!("Failed to render {}", path.display()))?;
        println!("Report written to {}", html.display());
        return Ok(());
    }

    let mut client = HttpClient::new(&settings)?;
    client.login(&settings.login_url, &cli.username, &cli.password)?;

    let dumper = Dumper::new(&client, &settings, &cli.username, cli.subject);
    let stats = dumper
        .run(cli.from_rating)
        .with_context(|| format!("Dump into {} failed", dumper.output_path().display()))?;

    if let Some(bak) = &stats.backup {
        println!("Previous ratings backed up to {}", bak.display());
    }
    println!(
        "Saved {} new ratings ({} already saved, {} items skipped, {} pages).",
        stats.added, stats.existing, stats.skipped, stats.pages
    );
    if let Some(html) = &stats.report {
        println!("Report written to {}", html.display());
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_positionals_and_flags() {
        let cli = Cli::try_parse_from(["imho_dump", "alice", "secret", "serials", "--html_only"]).unwrap();
        assert_eq!(cli.username, "alice");
        assert_eq!(cli.subject, Subject::Series);
        assert!(cli.html_only);
        assert_eq!(cli.from_rating, 1);
    }

    #[test]
    fn from_rating_is_bounded() {
        assert!(Cli::try_parse_from(["imho_dump", "a", "p", "films", "--from-rating", "11"]).is_err());
        let cli = Cli::try_parse_from(["imho_dump", "a", "p", "books", "--from-rating", "4"]).unwrap();
        assert_eq!(cli.from_rating, 4);
    }

    #[test]
    fn unknown_subject_rejected() {
        assert!(Cli::try_parse_from(["imho_dump", "a", "p", "music"]).is_err());
    }

    #[test]
    fn duration_formatting() {
        use std::time::Duration;
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
