use std::path::PathBuf;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

use crate::subject::Subject;

/// Runtime settings. Defaults target imhonet; any field can be overridden
/// through `IMHO_<FIELD>` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Listing page template with `{username}`, `{subject}` and `{rating}` placeholders.
    pub rates_url: String,
    pub login_url: String,
    pub rate_info_url: String,
    /// Content type sent with every rating-date request.
    pub rate_content_id: String,
    pub output_dir: PathBuf,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            rates_url: "http://{username}.imhonet.ru/content/{subject}/rates/{rating}/".into(),
            login_url: "http://imhonet.ru/ajax.php?log=Authorize".into(),
            rate_info_url: "http://films.imhonet.ru/ajax.php?log=ExRateInfo".into(),
            rate_content_id: "3".into(),
            output_dir: PathBuf::from("."),
            timeout_secs: 30,
            user_agent: concat!("imho_dump/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(Environment::with_prefix("IMHO").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn rates_url(&self, username: &str, subject: Subject, rating: u8) -> String {
        self.rates_url
            .replace("{username}", username)
            .replace("{subject}", subject.slug())
            .replace("{rating}", &rating.to_string())
    }

    pub fn output_path(&self, username: &str, subject: Subject) -> PathBuf {
        self.output_dir
            .join(format!("imho_rates_{}_{}.json", subject.slug(), username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_url_fills_placeholders() {
        let s = Settings::default();
        assert_eq!(
            s.rates_url("alice", Subject::Series, 7),
            "http://alice.imhonet.ru/content/serials/rates/7/"
        );
    }

    #[test]
    fn output_path_uses_subject_slug() {
        let s = Settings {
            output_dir: PathBuf::from("out"),
            ..Settings::default()
        };
        assert_eq!(
            s.output_path("bob", Subject::Books),
            PathBuf::from("out/imho_rates_books_bob.json")
        );
    }

    #[test]
    fn defaults_survive_config_roundtrip() {
        let s = Settings::load().unwrap();
        assert_eq!(s.rate_content_id, Settings::default().rate_content_id);
    }
}
