use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use tracing::{debug, info};

use crate::error::{DumpError, Result};
use crate::settings::Settings;

static USER_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_user_id=\d+;").unwrap());
static USER_HASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_user_hash=\w+;").unwrap());

/// Blocking request surface used by the scraper. `HttpClient` talks to the
/// site; tests substitute an in-memory fake.
pub trait Transport {
    /// GET `url` and return the body as text.
    fn get(&self, url: &str) -> Result<String>;

    /// Authenticated XHR form POST; returns the body as text.
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String>;
}

pub struct HttpClient {
    client: Client,
    cookie: Option<String>,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(DumpError::Client)?;
        Ok(HttpClient {
            client,
            cookie: None,
        })
    }

    /// Log in and keep the session cookie for later authenticated calls.
    pub fn login(&mut self, login_url: &str, username: &str, password: &str) -> Result<()> {
        info!("Logging in as {}", username);
        let resp = self
            .client
            .post(login_url)
            .header("X-Requested-With", "XMLHttpRequest")
            .form(&[
                ("action", "Authorize"),
                ("login", username),
                ("password", password),
                ("forever", "1"),
            ])
            .send()
            .map_err(|source| DumpError::Fetch {
                url: login_url.to_string(),
                source,
            })?;
        self.cookie = Some(session_cookie(resp.headers())?);
        Ok(())
    }

    fn send_text(&self, url: &str, req: reqwest::blocking::RequestBuilder) -> Result<String> {
        let fetch_err = |source| DumpError::Fetch {
            url: url.to_string(),
            source,
        };
        let resp = req.send().map_err(fetch_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DumpError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().map_err(fetch_err)
    }
}

impl Transport for HttpClient {
    fn get(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        self.send_text(url, self.client.get(url))
    }

    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String> {
        debug!("POST {}", url);
        let mut req = self
            .client
            .post(url)
            .header("X-Requested-With", "XMLHttpRequest")
            .form(form);
        if let Some(cookie) = &self.cookie {
            let value = HeaderValue::from_str(cookie).map_err(|_| DumpError::Authentication)?;
            req = req.header(COOKIE, value);
        }
        self.send_text(url, req)
    }
}

/// Build the `Cookie` header value from the login response's `Set-Cookie` headers.
pub fn session_cookie(headers: &HeaderMap) -> Result<String> {
    let joined = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(", ");
    cookie_from_set_cookie(&joined)
}

fn cookie_from_set_cookie(set_cookie: &str) -> Result<String> {
    let user_id = USER_ID_RE.find(set_cookie).ok_or(DumpError::Authentication)?;
    let user_hash = USER_HASH_RE.find(set_cookie).ok_or(DumpError::Authentication)?;
    Ok(format!("{} {}", user_id.as_str(), user_hash.as_str()))
}
