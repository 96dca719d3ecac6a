//! Device configuration.
//!
//! [`UserConfig`] is loaded once at startup from a TOML document with exactly four
//! keys and is never mutated afterwards:
//!
//! ```toml
//! whitelist = ["friend@example.com", "family@example.org"]
//! username = "cube@example.com"
//! password = "app-password"
//! imap-url = "imaps://imap.example.com"
//! ```
//!
//! `whitelist` may also be a single space-delimited string. Missing, extra or
//! mistyped keys reject the whole document, as does any entry that is not
//! email-shaped.
//!
//! `imap-url` is `imaps://host[:port]`, `imap://host[:port]` or a bare
//! `host[:port]`. All three connect with implicit TLS and default to port 993.
//! In particular `imap://` does NOT mean plain IMAP or STARTTLS on port 143: a
//! server that only offers STARTTLS is not supported.
//!
//! ```
//! use companion_cube::UserConfig;
//!
//! let config = UserConfig::builder()
//!     .username("cube@example.com")
//!     .password("app-password")
//!     .imap_url("imap.example.com")
//!     .whitelist(["friend@example.com"])
//!     .build()
//!     .expect("valid config");
//!
//! assert!(config.is_whitelisted("Friend@Example.com"));
//! ```

use crate::error::{Error, Result};
use email_address::EmailAddress;
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default IMAPS port.
const DEFAULT_IMAP_PORT: u16 = 993;

/// `[imap://|imaps://]host[:port][/]`
static IMAP_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?i:imaps?)://)?([A-Za-z0-9](?:[A-Za-z0-9.-]{0,251}[A-Za-z0-9])?)(?::(\d{1,5}))?/?$",
    )
    .expect("valid regex")
});

/// Validated user configuration.
///
/// The password is held as a [`SecretString`] and never appears in `Debug` output.
#[derive(Clone)]
pub struct UserConfig {
    username: EmailAddress,
    password: SecretString,
    imap_url: ImapUrl,
    whitelist: Vec<EmailAddress>,
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("username", &self.username.as_str())
            .field("password", &"[REDACTED]")
            .field("imap_url", &self.imap_url)
            .field("whitelist", &self.whitelist_strs().collect::<Vec<_>>())
            .finish()
    }
}

impl UserConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> UserConfigBuilder {
        UserConfigBuilder::default()
    }

    /// Loads and validates the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConfigNotFound`] if the file does not exist
    /// - [`Error::ReadConfig`] if it cannot be read
    /// - [`Error::ParseConfig`] for missing, extra or mistyped keys
    /// - [`Error::InvalidEmailFormat`], [`Error::InvalidImapUrl`] or
    ///   [`Error::InvalidConfig`] for values that fail validation
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let document = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&document, &path.display().to_string())
    }

    /// Parses and validates a configuration document.
    ///
    /// `origin` names the document in error messages.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus the file access errors.
    pub fn parse(document: &str, origin: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(document).map_err(|source| Error::ParseConfig {
            origin: origin.to_string(),
            source,
        })?;

        Self::builder()
            .username(raw.username)
            .password(raw.password)
            .imap_url(raw.imap_url)
            .whitelist(raw.whitelist.into_entries())
            .build()
    }

    /// Returns the login address as a string slice.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns the password.
    ///
    /// Only the mail transport should call this.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns the parsed IMAP server location.
    #[must_use]
    pub fn imap_url(&self) -> &ImapUrl {
        &self.imap_url
    }

    /// Returns the whitelisted sender addresses in configuration order.
    #[must_use]
    pub fn whitelist(&self) -> &[EmailAddress] {
        &self.whitelist
    }

    /// Returns whether `sender` is an approved sender (ASCII case-insensitive).
    #[must_use]
    pub fn is_whitelisted(&self, sender: &str) -> bool {
        self.whitelist_strs()
            .any(|allowed| allowed.eq_ignore_ascii_case(sender.trim()))
    }

    fn whitelist_strs(&self) -> impl Iterator<Item = &str> {
        self.whitelist.iter().map(EmailAddress::as_str)
    }
}

/// Location of the IMAP server.
///
/// Accepts `imaps://host[:port]`, `imap://host[:port]` or a bare `host[:port]`.
/// The connection is always made over implicit TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImapUrl {
    raw: String,
    host: String,
    port: u16,
}

impl ImapUrl {
    /// Parses an IMAP URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidImapUrl`] if the URL is not of the accepted shape
    /// or its host is not usable as a TLS server name.
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || Error::InvalidImapUrl {
            url: url.to_string(),
        };

        let caps = IMAP_URL.captures(url.trim()).ok_or_else(invalid)?;
        let host = caps.get(1).ok_or_else(invalid)?.as_str().to_string();
        let port = match caps.get(2) {
            Some(port) => port
                .as_str()
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(invalid)?,
            None => DEFAULT_IMAP_PORT,
        };

        rustls::ServerName::try_from(host.as_str()).map_err(|_| invalid())?;

        Ok(Self {
            raw: url.to_string(),
            host,
            port,
        })
    }

    /// Returns the URL as written in the configuration.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the server hostname.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the server port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the server address as "host:port".
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for ImapUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// On-disk shape of the configuration document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    whitelist: RawWhitelist,
    username: String,
    password: String,
    #[serde(rename = "imap-url")]
    imap_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawWhitelist {
    List(Vec<String>),
    Delimited(String),
}

impl RawWhitelist {
    fn into_entries(self) -> Vec<String> {
        match self {
            RawWhitelist::List(entries) => entries,
            RawWhitelist::Delimited(line) => line.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// Validates an email address.
///
/// Beyond RFC syntax the domain must carry a TLD, so bare hosts such as
/// `user@localhost` are rejected, and display names or domain literals are refused.
fn validate_email(email: &str) -> Result<EmailAddress> {
    let options = email_address::Options::default()
        .with_required_tld()
        .without_domain_literal()
        .without_display_text();

    EmailAddress::parse_with_options(email, options).map_err(|_| Error::InvalidEmailFormat {
        email: email.to_string(),
    })
}

/// Builder for [`UserConfig`].
#[derive(Debug, Default)]
pub struct UserConfigBuilder {
    username: Option<String>,
    password: Option<String>,
    imap_url: Option<String>,
    whitelist: Vec<String>,
}

impl UserConfigBuilder {
    /// Sets the login address (required).
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password (required, non-empty).
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the IMAP server URL (required).
    #[must_use]
    pub fn imap_url(mut self, url: impl Into<String>) -> Self {
        self.imap_url = Some(url.into());
        self
    }

    /// Adds approved sender addresses (at least one required overall).
    #[must_use]
    pub fn whitelist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelist.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is missing or any value is invalid. A single
    /// bad whitelist entry rejects the whole configuration.
    pub fn build(self) -> Result<UserConfig> {
        let username_raw = self.username.ok_or_else(|| Error::InvalidConfig {
            message: "username is required".into(),
        })?;
        let username = validate_email(&username_raw)?;

        let password_raw = self.password.ok_or_else(|| Error::InvalidConfig {
            message: "password is required".into(),
        })?;
        if password_raw.is_empty() {
            return Err(Error::InvalidConfig {
                message: "password must not be empty".into(),
            });
        }

        let url_raw = self.imap_url.ok_or_else(|| Error::InvalidConfig {
            message: "imap-url is required".into(),
        })?;
        let imap_url = ImapUrl::parse(&url_raw)?;

        if self.whitelist.is_empty() {
            return Err(Error::InvalidConfig {
                message: "whitelist must contain at least one address".into(),
            });
        }
        let mut whitelist: Vec<EmailAddress> = Vec::with_capacity(self.whitelist.len());
        for entry in &self.whitelist {
            let address = validate_email(entry)?;
            if !whitelist
                .iter()
                .any(|known| known.as_str().eq_ignore_ascii_case(address.as_str()))
            {
                whitelist.push(address);
            }
        }

        Ok(UserConfig {
            username,
            password: SecretString::from(password_raw),
            imap_url,
            whitelist,
        })
    }
}

/// Timeouts bounding each IMAP network step.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing TCP/TLS connection.
    pub connect: Duration,
    /// Timeout for IMAP authentication.
    pub auth: Duration,
    /// Timeout for selecting a mailbox.
    pub select: Duration,
    /// Timeout for searching unread messages.
    pub search: Duration,
    /// Timeout for fetching one message.
    pub message_fetch: Duration,
    /// Timeout for flagging one message as seen.
    pub store: Duration,
    /// Timeout for logout operation.
    pub logout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            auth: Duration::from_secs(30),
            select: Duration::from_secs(10),
            search: Duration::from_secs(10),
            message_fetch: Duration::from_secs(30),
            store: Duration::from_secs(10),
            logout: Duration::from_secs(5),
        }
    }
}

/// Timing and threshold settings of the control loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Minimum spacing between successful fetches, and the backoff after finding
    /// no whitelisted message.
    pub fetch_delay: Duration,
    /// Backoff after a fetch found no Internet connection.
    pub no_internet_delay: Duration,
    /// How long the switch must be held to latch debug mode.
    pub debug_switch_press: Duration,
    /// Light level at or above which the lid counts as open.
    pub light_sensor_threshold: u16,
    /// Pause between loop iterations.
    pub tick: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            fetch_delay: Duration::from_secs(60),
            no_internet_delay: Duration::from_secs(120),
            debug_switch_press: Duration::from_secs(15),
            light_sensor_threshold: 120,
            tick: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
whitelist = ["a@b.co"]
username = "me@x.co"
password = "p"
imap-url = "imap://x"
"#;

    fn with_line(key: &str, line: &str) -> String {
        VALID
            .lines()
            .map(|l| if l.starts_with(key) { line } else { l })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_parse_minimal() {
        let config = UserConfig::parse(VALID, "test").unwrap();

        assert_eq!(config.username(), "me@x.co");
        assert_eq!(config.password(), "p");
        assert_eq!(config.imap_url().host(), "x");
        assert_eq!(config.imap_url().port(), 993);
        assert_eq!(config.whitelist().len(), 1);
        assert!(config.is_whitelisted("a@b.co"));
    }

    #[test]
    fn test_parse_rejects_bad_whitelist_entry() {
        let doc = with_line("whitelist", r#"whitelist = ["a@b.co", "not-an-email"]"#);
        let err = UserConfig::parse(&doc, "test").unwrap_err();
        assert!(matches!(err, Error::InvalidEmailFormat { ref email } if email == "not-an-email"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_parse_space_delimited_whitelist() {
        let doc = with_line("whitelist", r#"whitelist = "a@b.co  c@d.org""#);
        let config = UserConfig::parse(&doc, "test").unwrap();
        assert_eq!(config.whitelist().len(), 2);
        assert!(config.is_whitelisted("c@d.org"));
    }

    #[test]
    fn test_parse_empty_whitelist() {
        let doc = with_line("whitelist", "whitelist = []");
        let err = UserConfig::parse(&doc, "test").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_parse_missing_key() {
        let doc: String = VALID
            .lines()
            .filter(|l| !l.starts_with("imap-url"))
            .collect::<Vec<_>>()
            .join("\n");
        let err = UserConfig::parse(&doc, "test").unwrap_err();
        assert!(matches!(err, Error::ParseConfig { .. }));
    }

    #[test]
    fn test_parse_extra_key() {
        let doc = format!("{VALID}\nport = 993\n");
        let err = UserConfig::parse(&doc, "test").unwrap_err();
        assert!(matches!(err, Error::ParseConfig { .. }));
    }

    #[test]
    fn test_parse_mistyped_password() {
        let doc = with_line("password", "password = 1234");
        let err = UserConfig::parse(&doc, "test").unwrap_err();
        assert!(matches!(err, Error::ParseConfig { .. }));
    }

    #[test]
    fn test_parse_empty_password() {
        let doc = with_line("password", r#"password = """#);
        let err = UserConfig::parse(&doc, "test").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_parse_bad_username() {
        let doc = with_line("username", r#"username = "me""#);
        let err = UserConfig::parse(&doc, "test").unwrap_err();
        assert!(matches!(err, Error::InvalidEmailFormat { .. }));
    }

    #[test]
    fn test_parse_bad_imap_url() {
        let doc = with_line("imap-url", r#"imap-url = "http://exa mple.com/inbox""#);
        let err = UserConfig::parse(&doc, "test").unwrap_err();
        assert!(matches!(err, Error::InvalidImapUrl { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = UserConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, VALID).unwrap();

        let config = UserConfig::load(&path).unwrap();
        assert_eq!(config.username(), "me@x.co");
    }

    #[test]
    fn test_email_shapes() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("first.last@mail.example.org").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("user@localhost").is_err());
        assert!(validate_email("user@example.").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_imap_url_forms() {
        let url = ImapUrl::parse("imaps://imap.gmail.com").unwrap();
        assert_eq!(url.server_address(), "imap.gmail.com:993");

        let url = ImapUrl::parse("imap://mail.example.com:1143/").unwrap();
        assert_eq!(url.host(), "mail.example.com");
        assert_eq!(url.port(), 1143);

        let url = ImapUrl::parse("mail.example.com").unwrap();
        assert_eq!(url.port(), 993);
        assert_eq!(url.to_string(), "mail.example.com");

        assert!(ImapUrl::parse("").is_err());
        assert!(ImapUrl::parse("ftp://example.com").is_err());
        assert!(ImapUrl::parse("imap://example.com:0").is_err());
        assert!(ImapUrl::parse("imap://example.com:99999").is_err());
    }

    #[test]
    fn test_imap_scheme_still_uses_implicit_tls_port() {
        let url = ImapUrl::parse("imap://mail.example.com").unwrap();
        assert_eq!(url.port(), 993);
    }

    #[test]
    fn test_imap_url_bad_tls_host_is_config_error() {
        // Passes the shape check but has an empty DNS label
        let err = ImapUrl::parse("imap://mail..example.com").unwrap_err();
        assert!(matches!(err, Error::InvalidImapUrl { ref url } if url == "imap://mail..example.com"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_whitelist_case_insensitive_and_deduplicated() {
        let config = UserConfig::builder()
            .username("me@x.co")
            .password("p")
            .imap_url("imap://x")
            .whitelist(["Friend@Example.com", "friend@example.com"])
            .build()
            .unwrap();

        assert_eq!(config.whitelist().len(), 1);
        assert!(config.is_whitelisted("FRIEND@example.COM"));
        assert!(!config.is_whitelisted("stranger@example.com"));
    }

    #[test]
    fn test_builder_missing_fields() {
        assert!(UserConfig::builder().password("p").build().is_err());
        assert!(UserConfig::builder()
            .username("me@x.co")
            .password("p")
            .whitelist(["a@b.co"])
            .build()
            .is_err());
    }

    #[test]
    fn test_password_not_in_debug() {
        let config = UserConfig::builder()
            .username("me@x.co")
            .password("super-secret-password")
            .imap_url("imap://x")
            .whitelist(["a@b.co"])
            .build()
            .unwrap();

        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("super-secret-password"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_loop_defaults() {
        let timings = LoopConfig::default();
        assert_eq!(timings.fetch_delay, Duration::from_secs(60));
        assert_eq!(timings.no_internet_delay, Duration::from_secs(120));
        assert_eq!(timings.debug_switch_press, Duration::from_secs(15));
        assert_eq!(timings.light_sensor_threshold, 120);
    }
}
