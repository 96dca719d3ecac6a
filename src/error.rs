//! Error types for the companion-cube crate.
//!
//! Every error is classified by [`Severity`]: fatal errors stop the device before
//! (or instead of) entering the control loop, non-fatal errors are absorbed by the
//! fetcher and turned into a backoff decision. See [`Error::severity`].

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running the device.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration errors (FATAL)
    // ─────────────────────────────────────────────────────────────────────────
    /// The configuration file does not exist.
    #[error("no config file at {}", path.display())]
    ConfigNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The configuration file exists but could not be read.
    #[error("failed to read config file {}", path.display())]
    ReadConfig {
        /// Path of the config file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is malformed, has missing or extra keys, or
    /// a value of the wrong type.
    #[error("invalid config file {origin}")]
    ParseConfig {
        /// Where the document came from (usually the file path).
        origin: String,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// Invalid email address format.
    #[error("invalid email: {email}")]
    InvalidEmailFormat {
        /// The invalid email address.
        email: String,
    },

    /// Invalid IMAP URL.
    #[error("invalid URL: {url}")]
    InvalidImapUrl {
        /// The rejected URL.
        url: String,
    },

    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Startup / device errors (FATAL)
    // ─────────────────────────────────────────────────────────────────────────
    /// No Internet connection while starting up.
    #[error("no Internet connection")]
    NoConnectivity,

    /// The display could not be initialized.
    #[error("failed to initialize display: {message}")]
    DisplayInit {
        /// Description of the display failure.
        message: String,
    },

    /// A peripheral could not be opened.
    #[error("failed to open {device} at {}", path.display())]
    DeviceOpen {
        /// Which peripheral (switch, led, light sensor).
        device: &'static str,
        /// Path of the device file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The log file could not be opened for appending.
    #[error("failed to open log file {}", path.display())]
    LogSink {
        /// Path of the log file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Network / connection errors (NON-FATAL)
    // ─────────────────────────────────────────────────────────────────────────
    /// The server name was rejected for TLS at connect time.
    #[error("invalid DNS name for host '{host}'")]
    InvalidDnsName {
        /// The invalid hostname.
        host: String,
        /// The underlying DNS name error.
        #[source]
        source: rustls::client::InvalidDnsNameError,
    },

    /// Failed to establish TCP connection.
    #[error("failed to connect to {target}")]
    TcpConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to establish TLS connection.
    #[error("failed to establish TLS connection to {target}")]
    TlsConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Timeout errors (NON-FATAL)
    // ─────────────────────────────────────────────────────────────────────────
    /// Connection timeout.
    #[error("connection timeout to {target} after {timeout:?}")]
    ConnectTimeout {
        /// The target address.
        target: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Authentication timeout.
    #[error("authentication timeout for {email} after {timeout:?}")]
    AuthTimeout {
        /// The email address used for authentication.
        email: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Mailbox selection timeout.
    #[error("mailbox selection timeout for '{mailbox}' after {timeout:?}")]
    SelectTimeout {
        /// The mailbox name.
        mailbox: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Unread search timeout.
    #[error("unread search timeout after {timeout:?}")]
    SearchTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Message fetch timeout.
    #[error("message fetch timeout for UID {uid} after {timeout:?}")]
    FetchTimeout {
        /// The UID being fetched.
        uid: u32,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Flag store timeout.
    #[error("flag store timeout for UID {uid} after {timeout:?}")]
    StoreTimeout {
        /// The UID being flagged.
        uid: u32,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Logout timeout.
    #[error("logout timeout after {timeout:?}")]
    LogoutTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // IMAP protocol errors (NON-FATAL)
    // ─────────────────────────────────────────────────────────────────────────
    /// IMAP login failed.
    #[error("IMAP login failed for {email}")]
    ImapLogin {
        /// The email address used for login.
        email: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Failed to select mailbox.
    #[error("failed to select mailbox '{mailbox}'")]
    SelectMailbox {
        /// The mailbox name.
        mailbox: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP search failed.
    #[error("IMAP search failed")]
    ImapSearch {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP fetch failed.
    #[error("IMAP fetch failed for UID {uid}")]
    ImapFetch {
        /// The UID that failed.
        uid: u32,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP flag store failed.
    #[error("IMAP store failed for UID {uid}")]
    ImapStore {
        /// The UID that failed.
        uid: u32,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP logout failed.
    #[error("IMAP logout failed")]
    ImapLogout {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Content errors (NON-FATAL)
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to parse email message.
    #[error("failed to parse email UID {uid}")]
    ParseEmail {
        /// The UID of the message.
        uid: u32,
        /// The underlying parse error.
        #[source]
        source: mailparse::MailParseError,
    },

    /// The attachment content is not valid UTF-8 text.
    #[error("attachment '{filename}' is not UTF-8 text")]
    AttachmentNotText {
        /// Name of the attachment.
        filename: String,
        /// The underlying decode error.
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// The selected message carries no attachment.
    #[error("message UID {uid} has no attachment")]
    MissingAttachment {
        /// The UID of the message.
        uid: u32,
    },

    /// A simulated or driver-reported mail transport failure.
    #[error("mail transport failure: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
}

impl Error {
    /// Returns whether this error makes correct operation impossible without an
    /// operator.
    ///
    /// Fatal errors abort startup. Non-fatal errors are reported by the fetcher
    /// as an unclassified failure and the loop keeps running.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Error::ConfigNotFound { .. }
            | Error::ReadConfig { .. }
            | Error::ParseConfig { .. }
            | Error::InvalidEmailFormat { .. }
            | Error::InvalidImapUrl { .. }
            | Error::InvalidConfig { .. }
            | Error::NoConnectivity
            | Error::DisplayInit { .. }
            | Error::DeviceOpen { .. }
            | Error::LogSink { .. } => Severity::Fatal,

            Error::InvalidDnsName { .. }
            | Error::TcpConnect { .. }
            | Error::TlsConnect { .. }
            | Error::ConnectTimeout { .. }
            | Error::AuthTimeout { .. }
            | Error::SelectTimeout { .. }
            | Error::SearchTimeout { .. }
            | Error::FetchTimeout { .. }
            | Error::StoreTimeout { .. }
            | Error::LogoutTimeout { .. }
            | Error::ImapLogin { .. }
            | Error::SelectMailbox { .. }
            | Error::ImapSearch { .. }
            | Error::ImapFetch { .. }
            | Error::ImapStore { .. }
            | Error::ImapLogout { .. }
            | Error::ParseEmail { .. }
            | Error::AttachmentNotText { .. }
            | Error::MissingAttachment { .. }
            | Error::Transport { .. } => Severity::NonFatal,
        }
    }

    /// Shorthand for `self.severity() == Severity::Fatal`.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Renders the error followed by its source chain, `outer: inner: root`.
    ///
    /// `Display` only shows the outermost message; log lines use this so the
    /// underlying cause (a TOML key, an I/O error) is not lost.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut detail = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }
        detail
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ConfigNotFound { .. }
            | Error::ReadConfig { .. }
            | Error::ParseConfig { .. }
            | Error::InvalidEmailFormat { .. }
            | Error::InvalidImapUrl { .. }
            | Error::InvalidConfig { .. } => ErrorCategory::Configuration,

            Error::NoConnectivity
            | Error::InvalidDnsName { .. }
            | Error::TcpConnect { .. }
            | Error::TlsConnect { .. } => ErrorCategory::Network,

            Error::ConnectTimeout { .. }
            | Error::AuthTimeout { .. }
            | Error::SelectTimeout { .. }
            | Error::SearchTimeout { .. }
            | Error::FetchTimeout { .. }
            | Error::StoreTimeout { .. }
            | Error::LogoutTimeout { .. } => ErrorCategory::Timeout,

            Error::ImapLogin { .. }
            | Error::SelectMailbox { .. }
            | Error::ImapSearch { .. }
            | Error::ImapFetch { .. }
            | Error::ImapStore { .. }
            | Error::ImapLogout { .. }
            | Error::Transport { .. } => ErrorCategory::Protocol,

            Error::ParseEmail { .. }
            | Error::AttachmentNotText { .. }
            | Error::MissingAttachment { .. } => ErrorCategory::Parse,

            Error::DisplayInit { .. } | Error::DeviceOpen { .. } | Error::LogSink { .. } => {
                ErrorCategory::Device
            }
        }
    }
}

/// Whether an error stops the device or is absorbed by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Requires operator intervention; the process exits.
    Fatal,
    /// Transient or per-attempt; the control loop survives it.
    NonFatal,
}

/// Error categories for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration or validation errors.
    Configuration,
    /// Network connectivity errors.
    Network,
    /// Timeout errors.
    Timeout,
    /// IMAP protocol errors.
    Protocol,
    /// Email or attachment content errors.
    Parse,
    /// Display, peripheral or log file errors.
    Device,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::Protocol => write!(f, "protocol"),
            ErrorCategory::Parse => write!(f, "parse"),
            ErrorCategory::Device => write!(f, "device"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classification() {
        // Configuration errors stop the device
        let err = Error::InvalidEmailFormat {
            email: "bad".into(),
        };
        assert!(err.is_fatal());

        // No connectivity is only fatal at startup, which is the only place it is raised
        assert_eq!(Error::NoConnectivity.severity(), Severity::Fatal);

        // Network errors during a fetch are absorbed
        let err = Error::TcpConnect {
            target: "imap.example.com:993".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(err.severity(), Severity::NonFatal);

        let err = Error::LogoutTimeout {
            timeout: Duration::from_secs(5),
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_error_categories() {
        let err = Error::InvalidImapUrl {
            url: "nope".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);

        let err = Error::ConnectTimeout {
            target: "imap.example.com:993".into(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(err.category(), ErrorCategory::Timeout);

        let err = Error::DisplayInit {
            message: "no tty".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Device);
        assert_eq!(err.category().to_string(), "device");
    }

    #[test]
    fn test_dns_name_rejection_is_absorbed() {
        let err = Error::InvalidDnsName {
            host: String::new(),
            source: rustls::ServerName::try_from("").unwrap_err(),
        };
        assert_eq!(err.severity(), Severity::NonFatal);
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_detail_includes_io_cause() {
        let err = Error::DeviceOpen {
            device: "led",
            path: "/sys/class/gpio/gpio7/value".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(
            err.detail(),
            "failed to open led at /sys/class/gpio/gpio7/value: no such file"
        );
    }

    #[test]
    fn test_detail_names_offending_config_key() {
        let document = r#"
whitelist = ["a@b.co"]
username = "me@x.co"
password = "p"
imap-url = "imap://x"
port = 993
"#;
        let err = crate::UserConfig::parse(document, "cfg/config.toml").unwrap_err();

        assert!(!err.to_string().contains("port"));
        let detail = err.detail();
        assert!(detail.starts_with("invalid config file cfg/config.toml: "));
        assert!(detail.contains("port"), "{detail}");
    }

    #[test]
    fn test_messages_match_device_log_wording() {
        let err = Error::InvalidEmailFormat {
            email: "not-an-email".into(),
        };
        assert_eq!(err.to_string(), "invalid email: not-an-email");
        assert_eq!(Error::NoConnectivity.to_string(), "no Internet connection");
    }
}
