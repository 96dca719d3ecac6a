//! Integration tests for companion-cube.
//!
//! These tests require a real IMAP server and are disabled by default.
//! To run them:
//!
//! ```bash
//! # Set environment variables (or put them in a .env file)
//! export COMPANION_CUBE_TEST_USERNAME="cube@example.com"
//! export COMPANION_CUBE_TEST_PASSWORD="your-app-password"
//! export COMPANION_CUBE_TEST_IMAP_URL="imaps://imap.example.com"
//! export COMPANION_CUBE_TEST_WHITELIST="friend@example.com family@example.org"
//!
//! # Run with the integration-tests feature
//! cargo test --features integration-tests -- --ignored
//! ```
//!
//! Fetch tests consume unread messages: everything scanned is flagged as seen.

use companion_cube::selector::{self, WhitelistMatcher};
use companion_cube::{
    Error, FetchOutcome, Fetcher, ImapTransport, MailTransport, TcpProbe, TimeoutConfig,
    UserConfig,
};
use std::env;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Test Configuration Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn get_test_config() -> Option<UserConfig> {
    dotenvy::dotenv().ok();
    let username = env::var("COMPANION_CUBE_TEST_USERNAME").ok()?;
    let password = env::var("COMPANION_CUBE_TEST_PASSWORD").ok()?;
    let imap_url = env::var("COMPANION_CUBE_TEST_IMAP_URL").ok()?;
    let whitelist = env::var("COMPANION_CUBE_TEST_WHITELIST").ok()?;

    UserConfig::builder()
        .username(username)
        .password(password)
        .imap_url(imap_url)
        .whitelist(whitelist.split_whitespace())
        .build()
        .ok()
}

fn short_timeouts() -> TimeoutConfig {
    TimeoutConfig {
        connect: Duration::from_secs(10),
        auth: Duration::from_secs(10),
        ..TimeoutConfig::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real IMAP server"]
async fn test_open_and_close() {
    let config = get_test_config().expect("Test config from environment variables");

    let mut session = ImapTransport::new(short_timeouts())
        .open(&config)
        .await
        .expect("Failed to open session");

    session.close().await.expect("Failed to close session");
}

#[tokio::test]
#[ignore = "requires real IMAP server"]
async fn test_wrong_password_is_not_fatal() {
    let config = get_test_config().expect("Test config from environment variables");
    let whitelist: Vec<String> = config.whitelist().iter().map(ToString::to_string).collect();

    let wrong = UserConfig::builder()
        .username(config.username())
        .password("definitely-not-the-password")
        .imap_url(config.imap_url().as_str())
        .whitelist(whitelist)
        .build()
        .unwrap();

    let err = ImapTransport::new(short_timeouts())
        .open(&wrong)
        .await
        .err()
        .expect("login with a wrong password should fail");

    assert!(matches!(err, Error::ImapLogin { .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
#[ignore = "requires real IMAP server"]
async fn test_scan_unread() {
    let config = get_test_config().expect("Test config from environment variables");

    let mut session = ImapTransport::new(short_timeouts())
        .open(&config)
        .await
        .expect("Failed to open session");

    let selected = selector::select_message(session.as_mut(), &WhitelistMatcher::new(&config))
        .await
        .expect("Scan failed");

    match selected {
        Some(message) => {
            println!(
                "Selected message {} from {:?} with {} attachment(s)",
                message.id,
                message.sender,
                message.attachments.len()
            );
            assert!(!message.attachments.is_empty());
        }
        None => println!("No unread whitelisted message (expected on a quiet inbox)"),
    }

    session.close().await.expect("Failed to close session");
}

// ─────────────────────────────────────────────────────────────────────────────
// Fetcher Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real IMAP server"]
async fn test_fetch_attempt() {
    let config = get_test_config().expect("Test config from environment variables");
    let fetcher = Fetcher::new(TcpProbe::default(), ImapTransport::new(short_timeouts()));

    match fetcher.fetch(&config).await {
        FetchOutcome::Success(text) => println!("Fetched: {text}"),
        FetchOutcome::NoMatchingMessage => println!("No matching message"),
        outcome => panic!("Unexpected outcome: {outcome:?}"),
    }
}

#[tokio::test]
#[ignore = "requires real IMAP server"]
async fn test_fetch_against_unreachable_server() {
    let config = get_test_config().expect("Test config from environment variables");
    let whitelist: Vec<String> = config.whitelist().iter().map(ToString::to_string).collect();

    let unreachable = UserConfig::builder()
        .username(config.username())
        .password(config.password())
        .imap_url("imaps://localhost:1")
        .whitelist(whitelist)
        .build()
        .unwrap();

    let fetcher = Fetcher::new(TcpProbe::default(), ImapTransport::new(short_timeouts()));
    assert!(matches!(
        fetcher.fetch(&unreachable).await,
        FetchOutcome::UnknownFailure(_)
    ));
}
