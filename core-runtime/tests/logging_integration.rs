//! Integration tests for logging setup

use bridge_traits::logging::{ConsoleLogger, LogLevel};
use core_runtime::logging::{init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::Arc;

// The global subscriber can only be installed once per test binary, so both
// the first install and the rejected second install live in one test.
#[test]
fn test_init_logging_only_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(Arc::new(ConsoleLogger {
            min_level: LogLevel::Warn,
        }));

    init_logging(config).expect("first initialization succeeds");
    tracing::info!(target: "core_runtime", "logging ready");

    let second = init_logging(LoggingConfig::default().with_format(LogFormat::Json));
    assert!(matches!(second, Err(Error::Logging(_))));
}

#[test]
fn test_invalid_filter_is_a_config_error() {
    let config = LoggingConfig::default().with_filter("core_api=notalevel");
    let result = init_logging(config);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_upload_credentials_are_redacted() {
    assert_eq!(redact_if_sensitive("secret_access_key", "xyz"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("Authorization", "Bearer abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("X-Amz-Signature", "f00"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("bucket_name", "media"), "media");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/home/ana/videos/trip.mp4"), "trip.mp4");
    assert_eq!(strip_path("D:\\data\\file.txt"), "file.txt");
    assert_eq!(strip_path(""), "");
}
