use bridge_traits::logging::{ConsoleLogger, LogLevel};
use core_runtime::logging::{init_logging, redact_locator, strip_path, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::Arc;

#[test]
fn builder_collects_settings() {
    let config = LoggingConfig::default()
        .format(LogFormat::Compact)
        .level(LogLevel::Warn)
        .directive("core_service::guard=debug")
        .sink(Arc::new(ConsoleLogger::default()));

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert_eq!(config.directives, ["core_service::guard=debug"]);
    assert!(config.sink.is_some());
    assert!(!config.span_events);
}

#[test]
fn local_paths_are_reduced_to_file_names() {
    let path = "/storage/emulated/0/Music/Artist/01 - Intro.mp3";
    assert_eq!(strip_path(path), "01 - Intro.mp3");
}

#[test]
fn stream_urls_lose_credentials() {
    let url = "https://firebasestorage.googleapis.com/v0/b/app/o/song.mp3?alt=media&token=f00";
    let redacted = redact_locator(url);
    assert!(!redacted.contains("token"));
    assert!(redacted.ends_with("song.mp3"));
}

// Only test in this binary that installs the global subscriber.
#[test]
fn second_install_is_refused() {
    let first = init_logging(LoggingConfig::default().format(LogFormat::Compact));
    let second = init_logging(LoggingConfig::default());

    assert!(first.is_ok());
    assert!(matches!(second, Err(Error::Logging(_))));
}
