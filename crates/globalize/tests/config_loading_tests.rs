//! Table-driven tests for agent configuration loading and validation.

use std::time::Duration;

use globalize::config::{load_config, load_config_from_str};
use globalize::logging::LogFormat;
use globalize::PipelineConfig;

struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "empty_object",
        config_json: "{}",
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "databasePath": "/var/lib/globalize/jobs.db",
            "workRoot": "/var/tmp/globalize",
            "defaultLanguages": ["es", "pt-BR", "zh-Hans"],
            "github": {
                "tokenFile": "/run/secrets/github",
                "botUsername": "acme-bot",
                "apiBaseUrl": "https://github.example.com/api/v3",
                "branchName": "chore/i18n",
                "forkPollAttempts": 5,
                "forkPollIntervalSecs": 1
            },
            "rewriter": {"model": "gemini-2.5-pro", "apiKeyEnvVar": "ACME_GEMINI_KEY"},
            "translator": {"program": "lingo", "args": ["i18n", "--frozen"]},
            "logging": {"format": "json", "filter": "warn,globalize=info"}
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "invalid_json",
        config_json: r#"{"defaultLanguages": ["es",]}"#,
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
    ConfigTestCase {
        name: "invalid_language_code",
        config_json: r#"{"defaultLanguages": ["es", "Spanish"]}"#,
        should_succeed: false,
        expected_error: Some("Invalid language code in defaultLanguages: 'Spanish'"),
    },
    ConfigTestCase {
        name: "empty_branch_name",
        config_json: r#"{"github": {"branchName": "  "}}"#,
        should_succeed: false,
        expected_error: Some("github.branchName must not be empty"),
    },
    ConfigTestCase {
        name: "zero_fork_poll_attempts",
        config_json: r#"{"github": {"forkPollAttempts": 0}}"#,
        should_succeed: false,
        expected_error: Some("github.forkPollAttempts must be at least 1"),
    },
    ConfigTestCase {
        name: "non_http_api_url",
        config_json: r#"{"github": {"apiBaseUrl": "ftp://github.example.com"}}"#,
        should_succeed: false,
        expected_error: Some("github.apiBaseUrl must be an http(s) URL"),
    },
    ConfigTestCase {
        name: "non_http_rewriter_url",
        config_json: r#"{"rewriter": {"baseUrl": "localhost:8080"}}"#,
        should_succeed: false,
        expected_error: Some("rewriter.baseUrl must be an http(s) URL"),
    },
    ConfigTestCase {
        name: "empty_translator_program",
        config_json: r#"{"translator": {"program": ""}}"#,
        should_succeed: false,
        expected_error: Some("translator.program must not be empty"),
    },
    ConfigTestCase {
        name: "unknown_log_format",
        config_json: r#"{"logging": {"format": "xml"}}"#,
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
];

#[test]
fn test_config_loading() {
    for test_case in CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_json);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_full_config_reaches_pipeline_settings() {
    let config = load_config_from_str(CONFIG_TESTS[1].config_json).unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.translator.args, vec!["i18n", "--frozen"]);

    let settings = PipelineConfig::from_config(&config);
    assert_eq!(settings.work_root.to_string_lossy(), "/var/tmp/globalize");
    assert_eq!(settings.default_languages, vec!["es", "pt-BR", "zh-Hans"]);
    assert_eq!(settings.branch_name, "chore/i18n");
    assert_eq!(settings.bot_username, "acme-bot");
    assert_eq!(settings.fork_poll_attempts, 5);
    assert_eq!(settings.fork_poll_interval, Duration::from_secs(1));
}

#[test]
fn test_defaults_applied() {
    let config = load_config_from_str("{}").unwrap();
    let settings = PipelineConfig::from_config(&config);
    assert_eq!(settings, PipelineConfig::default());
}

#[test]
fn test_load_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("globalize.json");
    std::fs::write(&path, r#"{"defaultLanguages": ["fr"]}"#).unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.default_languages, vec!["fr"]);

    let err = load_config(dir.path().join("missing.json")).unwrap_err();
    assert!(err.to_string().starts_with("Failed to read config file"));
}
