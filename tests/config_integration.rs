//! Configuration loading and its effect on a registry.

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use rafters_tokens::color::mock::MockColorMath;
use rafters_tokens::color::ColorMath;
use rafters_tokens::core::config::{ConfigError, EngineConfig};
use rafters_tokens::core::types::{Category, ColorValue, TokenName, TokenValue};
use rafters_tokens::registry::{LoadError, SetError, TokenDefinition, TokenRegistry, TokenUpdate};
use rafters_tokens::rules::{ContrastStandard, RuleParseError};

fn name(s: &str) -> TokenName {
    TokenName::new(s).unwrap()
}

fn contrast_pair(standard: &str) -> Vec<TokenDefinition> {
    vec![
        TokenDefinition::literal(name("bg"), Category::Color, ColorValue::oklch(1.0, 0.0, 0.0)),
        TokenDefinition::computed(
            name("text"),
            Category::Color,
            format!("contrast(bg, \"{standard}\")"),
        ),
    ]
}

/// The only test in this binary that reads files through `EngineConfig::load`,
/// since it points `RAFTERS_CONFIG` at a temporary global file.
#[test]
fn global_and_project_files_merge() {
    let global_dir = TempDir::new().unwrap();
    let global = global_dir.path().join("config.toml");
    fs::write(
        &global,
        r#"
        [contrast]
        aa = 5.0
        aaa = 8.0
        "#,
    )
    .unwrap();

    let project = TempDir::new().unwrap();
    let project_file = EngineConfig::project_config_path(project.path());
    fs::create_dir_all(project_file.parent().unwrap()).unwrap();
    fs::write(
        &project_file,
        r#"
        [contrast]
        aaa = 9.0

        [limits]
        max_rule_length = 32
        "#,
    )
    .unwrap();

    std::env::set_var("RAFTERS_CONFIG", &global);
    let result = EngineConfig::load(Some(project.path()));
    std::env::remove_var("RAFTERS_CONFIG");
    let config = result.unwrap().config;

    assert_eq!(config.min_ratio(ContrastStandard::Aa), 5.0);
    assert_eq!(config.min_ratio(ContrastStandard::Aaa), 9.0);
    assert_eq!(config.min_ratio(ContrastStandard::AaLarge), 3.0);
    assert_eq!(config.max_rule_length(), 32);
    assert_eq!(config.global_config_loaded_from(), Some(global.as_path()));
    assert_eq!(
        config.project_config_loaded_from(),
        Some(project_file.as_path())
    );

    let math = MockColorMath::new();
    let mut registry = TokenRegistry::new(Arc::new(math.clone())).with_config(config);
    registry.load(contrast_pair("AAA")).unwrap();

    let ratio = math
        .contrast_ratio(
            registry.value(&name("text")).unwrap(),
            registry.value(&name("bg")).unwrap(),
        )
        .unwrap();
    assert!(ratio >= 9.0, "ratio {ratio}");
}

#[test]
fn configured_ratio_changes_the_result() {
    let strict = EngineConfig::from_toml_str("[contrast]\naa = 6.0\naaa = 7.0").unwrap();
    let math = MockColorMath::new();

    let mut default_registry = TokenRegistry::new(Arc::new(math.clone()));
    default_registry.load(contrast_pair("AA")).unwrap();
    let mut strict_registry = TokenRegistry::new(Arc::new(math.clone())).with_config(strict);
    strict_registry.load(contrast_pair("AA")).unwrap();

    let bg = TokenValue::Color(ColorValue::oklch(1.0, 0.0, 0.0));
    let ratio_of = |registry: &TokenRegistry| {
        math.contrast_ratio(registry.value(&name("text")).unwrap(), &bg)
            .unwrap()
    };
    assert!(ratio_of(&default_registry) >= 4.5);
    assert!(ratio_of(&default_registry) < 6.0);
    assert!(ratio_of(&strict_registry) >= 6.0);
    assert_ne!(
        default_registry.fingerprint(),
        strict_registry.fingerprint()
    );
}

#[test]
fn token_limit_rejects_batch() {
    let config = EngineConfig::from_toml_str("[limits]\nmax_tokens = 2").unwrap();
    let mut registry = TokenRegistry::new(Arc::new(MockColorMath::new())).with_config(config);

    let err = registry
        .load(
            ["a", "b", "c"]
                .into_iter()
                .map(|n| TokenDefinition::literal(name(n), Category::Spacing, 1.0))
                .collect(),
        )
        .unwrap_err();
    assert!(matches!(err, LoadError::TooManyTokens { count: 3, max: 2 }));
    assert!(registry.is_empty());
}

#[test]
fn rule_length_limit_applies_to_updates() {
    let config = EngineConfig::from_toml_str("[limits]\nmax_rule_length = 16").unwrap();
    let mut registry = TokenRegistry::new(Arc::new(MockColorMath::new())).with_config(config);
    registry
        .load(vec![
            TokenDefinition::literal(name("a"), Category::Spacing, 1.0),
            TokenDefinition::computed(name("b"), Category::Spacing, "calc(a * 2)"),
        ])
        .unwrap();

    let err = registry
        .set(
            &name("b"),
            TokenUpdate::Rule("calc(a * 2 + a * 3 + a * 4)".into()),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SetError::Parse {
            source: RuleParseError::TooLong { max: 16, .. },
            ..
        }
    ));
    assert_eq!(registry.value(&name("b")), Some(&TokenValue::Number(2.0)));
}

#[test]
fn invalid_values_rejected() {
    assert!(matches!(
        EngineConfig::from_toml_str("[contrast]\naa = 30.0"),
        Err(ConfigError::InvalidValue(_))
    ));
    assert!(matches!(
        EngineConfig::from_toml_str("[contrast]\naa_large = 5.0"),
        Err(ConfigError::InvalidValue(_))
    ));
    assert!(matches!(
        EngineConfig::from_toml_str("[contrst]\naa = 4.5"),
        Err(ConfigError::ParseError { .. })
    ));
}
