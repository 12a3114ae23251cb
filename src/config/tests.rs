use super::Config;
use std::path::Path;

#[test]
fn defaults_when_file_missing() {
    let cfg = Config::load(Path::new("/nonexistent/riot-ratelimit.toml")).unwrap();
    assert_eq!(cfg.pool_size, 10);
    assert!(!cfg.redis_url.is_empty());
}

#[test]
fn loads_toml_file() {
    let toml = r#"
        redis_url = "redis://cache:6379"
        pool_size = 32
        max_overflow = 8
        max_cooldown_ttl = 600
    "#;
    let tmp = std::env::temp_dir().join("riot_ratelimit_test_config.toml");
    std::fs::write(&tmp, toml).unwrap();
    let cfg = Config::load(&tmp).unwrap();
    assert_eq!(cfg.redis_url, "redis://cache:6379");
    assert_eq!(cfg.pool_size, 32);
    assert_eq!(cfg.max_overflow, 8);
    assert_eq!(cfg.max_cooldown_ttl, 600);
    std::fs::remove_file(&tmp).ok();
}

#[test]
fn validate_rejects_zero_pool_size() {
    let cfg = Config {
        pool_size: 0,
        ..Config::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn validate_rejects_zero_max_cooldown_ttl() {
    let cfg = Config {
        max_cooldown_ttl: 0,
        ..Config::default()
    };
    assert!(cfg.validate().is_err());
}
