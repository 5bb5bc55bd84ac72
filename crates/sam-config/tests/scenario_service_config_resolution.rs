//! Scenario: from layered YAML to a typed service config and its secrets.
//!
//! # Invariants under test
//!
//! 1. An overlay can switch the store backend and add tokens.
//! 2. Unknown fields inside a known section are CONFIG_INVALID.
//! 3. A token with a blank account is CONFIG_INVALID.
//! 4. Secret resolution reads the named env vars and reports missing ones
//!    by name.

use sam_config::{
    load_layered_yaml_from_strings, resolve_secrets, ServiceConfig, StoreBackend,
};

const BASE: &str = r#"
server:
  platform_domain: "smarter.sh"
logging:
  filter: "info"
"#;

const PROD: &str = r#"
store:
  backend: "postgres"
  database_url_env: "SAM_SCENARIO_DB_URL"
auth:
  tokens:
    - key_env: "SAM_SCENARIO_ADMIN_KEY"
      account: "acme"
      username: "admin"
      is_staff: true
"#;

#[test]
fn overlay_switches_backend() {
    let loaded = load_layered_yaml_from_strings(&[BASE, PROD]).unwrap();
    let cfg = ServiceConfig::from_json(&loaded.config_json).unwrap();
    assert_eq!(cfg.store.backend, StoreBackend::Postgres);
    assert_eq!(cfg.store.database_url_env, "SAM_SCENARIO_DB_URL");
    assert_eq!(cfg.auth.tokens.len(), 1);
    assert!(cfg.auth.tokens[0].is_staff);
    assert_eq!(cfg.server.bind_addr, sam_config::DEFAULT_BIND_ADDR);
}

#[test]
fn typos_and_blank_identities_are_invalid() {
    let typo = r#"
server:
  bind_adr: "0.0.0.0:1"
"#;
    let loaded = load_layered_yaml_from_strings(&[typo]).unwrap();
    let err = ServiceConfig::from_json(&loaded.config_json).unwrap_err();
    assert!(err.to_string().starts_with("CONFIG_INVALID"), "{err}");

    let blank = r#"
auth:
  tokens:
    - key_env: "SAM_X"
      account: " "
      username: "admin"
"#;
    let loaded = load_layered_yaml_from_strings(&[blank]).unwrap();
    let err = ServiceConfig::from_json(&loaded.config_json).unwrap_err();
    assert!(err.to_string().contains("auth.tokens[0]"), "{err}");
}

#[test]
fn secrets_resolve_from_named_env_vars() {
    let loaded = load_layered_yaml_from_strings(&[BASE, PROD]).unwrap();
    let cfg = ServiceConfig::from_json(&loaded.config_json).unwrap();

    std::env::remove_var("SAM_SCENARIO_DB_URL");
    std::env::remove_var("SAM_SCENARIO_ADMIN_KEY");
    let err = resolve_secrets(&cfg).unwrap_err();
    assert!(err.to_string().contains("SAM_SCENARIO_DB_URL"), "{err}");

    std::env::set_var("SAM_SCENARIO_DB_URL", "postgres://sam:pw@localhost/sam");
    std::env::set_var("SAM_SCENARIO_ADMIN_KEY", "admin-key-1");
    let secrets = resolve_secrets(&cfg).unwrap();
    assert_eq!(
        secrets.database_url.as_deref(),
        Some("postgres://sam:pw@localhost/sam")
    );
    assert_eq!(secrets.tokens[0].key, "admin-key-1");
    assert_eq!(secrets.tokens[0].username, "admin");
}
