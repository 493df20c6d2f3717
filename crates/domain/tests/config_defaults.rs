use station_domain::config::Config;

#[test]
fn default_nats_url_is_loopback() {
    let config = Config::default();
    assert_eq!(config.nats.url, "nats://127.0.0.1:4222");
}

#[test]
fn explicit_tls_url_parses() {
    let toml_str = r#"
[nats]
url = "tls://broker.internal:4222"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.nats.url, "tls://broker.internal:4222");
}

#[test]
fn partial_override_keeps_other_defaults() {
    let toml_str = r#"
[store]
state_dir = "/var/lib/stationd"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.store.state_dir, "/var/lib/stationd");
    assert_eq!(config.store.default_retention_value, 604_800);
    assert_eq!(config.dls.poison, true);
}
