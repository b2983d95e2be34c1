use headers_milter::{
    Action, AuthResults, Engine, EngineHandle, HeaderStore, HeadersConfig, Transaction,
};
use std::io::Write;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_yaml_file() {
    let file = write_config(
        r#"
socket_path: /tmp/headers-milter.sock
main:
  required: [Date, From, Subject]
  date_past_days: 30
reject:
  from_phish: true
phish_targets:
  Costco: costco.com
phish_domains:
  paypal.com: true
milter:
  authserv_id: mx.example.org
"#,
    );

    let config = HeadersConfig::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.socket_path, "/tmp/headers-milter.sock");
    assert_eq!(config.main.required.names(), ["Date", "From", "Subject"]);
    assert_eq!(config.main.date_past_days, 30);
    assert_eq!(config.main.date_future_days, 2);
    assert_eq!(config.phish_targets.get("costco").unwrap(), "costco.com");
    assert_eq!(config.phish_targets.get("paypal").unwrap(), "paypal.com");
    assert_eq!(config.milter.authserv_id.as_deref(), Some("mx.example.org"));
    assert_eq!(config.milter.result_header, "X-Headers-Check");
}

#[test]
fn test_generated_config_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("headers-milter.yaml");
    let path = path.to_str().unwrap();

    HeadersConfig::default().to_file(path).unwrap();
    let loaded = HeadersConfig::from_file(path).unwrap();
    assert_eq!(loaded.main.singular.names().len(), 11);
    assert!(loaded.reject.delivered_to);
    assert!(loaded.phish_targets.is_empty());
}

#[test]
fn test_malformed_config_is_an_error() {
    let file = write_config("main: [not, a, mapping\n");
    assert!(HeadersConfig::from_file(file.path().to_str().unwrap()).is_err());

    let empty_domain = write_config("phish_targets:\n  costco: \"\"\n");
    assert!(HeadersConfig::from_file(empty_domain.path().to_str().unwrap()).is_err());
}

#[test]
fn test_reload_swaps_rules() {
    let handle = EngineHandle::new(Engine::new(HeadersConfig::default()).unwrap());
    let in_flight = handle.snapshot();

    let file = write_config("reject:\n  from_phish: true\nphish_targets:\n  costco: costco.com\n");
    let reloaded = HeadersConfig::from_file(file.path().to_str().unwrap()).unwrap();
    handle.swap(Engine::new(reloaded).unwrap());

    let raw = "From: \"Costco\" <spam@spammer.com>\r\nDate: Mon, 1 Jan 2024 00:00:00 +0000\r\n\r\n";
    let mut old = Transaction::new(HeaderStore::parse(raw));
    let mut new = Transaction::new(HeaderStore::parse(raw));

    assert_eq!(in_flight.evaluate(&mut old, &AuthResults::new()), Action::Continue);
    assert!(handle.snapshot().evaluate(&mut new, &AuthResults::new()).is_reject());
}
