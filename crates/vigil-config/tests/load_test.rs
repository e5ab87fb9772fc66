#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use vigil_config::{load_config_from, profile_to_session_config};

const SAMPLE: &str = r#"
default_profile = "lab"

[defaults]
output = "yaml"
timeout = 12
heartbeat = 0

[profiles.lab]
gateway = "https://gw.lab.example.net"
node = "node-c"
token = "lab-token"

[profiles.prod]
gateway = "https://gw.example.net"
insecure = false
"#;

#[test]
fn toml_profiles_layer_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE).unwrap();

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.profile_name(None), "lab");
    assert_eq!(config.defaults.output, "yaml");
    assert!(!config.defaults.insecure);
    assert_eq!(config.profiles.len(), 2);

    let lab = config.profile("lab").unwrap();
    let session = profile_to_session_config(lab, "lab", &config.defaults).unwrap();
    assert_eq!(session.node, "node-c");
    assert_eq!(session.http_timeout, Duration::from_secs(12));
    assert_eq!(session.heartbeat, Duration::ZERO);
    assert_eq!(session.endpoint().node_base(), "https://gw.lab.example.net/node-c");
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.default_profile.as_deref(), Some("default"));
    assert_eq!(config.defaults.output, "json");
    assert_eq!(config.defaults.timeout, 30);
    assert!(config.profiles.is_empty());
}

#[test]
fn malformed_toml_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[profiles.lab\ngateway = ").unwrap();
    assert!(load_config_from(&path).is_err());
}
