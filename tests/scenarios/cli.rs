//! The flowtrace binary end to end

use std::path::Path;
use std::process::{Command, Output};

const NETWORK: &str = r#"
[log]
level = "warn"

[nodes.r1.interfaces.eth0]
addresses = ["10.0.12.1/24"]

[nodes.r1.interfaces.eth1]
addresses = ["192.168.1.1/24"]
incoming_filter = "LAN_IN"

[[nodes.r1.acls.LAN_IN]]
action = "deny"
protocol = "udp"

[[nodes.r1.acls.LAN_IN]]
action = "permit"

[[nodes.r1.routes]]
prefix = "0.0.0.0/0"
next_hop = "10.0.12.2"

[nodes.r2.interfaces.eth0]
addresses = ["10.0.12.2/24"]

[[edges]]
from = "r1:eth0"
to = "r2:eth0"

[forwarding]
arp_replies = { "r1:eth1" = ["0.0.0.0/0"] }
"#;

const FLOWS: &str = r#"
[[flows]]
ingress_node = "r1"
ingress_interface = "eth1"
src_ip = "192.168.1.10"
dst_ip = "10.0.12.2"
protocol = "tcp"
dst_port = 443

[[flows]]
ingress_node = "r1"
ingress_interface = "eth1"
src_ip = "192.168.1.10"
dst_ip = "10.0.12.2"
protocol = "udp"
dst_port = 53
"#;

fn flowtrace(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_flowtrace"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run flowtrace")
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write fixture");
    path.to_string_lossy().into_owned()
}

#[test]
fn test_trace_json() {
    let dir = tempfile::tempdir().unwrap();
    let network = write(dir.path(), "network.toml", NETWORK);
    let flows = write(dir.path(), "flows.toml", FLOWS);

    let output = flowtrace(&["trace", "--network", &network, "--flows", &flows, "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 2);

    // flows are sorted, tcp (6) before udp (17)
    let tcp = &entries[0]["traces"][0];
    assert_eq!(tcp["disposition"], "ACCEPTED");
    assert_eq!(tcp["hops"][0]["node"], "traceroute_dummy_node");
    assert_eq!(tcp["hops"][2]["node"], "r2");

    let udp = &entries[1]["traces"][0];
    assert_eq!(udp["disposition"], "DENIED_IN");
    assert_eq!(udp["hops"][1]["steps"][0]["type"], "EnterSourceInterface");
    assert_eq!(udp["hops"][1]["steps"][0]["detail"]["input_filter"], "LAN_IN");
    assert_eq!(udp["hops"][1]["steps"][0]["detail"]["input_filter_line"], 0);
}

#[test]
fn test_trace_ignore_acls_text() {
    let dir = tempfile::tempdir().unwrap();
    let network = write(dir.path(), "network.toml", NETWORK);
    let flows = write(dir.path(), "flows.toml", FLOWS);

    let output = flowtrace(&["trace", "--network", &network, "--flows", &flows, "--ignore-acls"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("Flow: ").count(), 2);
    assert_eq!(stdout.matches("accepted").count(), 2);
    assert!(!stdout.contains("denied_in"));
}

#[test]
fn test_validate() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "good.toml", NETWORK);
    let output = flowtrace(&["validate", "--network", &good]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Network is valid"));

    let bad = write(
        dir.path(),
        "bad.toml",
        "[nodes.r1.interfaces.eth0]\noutgoing_filter = \"MISSING\"\n",
    );
    let output = flowtrace(&["validate", "--network", &bad]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("[ERROR]"));
}

#[test]
fn test_trace_rejects_unknown_ingress() {
    let dir = tempfile::tempdir().unwrap();
    let network = write(dir.path(), "network.toml", NETWORK);
    let flows = write(
        dir.path(),
        "flows.toml",
        "[[flows]]\ningress_node = \"r9\"\nsrc_ip = \"1.1.1.1\"\ndst_ip = \"2.2.2.2\"\n",
    );

    let output = flowtrace(&["trace", "--network", &network, "--flows", &flows]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("r9"));
}
