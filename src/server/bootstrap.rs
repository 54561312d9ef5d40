// file: src/server/bootstrap.rs
// version: 1.0.0
// guid: e41c8a07-6d3b-4f92-b5e8-0a7f2c9d1b63

//! Slave bootstrap script served by `GET /download`

/// File name offered to the downloading client
pub const BOOTSTRAP_FILE_NAME: &str = "kangaroo_slave_setup.sh";

const TEMPLATE: &str = include_str!("../../templates/kangaroo_slave_setup.sh");

/// Fill the three substitution points; the rest of the script is opaque
pub fn render_bootstrap(master_ip: &str, master_port: u16, token: &str) -> String {
    TEMPLATE
        .replace("{{MASTER_IP}}", master_ip)
        .replace("{{MASTER_PORT}}", &master_port.to_string())
        .replace("{{TOKEN}}", token)
}

/// One-liner an operator runs on a new slave
pub fn bootstrap_command(master_addr: &str, master_port: u16, token: &str) -> String {
    format!(
        "curl -fsSL \"http://{}:{}/download?token={}\" -o {} && sudo bash {}",
        master_addr, master_port, token, BOOTSTRAP_FILE_NAME, BOOTSTRAP_FILE_NAME
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_every_placeholder() {
        let script = render_bootstrap("10.1.2.3", 5000, "tok");

        assert!(script.starts_with("#!/usr/bin/env bash"));
        assert!(script.contains("MASTER_IP=\"10.1.2.3\""));
        assert!(script.contains("MASTER_PORT=\"5000\""));
        assert!(script.contains("TOKEN=\"tok\""));
        assert!(!script.contains("{{"));
    }

    #[test]
    fn test_bootstrap_command() {
        assert_eq!(
            bootstrap_command("192.168.0.2", 5000, "abc"),
            "curl -fsSL \"http://192.168.0.2:5000/download?token=abc\" -o kangaroo_slave_setup.sh && sudo bash kangaroo_slave_setup.sh"
        );
    }
}
