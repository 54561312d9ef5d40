// file: src/utils/system.rs
// version: 2.0.0
// guid: 4f1b7c2e-8d93-4e06-b5a1-3c9e7d0f2a64

//! System utility functions

use std::net::IpAddr;
use tracing::debug;

/// Tools the add-server workflow shells out to
pub const REQUIRED_COMMANDS: [&str; 4] = ["ssh", "ssh-keygen", "ssh-copy-id", "sshpass"];

/// System utility functions
pub struct SystemUtils;

impl SystemUtils {
    /// Check if a command exists in PATH
    pub fn command_exists(command: &str) -> bool {
        which::which(command).is_ok()
    }

    /// Check if running with an effective uid of 0
    pub fn is_root() -> bool {
        unsafe { libc::geteuid() == 0 }
    }

    /// Required external tools missing from PATH
    pub fn missing_prerequisites() -> Vec<String> {
        REQUIRED_COMMANDS
            .iter()
            .filter(|cmd| !Self::command_exists(cmd))
            .map(|cmd| cmd.to_string())
            .collect()
    }

    /// Resolve a host name through the system resolver, preferring IPv4
    pub async fn resolve_address(name: &str) -> Option<String> {
        match tokio::net::lookup_host((name, 0)).await {
            Ok(addrs) => pick_address(addrs.map(|a| a.ip())),
            Err(e) => {
                debug!("Could not resolve {}: {}", name, e);
                None
            }
        }
    }

    /// Source address of the default route. No packet is sent.
    pub fn primary_ip() -> Option<String> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        let ip = socket.local_addr().ok()?.ip();
        (!ip.is_unspecified()).then(|| ip.to_string())
    }

    /// Local host name, falling back to `localhost`
    pub fn hostname() -> String {
        let mut buf = [0u8; 256];
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
        if rc != 0 {
            return "localhost".to_string();
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let name = String::from_utf8_lossy(&buf[..end]).trim().to_string();
        if name.is_empty() {
            "localhost".to_string()
        } else {
            name
        }
    }
}

fn pick_address(addrs: impl IntoIterator<Item = IpAddr>) -> Option<String> {
    let addrs: Vec<IpAddr> = addrs.into_iter().collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .map(|a| a.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists() {
        assert!(SystemUtils::command_exists("sh"));
        assert!(!SystemUtils::command_exists("nonexistent_command_kangaroo_12345"));
    }

    #[test]
    fn test_pick_address_prefers_ipv4() {
        let v6: IpAddr = "::1".parse().unwrap();
        let v4: IpAddr = "10.0.0.5".parse().unwrap();

        assert_eq!(pick_address([v6, v4]), Some("10.0.0.5".to_string()));
        assert_eq!(pick_address([v6]), Some("::1".to_string()));
        assert_eq!(pick_address(Vec::<IpAddr>::new()), None);
    }

    #[tokio::test]
    async fn test_resolve_literal_address() {
        assert_eq!(
            SystemUtils::resolve_address("192.168.1.20").await,
            Some("192.168.1.20".to_string())
        );
    }

    #[test]
    fn test_hostname_not_empty() {
        assert!(!SystemUtils::hostname().is_empty());
    }
}
