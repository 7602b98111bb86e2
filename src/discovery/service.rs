use gethostname::gethostname;
use sha2::{Digest, Sha256};

/// Default TCP port for the transfer protocol.
pub const DEFAULT_PORT: u16 = 8000;

/// Maximum DNS label length per RFC 1035.
const MAX_DNS_LABEL_LEN: usize = 63;

/// mDNS service type for a shared service id.
///
/// The id is hashed so peers can rendezvous on a common type without
/// broadcasting the id itself: `_ferry-<hash>._tcp.local.`.
pub fn service_type(service_id: &str) -> String {
    format!("_ferry-{}._tcp.local.", hashed_service_id(service_id))
}

/// First 8 bytes of SHA-256 of the service id, hex-encoded (16 chars),
/// short enough to stay inside a DNS label.
pub fn hashed_service_id(service_id: &str) -> String {
    let digest = Sha256::digest(service_id.as_bytes());
    hex::encode(&digest[..8])
}

/// A peer node discovered on the LAN.
#[derive(Debug, Clone)]
pub struct DiscoveredPeer {
    /// Advertised node name (e.g. "node1")
    pub name: String,
    /// IP address as a string
    pub host: String,
    /// TCP port for the transfer protocol
    pub port: u16,
    /// Peer's ferry version from the TXT record, if present
    pub version: Option<String>,
}

/// This node's identity for mDNS registration.
#[derive(Debug, Clone)]
pub struct NodeService {
    /// The node name advertised via mDNS
    pub node_name: String,
    /// The port the TCP listener is bound to
    pub port: u16,
}

impl NodeService {
    /// Create a new NodeService.
    ///
    /// If `node_name` is None, the system hostname is used. The name is
    /// sanitized into a valid DNS label: non-alphanumeric characters become
    /// hyphens and the result is truncated to 63 characters.
    pub fn new(node_name: Option<String>, port: u16) -> Self {
        let raw_name =
            node_name.unwrap_or_else(|| gethostname().to_string_lossy().to_string());

        NodeService {
            node_name: sanitize_node_name(&raw_name),
            port,
        }
    }
}

/// Sanitize a node name for use as a DNS label.
///
/// - Replace non-alphanumeric characters (except hyphen) with hyphens
/// - Collapse consecutive hyphens
/// - Strip leading/trailing hyphens
/// - Truncate to 63 characters
/// - If the result is empty, use "ferry-node"
fn sanitize_node_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(replaced.len());
    let mut prev_hyphen = false;
    for c in replaced.chars() {
        if c == '-' {
            if !prev_hyphen {
                collapsed.push(c);
            }
            prev_hyphen = true;
        } else {
            collapsed.push(c);
            prev_hyphen = false;
        }
    }

    let trimmed = collapsed.trim_matches('-');
    let truncated = if trimmed.len() > MAX_DNS_LABEL_LEN {
        &trimmed[..MAX_DNS_LABEL_LEN]
    } else {
        trimmed
    };
    let final_name = truncated.trim_end_matches('-');

    if final_name.is_empty() {
        "ferry-node".to_string()
    } else {
        final_name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_is_a_valid_mdns_type() {
        let ty = service_type("room 42");
        assert!(ty.starts_with("_ferry-"));
        assert!(ty.ends_with("._tcp.local."));
    }

    #[test]
    fn hashed_id_is_deterministic_and_short() {
        let a = hashed_service_id("shared-secret");
        let b = hashed_service_id("shared-secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_ids_hash_differently() {
        assert_ne!(hashed_service_id("alpha"), hashed_service_id("beta"));
    }

    #[test]
    fn node_service_uses_provided_name() {
        let svc = NodeService::new(Some("node1".to_string()), DEFAULT_PORT);
        assert_eq!(svc.node_name, "node1");
        assert_eq!(svc.port, DEFAULT_PORT);
    }

    #[test]
    fn node_service_falls_back_to_hostname() {
        let svc = NodeService::new(None, DEFAULT_PORT);
        assert!(!svc.node_name.is_empty());
    }

    #[test]
    fn sanitize_replaces_special_chars() {
        assert_eq!(sanitize_node_name("hello world"), "hello-world");
        assert_eq!(sanitize_node_name("my.node.local"), "my-node-local");
    }

    #[test]
    fn sanitize_collapses_and_trims_hyphens() {
        assert_eq!(sanitize_node_name("a---b"), "a-b");
        assert_eq!(sanitize_node_name("-hello-"), "hello");
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = "x".repeat(100);
        assert_eq!(sanitize_node_name(&long).len(), MAX_DNS_LABEL_LEN);
    }

    #[test]
    fn sanitize_empty_name_falls_back() {
        assert_eq!(sanitize_node_name(""), "ferry-node");
        assert_eq!(sanitize_node_name("..."), "ferry-node");
    }
}
