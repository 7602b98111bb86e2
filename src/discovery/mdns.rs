use std::collections::HashMap;
use std::time::{Duration, Instant};

use gethostname::gethostname;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};

use crate::discovery::service::{service_type, DiscoveredPeer, NodeService};
use crate::error::FerryError;

/// Announce this node on the local network under the hashed service id.
///
/// The daemon runs in a background thread managed by `mdns-sd`; keep the
/// returned handle alive to maintain the registration, drop it to
/// unregister.
///
/// TXT properties advertised:
/// - `version`: the ferry package version
/// - `node`: the advertised node name
pub fn announce(service: &NodeService, service_id: &str) -> Result<ServiceDaemon, FerryError> {
    let mdns = ServiceDaemon::new()
        .map_err(|e| FerryError::Discovery(format!("failed to create mDNS daemon: {e}")))?;

    let hostname = gethostname().to_string_lossy().to_string();
    let host_label = format!("{}.local.", hostname);
    let ty = service_type(service_id);

    let properties: Vec<(&str, &str)> = vec![
        ("version", env!("CARGO_PKG_VERSION")),
        ("node", &service.node_name),
    ];

    let service_info = ServiceInfo::new(
        &ty,
        &service.node_name,
        &host_label,
        "", // empty string = auto-detect IP addresses
        service.port,
        properties.as_slice(),
    )
    .map_err(|e| FerryError::Discovery(format!("invalid service info: {e}")))?
    .enable_addr_auto();

    mdns.register(service_info)
        .map_err(|e| FerryError::Discovery(format!("failed to register service: {e}")))?;

    tracing::info!(service = %ty, node = %service.node_name, port = service.port, "announced on mDNS");
    Ok(mdns)
}

/// Browse for peers announcing the same hashed service id.
///
/// Collects resolved peers for `timeout_secs`, deduplicated by node name
/// (first occurrence wins). Returns an empty vector when nobody answered.
pub fn find_peers(service_id: &str, timeout_secs: u64) -> Result<Vec<DiscoveredPeer>, FerryError> {
    let mdns = ServiceDaemon::new()
        .map_err(|e| FerryError::Discovery(format!("failed to create mDNS daemon: {e}")))?;

    let ty = service_type(service_id);
    let receiver = mdns
        .browse(&ty)
        .map_err(|e| FerryError::Discovery(format!("failed to browse: {e}")))?;

    let mut seen: HashMap<String, DiscoveredPeer> = HashMap::new();
    let deadline = Instant::now() + Duration::from_secs(timeout_secs);

    while Instant::now() < deadline {
        match receiver.recv_timeout(Duration::from_millis(500)) {
            Ok(ServiceEvent::ServiceResolved(info)) => {
                let name = extract_instance_name(info.get_fullname(), &ty);

                // Prefer IPv4, fall back to whatever resolved
                let addresses = info.get_addresses();
                let addr = addresses
                    .iter()
                    .find(|a| a.is_ipv4())
                    .or_else(|| addresses.iter().next());

                if let Some(scoped_ip) = addr {
                    let version = info
                        .get_properties()
                        .get("version")
                        .map(|p| p.val_str().to_string());

                    seen.entry(name.clone()).or_insert_with(|| {
                        tracing::debug!(peer = %name, "resolved peer");
                        DiscoveredPeer {
                            name,
                            host: scoped_ip.to_string(),
                            port: info.get_port(),
                            version,
                        }
                    });
                }
            }
            Ok(_) => {
                // SearchStarted, ServiceFound (unresolved), ServiceRemoved...
            }
            Err(_) => {
                // recv_timeout expired, keep polling until the deadline
            }
        }
    }

    mdns.shutdown().ok();
    Ok(seen.into_values().collect())
}

/// Strip the service type suffix from an mDNS fullname
/// (`instance._ferry-<hash>._tcp.local.`) to get the instance name.
fn extract_instance_name(fullname: &str, ty: &str) -> String {
    if let Some(idx) = fullname.find(ty) {
        fullname[..idx].trim_end_matches('.').to_string()
    } else {
        fullname.to_string()
    }
}
