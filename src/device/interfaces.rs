use mac_address::MacAddress;
use tracing::debug;

use crate::device::ResolutionError;

/// Bit in the first octet marking a MAC as locally administered
const LOCALLY_ADMINISTERED: u8 = 0x02;

#[derive(Debug, Clone)]
pub struct NetworkInterface {
    pub name: String,
    pub mac: Option<MacAddress>,
    pub up: bool,
}

impl NetworkInterface {
    /// Hardware address if the interface is up and has a non-zero MAC
    fn usable_mac(&self) -> Option<MacAddress> {
        if !self.up {
            return None;
        }
        self.mac.clone().filter(|mac| mac.bytes() != [0u8; 6])
    }
}

pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>, ResolutionError>;
}

pub fn is_locally_administered(mac: &MacAddress) -> bool {
    mac.bytes()[0] & LOCALLY_ADMINISTERED != 0
}

/// Lowercase colon-separated rendering, e.g. `aa:bb:cc:dd:ee:ff`
pub fn format_mac(mac: &MacAddress) -> String {
    mac.bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Pick the primary MAC address.
///
/// A preferred interface name wins over everything else; otherwise the
/// first up interface with a globally administered address is used.
pub fn select_mac(interfaces: &[NetworkInterface], preferred: &[String]) -> Option<MacAddress> {
    let canonical = interfaces.iter().find_map(|iface| {
        if preferred.iter().any(|name| name == &iface.name) {
            iface.usable_mac()
        } else {
            None
        }
    });

    if let Some(mac) = canonical {
        return Some(mac);
    }

    interfaces
        .iter()
        .filter_map(NetworkInterface::usable_mac)
        .find(|mac| !is_locally_administered(mac))
}

/// Interfaces as reported by the operating system
pub struct SystemInterfaces;

#[cfg(target_os = "linux")]
impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>, ResolutionError> {
        sysfs::list(std::path::Path::new(sysfs::SYS_CLASS_NET))
    }
}

#[cfg(not(target_os = "linux"))]
impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>, ResolutionError> {
        let found: Vec<adapters::Adapter> = netdev::get_interfaces()
            .into_iter()
            .map(|iface| adapters::Adapter {
                index: iface.index,
                name: adapter_name(&iface),
                mac: iface.mac_addr.map(|mac| mac.octets()),
                up: iface.is_up(),
            })
            .collect();

        if found.is_empty() {
            return Err(ResolutionError::InterfaceProbe(
                "no network adapters reported".to_string(),
            ));
        }

        Ok(adapters::into_interfaces(found))
    }
}

// Windows names adapters by GUID; "Ethernet" is the friendly name.
#[cfg(windows)]
fn adapter_name(iface: &netdev::Interface) -> String {
    iface
        .friendly_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| iface.name.clone())
}

#[cfg(all(not(windows), not(target_os = "linux")))]
fn adapter_name(iface: &netdev::Interface) -> String {
    iface.name.clone()
}

#[cfg(any(not(target_os = "linux"), test))]
mod adapters {
    use super::*;

    /// One adapter as listed by the OS, before selection
    pub struct Adapter {
        pub index: u32,
        pub name: String,
        pub mac: Option<[u8; 6]>,
        pub up: bool,
    }

    /// Order adapters by interface index, the order the OS enumerates them in
    pub fn into_interfaces(mut adapters: Vec<Adapter>) -> Vec<NetworkInterface> {
        adapters.sort_by_key(|a| a.index);

        adapters
            .into_iter()
            .map(|a| {
                debug!("Interface {} (index {}): mac={:?} up={}", a.name, a.index, a.mac, a.up);
                NetworkInterface {
                    name: a.name,
                    mac: a.mac.map(MacAddress::new),
                    up: a.up,
                }
            })
            .collect()
    }

}

#[cfg(target_os = "linux")]
mod sysfs {
    use super::*;
    use std::fs;
    use std::path::Path;

    pub const SYS_CLASS_NET: &str = "/sys/class/net";

    const IFF_UP: u32 = 0x1;

    /// Read every interface under `root`, ordered by interface index
    pub fn list(root: &Path) -> Result<Vec<NetworkInterface>, ResolutionError> {
        let entries = fs::read_dir(root)
            .map_err(|e| ResolutionError::InterfaceProbe(format!("{}: {}", root.display(), e)))?;

        let mut indexed = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let dir = entry.path();

            let mac = fs::read_to_string(dir.join("address"))
                .ok()
                .and_then(|addr| addr.trim().parse::<MacAddress>().ok());

            let up = fs::read_to_string(dir.join("flags"))
                .ok()
                .and_then(|flags| parse_hex(&flags))
                .map(|flags| flags & IFF_UP != 0)
                .unwrap_or(false);

            let index = fs::read_to_string(dir.join("ifindex"))
                .ok()
                .and_then(|idx| idx.trim().parse::<u32>().ok())
                .unwrap_or(u32::MAX);

            debug!("Interface {} (index {}): mac={:?} up={}", name, index, mac, up);

            indexed.push((index, NetworkInterface { name, mac, up }));
        }

        indexed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));

        Ok(indexed.into_iter().map(|(_, iface)| iface).collect())
    }

    fn parse_hex(value: &str) -> Option<u32> {
        let value = value.trim();
        let digits = value.strip_prefix("0x").unwrap_or(value);
        u32::from_str_radix(digits, 16).ok()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, mac: &str, up: bool) -> NetworkInterface {
        NetworkInterface {
            name: name.to_string(),
            mac: Some(mac.parse().unwrap()),
            up,
        }
    }

    fn linux_names() -> Vec<String> {
        vec!["eth0".to_string(), "enp0s3".to_string()]
    }

    #[test]
    fn test_single_canonical_interface() {
        let ifaces = vec![iface("eth0", "aa:bb:cc:dd:ee:ff", true)];
        let mac = select_mac(&ifaces, &linux_names()).unwrap();
        assert_eq!(format_mac(&mac), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_canonical_name_beats_global_fallback() {
        // eth0 is locally administered, wlan0 is burned in and listed first
        let ifaces = vec![
            iface("wlan0", "00:11:22:33:44:55", true),
            iface("eth0", "02:aa:bb:cc:dd:ee", true),
        ];
        let mac = select_mac(&ifaces, &linux_names()).unwrap();
        assert_eq!(format_mac(&mac), "02:aa:bb:cc:dd:ee");
    }

    #[test]
    fn test_fallback_skips_locally_administered() {
        let ifaces = vec![
            iface("docker0", "02:42:ac:11:00:02", true),
            iface("wlp2s0", "3c:22:fb:00:00:01", true),
        ];
        let mac = select_mac(&ifaces, &linux_names()).unwrap();
        assert_eq!(format_mac(&mac), "3c:22:fb:00:00:01");
    }

    #[test]
    fn test_down_interfaces_are_ignored() {
        let ifaces = vec![
            iface("eth0", "aa:bb:cc:dd:ee:ff", false),
            iface("wlan0", "00:11:22:33:44:55", true),
        ];
        let mac = select_mac(&ifaces, &linux_names()).unwrap();
        assert_eq!(format_mac(&mac), "00:11:22:33:44:55");
    }

    #[test]
    fn test_nothing_usable() {
        let ifaces = vec![
            iface("lo", "00:00:00:00:00:00", true),
            iface("eth0", "aa:bb:cc:dd:ee:ff", false),
            NetworkInterface {
                name: "tun0".to_string(),
                mac: None,
                up: true,
            },
        ];
        assert!(select_mac(&ifaces, &linux_names()).is_none());
        assert!(select_mac(&[], &linux_names()).is_none());
    }

    #[test]
    fn test_only_locally_administered_without_canonical() {
        let ifaces = vec![iface("veth1", "02:42:ac:11:00:02", true)];
        assert!(select_mac(&ifaces, &linux_names()).is_none());
    }

    #[test]
    fn test_locally_administered_bit() {
        assert!(is_locally_administered(&"02:00:00:00:00:01".parse().unwrap()));
        assert!(is_locally_administered(&"fe:00:00:00:00:01".parse().unwrap()));
        assert!(!is_locally_administered(&"fc:00:00:00:00:01".parse().unwrap()));
    }
}
