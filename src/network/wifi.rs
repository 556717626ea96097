//! Wi-Fi station abstraction.
//!
//! The MQTT session only needs three things from a radio driver: bring the
//! station interface up, list nearby access points, and start associating
//! with one of them. Association completes in the background; the session
//! gives the driver a settle delay before it opens a socket.

use heapless::Vec;

/// Maximum length of an SSID in bytes (IEEE 802.11).
pub const MAX_SSID_LEN: usize = 32;

/// Maximum number of scan results kept from a single scan.
pub const MAX_ACCESS_POINTS: usize = 16;

/// An access point seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    /// The raw SSID bytes as broadcast by the access point.
    pub ssid: Vec<u8, MAX_SSID_LEN>,
    /// Received signal strength in dBm.
    pub rssi: i8,
}

impl AccessPoint {
    /// Build an access point entry from an SSID string.
    ///
    /// Returns `None` if the SSID is longer than [`MAX_SSID_LEN`].
    pub fn new(ssid: &str, rssi: i8) -> Option<Self> {
        Some(Self {
            ssid: Vec::from_slice(ssid.as_bytes()).ok()?,
            rssi,
        })
    }

    /// Whether this access point broadcasts exactly `ssid`.
    pub fn has_ssid(&self, ssid: &str) -> bool {
        self.ssid.as_slice() == ssid.as_bytes()
    }
}

/// SSID and passphrase for one network the device may join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiCredentials<'a> {
    /// Network name.
    pub ssid: &'a str,
    /// WPA passphrase, empty for open networks.
    pub password: &'a str,
}

/// A Wi-Fi interface in station (client) mode.
pub trait Station {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Bring the station interface up and announce `hostname` over DHCP.
    fn activate(&mut self, hostname: &str) -> Result<(), Self::Error>;

    /// Scan for access points in range.
    fn scan(&mut self) -> Result<Vec<AccessPoint, MAX_ACCESS_POINTS>, Self::Error>;

    /// Start associating with the network `ssid`.
    ///
    /// Returns once the request has been handed to the driver; the link may
    /// come up later.
    fn associate(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;
}

/// Pick the first configured network that appears in `access_points`.
///
/// Credentials are tried in the order given, so the caller's preference wins
/// over signal strength.
pub fn select_network<'c, 'a>(
    credentials: &'c [WifiCredentials<'a>],
    access_points: &[AccessPoint],
) -> Option<&'c WifiCredentials<'a>> {
    credentials
        .iter()
        .find(|credential| access_points.iter().any(|ap| ap.has_ssid(credential.ssid)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_network_follows_credential_order() {
        let aps = [
            AccessPoint::new("guest", -40).unwrap(),
            AccessPoint::new("home", -80).unwrap(),
        ];
        let credentials = [
            WifiCredentials { ssid: "office", password: "a" },
            WifiCredentials { ssid: "home", password: "b" },
            WifiCredentials { ssid: "guest", password: "c" },
        ];

        let chosen = select_network(&credentials, &aps).unwrap();
        assert_eq!(chosen.ssid, "home");
    }

    #[test]
    fn select_network_without_match() {
        let aps = [AccessPoint::new("neighbour", -60).unwrap()];
        let credentials = [WifiCredentials { ssid: "home", password: "b" }];
        assert!(select_network(&credentials, &aps).is_none());
    }

    #[test]
    fn ssid_comparison_is_exact() {
        let ap = AccessPoint::new("home", -50).unwrap();
        assert!(ap.has_ssid("home"));
        assert!(!ap.has_ssid("Home"));
        assert!(!ap.has_ssid("home2"));
    }
}
