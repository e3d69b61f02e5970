//! Environment-driven configuration. A single env var governs the wire
//! protocol (`SDMOTION_SERVER_PORT`); the rest tune which physical HID
//! interface the `device` feature opens and don't affect any documented
//! network behavior.

/// Default UDP port clients register against.
pub const DEFAULT_PORT: u16 = 27760;

/// Server configuration resolved once at startup.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    pub port: u16,
    #[cfg(feature = "device")]
    pub hid: HidConfig,
}

#[cfg(feature = "device")]
#[derive(Debug, Clone, Copy)]
pub struct HidConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface_number: i32,
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    ///
    /// An unparseable `SDMOTION_SERVER_PORT` resolves to port `0` (treated
    /// as "bind to any OS-assigned port") rather than falling back to the
    /// default — this mirrors the original service verbatim and is not a
    /// bug to be fixed.
    pub fn from_env() -> Self {
        let port = std::env::var("SDMOTION_SERVER_PORT")
            .ok()
            .map(|raw| raw.parse().unwrap_or(0))
            .unwrap_or(DEFAULT_PORT);

        Self {
            port,
            #[cfg(feature = "device")]
            hid: HidConfig::from_env(),
        }
    }
}

#[cfg(feature = "device")]
impl HidConfig {
    fn from_env() -> Self {
        Self {
            vendor_id: parse_hex_env("SDMOTION_HID_VID", sdmotion_hid::device::STEAM_DECK_VID),
            product_id: parse_hex_env("SDMOTION_HID_PID", sdmotion_hid::device::STEAM_DECK_PID),
            interface_number: std::env::var("SDMOTION_HID_INTERFACE")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(sdmotion_hid::device::STEAM_DECK_INTERFACE),
        }
    }
}

#[cfg(feature = "device")]
fn parse_hex_env(name: &str, default: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|raw| {
            let trimmed = raw.trim();
            let digits = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"));
            match digits {
                Some(hex) => u16::from_str_radix(hex, 16).ok(),
                None => trimmed.parse().ok(),
            }
        })
        .unwrap_or(default)
}
