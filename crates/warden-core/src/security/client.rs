//! Best-effort client metadata derived from request headers.
//!
//! Nothing here fails: missing or unparseable input degrades to the
//! [`UNKNOWN`] marker.

use std::fmt;
use std::net::IpAddr;

use axum::http::HeaderMap;
use serde::Serialize;

/// Marker used for every value that could not be determined.
pub const UNKNOWN: &str = "unknown";

/// Client IP by header priority: `cf-connecting-ip`, the first
/// `x-forwarded-for` hop (only if it is an IP literal), `x-real-ip`.
pub fn extract_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = header_str(headers, "cf-connecting-ip") {
        return ip.to_string();
    }

    if let Some(first) = header_str(headers, "x-forwarded-for")
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
    {
        if first.parse::<IpAddr>().is_ok() {
            return first.to_string();
        }
    }

    if let Some(ip) = header_str(headers, "x-real-ip") {
        return ip.to_string();
    }

    UNKNOWN.to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    Edge,
    Opera,
    Firefox,
    Chrome,
    Safari,
    Unknown,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Edge => "Edge",
            Browser::Opera => "Opera",
            Browser::Firefox => "Firefox",
            Browser::Chrome => "Chrome",
            Browser::Safari => "Safari",
            Browser::Unknown => UNKNOWN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingSystem {
    Windows,
    Ios,
    Android,
    MacOs,
    ChromeOs,
    Linux,
    Unknown,
}

impl OperatingSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingSystem::Windows => "Windows",
            OperatingSystem::Ios => "iOS",
            OperatingSystem::Android => "Android",
            OperatingSystem::MacOs => "macOS",
            OperatingSystem::ChromeOs => "ChromeOS",
            OperatingSystem::Linux => "Linux",
            OperatingSystem::Unknown => UNKNOWN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
    Unknown,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
            DeviceClass::Unknown => UNKNOWN,
        }
    }
}

/// Coarse device descriptor parsed from a user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub browser: Browser,
    pub os: OperatingSystem,
    pub device_type: DeviceClass,
}

impl DeviceInfo {
    pub const UNKNOWN: DeviceInfo = DeviceInfo {
        browser: Browser::Unknown,
        os: OperatingSystem::Unknown,
        device_type: DeviceClass::Unknown,
    };
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} ({})",
            self.browser.as_str(),
            self.os.as_str(),
            self.device_type.as_str()
        )
    }
}

/// Heuristic user-agent parsing. Order matters: Edge and Opera also announce
/// Chrome, Chrome also announces Safari, iPads announce Mac OS X.
pub fn parse_device(user_agent: Option<&str>) -> DeviceInfo {
    let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
        return DeviceInfo::UNKNOWN;
    };
    let ua = ua.to_ascii_lowercase();
    let has = |needle: &str| ua.contains(needle);

    let browser = if has("edg/") || has("edge/") || has("edga/") || has("edgios/") {
        Browser::Edge
    } else if has("opr/") || has("opera") {
        Browser::Opera
    } else if has("firefox/") || has("fxios/") {
        Browser::Firefox
    } else if has("chrome/") || has("crios/") || has("chromium/") {
        Browser::Chrome
    } else if has("safari/") {
        Browser::Safari
    } else {
        Browser::Unknown
    };

    let os = if has("windows") {
        OperatingSystem::Windows
    } else if has("iphone") || has("ipad") || has("ipod") {
        OperatingSystem::Ios
    } else if has("android") {
        OperatingSystem::Android
    } else if has("mac os x") || has("macintosh") {
        OperatingSystem::MacOs
    } else if has("cros ") {
        OperatingSystem::ChromeOs
    } else if has("linux") {
        OperatingSystem::Linux
    } else {
        OperatingSystem::Unknown
    };

    let android_tablet = os == OperatingSystem::Android && !has("mobile");
    let device_type = if has("ipad") || has("tablet") || android_tablet {
        DeviceClass::Tablet
    } else if has("mobi") || has("iphone") || has("ipod") {
        DeviceClass::Mobile
    } else {
        match os {
            OperatingSystem::Windows
            | OperatingSystem::MacOs
            | OperatingSystem::ChromeOs
            | OperatingSystem::Linux => DeviceClass::Desktop,
            _ => DeviceClass::Unknown,
        }
    };

    DeviceInfo {
        browser,
        os,
        device_type,
    }
}

/// Everything the engine records about the caller of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub device: DeviceInfo,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_agent = header_str(headers, "user-agent").map(str::to_string);
        let device = parse_device(user_agent.as_deref());
        ClientInfo {
            ip_address: extract_ip(headers),
            user_agent,
            device,
        }
    }

    /// Client info for a known IP and user agent (jobs, tests, replays).
    pub fn new(ip_address: impl Into<String>, user_agent: Option<&str>) -> Self {
        ClientInfo {
            ip_address: ip_address.into(),
            user_agent: user_agent.map(str::to_string),
            device: parse_device(user_agent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipad_is_ios_tablet_not_macos() {
        let ua = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
                  (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
        let device = parse_device(Some(ua));
        assert_eq!(device.os, OperatingSystem::Ios);
        assert_eq!(device.device_type, DeviceClass::Tablet);
        assert_eq!(device.browser, Browser::Safari);
    }

    #[test]
    fn test_android_without_mobile_token_is_tablet() {
        let ua = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        let device = parse_device(Some(ua));
        assert_eq!(device.os, OperatingSystem::Android);
        assert_eq!(device.device_type, DeviceClass::Tablet);
    }
}
