pub mod audit;
pub mod client;
pub mod detector;
pub mod rate_limit;

pub use audit::{NewSecurityEvent, SecurityAction, SecurityLog, SecurityLogFilter};
pub use client::{ClientInfo, DeviceInfo, UNKNOWN, extract_ip, parse_device};
pub use detector::{SuspiciousActivityDetector, Verdict};
pub use rate_limit::{RateLimitDecision, RateLimitStore};
