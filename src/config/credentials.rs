//! Credential record and its fixed-width storage layout.
//!
//! This module contains platform-independent types for the persisted
//! credential record and can be tested on the host machine.
//!
//! # Layout
//!
//! All integers are little-endian. Strings are NUL-terminated inside a
//! fixed capacity; unused bytes are zero.
//!
//! ```text
//! offset  size     field
//!      0     4     signature (0xDEADBEEF)
//!      4    32     hostname
//!     36     1     access point count (0..=4)
//!     37  4*144    access points, each ssid[64] then psk[80]
//!    613    64     api key
//!    677    64     broker host
//!    741     2     broker port
//!    743    64     publish topic
//!    807           end of record
//! ```
//!
//! # Example
//!
//! ```
//! use wifi_manager_esp32::config::Credentials;
//!
//! let mut creds = Credentials::new("pico-lab");
//! creds.add_access_point("MyNetwork", "MyPassword").unwrap();
//!
//! let bytes = creds.to_bytes();
//! let restored = Credentials::from_bytes(&bytes).unwrap();
//! assert_eq!(creds, restored);
//! ```

use std::fmt;
use zeroize::Zeroize;

/// Marker stored in the first four bytes of a valid record.
pub const SIGNATURE: u32 = 0xDEAD_BEEF;

/// Hostname capacity in bytes, including the terminating NUL.
pub const HOSTNAME_CAPACITY: usize = 32;

/// SSID capacity in bytes, including the terminating NUL.
pub const SSID_CAPACITY: usize = 64;

/// Pre-shared key capacity in bytes, including the terminating NUL.
pub const PSK_CAPACITY: usize = 80;

/// Maximum number of access points held by one record.
pub const MAX_ACCESS_POINTS: usize = 4;

/// API key capacity in bytes, including the terminating NUL.
pub const API_KEY_CAPACITY: usize = 64;

/// Broker host capacity in bytes, including the terminating NUL.
pub const BROKER_HOST_CAPACITY: usize = 64;

/// Publish topic capacity in bytes, including the terminating NUL.
pub const TOPIC_CAPACITY: usize = 64;

const HOSTNAME_OFFSET: usize = 4;
const COUNT_OFFSET: usize = HOSTNAME_OFFSET + HOSTNAME_CAPACITY;
const ACCESS_POINTS_OFFSET: usize = COUNT_OFFSET + 1;
const ACCESS_POINT_LEN: usize = SSID_CAPACITY + PSK_CAPACITY;
const API_KEY_OFFSET: usize = ACCESS_POINTS_OFFSET + MAX_ACCESS_POINTS * ACCESS_POINT_LEN;
const BROKER_HOST_OFFSET: usize = API_KEY_OFFSET + API_KEY_CAPACITY;
const BROKER_PORT_OFFSET: usize = BROKER_HOST_OFFSET + BROKER_HOST_CAPACITY;
const TOPIC_OFFSET: usize = BROKER_PORT_OFFSET + 2;

/// Total encoded record size in bytes.
pub const RECORD_LEN: usize = TOPIC_OFFSET + TOPIC_CAPACITY;

/// Truncate `value` so that it fits a NUL-terminated field of `capacity` bytes.
///
/// Truncation happens on a UTF-8 character boundary, so the result may be
/// a few bytes shorter than `capacity - 1`.
pub fn truncate_to_capacity(value: &str, capacity: usize) -> String {
    let max = capacity.saturating_sub(1);
    if value.len() <= max {
        return value.to_string();
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

/// One network the device may join.
#[derive(Clone, PartialEq, Eq, Zeroize)]
pub struct AccessPoint {
    ssid: String,
    psk: String,
}

impl AccessPoint {
    /// Create an access point entry, truncating oversized fields.
    pub fn new(ssid: &str, psk: &str) -> Self {
        Self {
            ssid: truncate_to_capacity(ssid, SSID_CAPACITY),
            psk: truncate_to_capacity(psk, PSK_CAPACITY),
        }
    }

    /// Network name.
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Pre-shared key (empty for open networks).
    pub fn psk(&self) -> &str {
        &self.psk
    }

    /// Check if this is an open network (no key).
    pub fn is_open(&self) -> bool {
        self.psk.is_empty()
    }
}

impl fmt::Debug for AccessPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPoint")
            .field("ssid", &self.ssid)
            .field("psk", &if self.psk.is_empty() { "" } else { "****" })
            .finish()
    }
}

/// Backend service endpoint the application publishes to.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize)]
pub struct ServiceConfig {
    api_key: String,
    broker_host: String,
    broker_port: u16,
    topic: String,
}

impl ServiceConfig {
    /// Create a service configuration, truncating oversized fields.
    pub fn new(api_key: &str, broker_host: &str, broker_port: u16, topic: &str) -> Self {
        Self {
            api_key: truncate_to_capacity(api_key, API_KEY_CAPACITY),
            broker_host: truncate_to_capacity(broker_host, BROKER_HOST_CAPACITY),
            broker_port,
            topic: truncate_to_capacity(topic, TOPIC_CAPACITY),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn broker_host(&self) -> &str {
        &self.broker_host
    }

    pub fn broker_port(&self) -> u16 {
        self.broker_port
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// True when no field carries a value. Such a section is stored as zeros.
    pub fn is_empty(&self) -> bool {
        self.api_key.is_empty()
            && self.broker_host.is_empty()
            && self.broker_port == 0
            && self.topic.is_empty()
    }
}

/// The persisted credential record.
///
/// The signature is not held in memory: it is written by [`Credentials::to_bytes`]
/// and checked by [`Credentials::from_bytes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Zeroize)]
pub struct Credentials {
    hostname: String,
    access_points: Vec<AccessPoint>,
    service: Option<ServiceConfig>,
}

impl Credentials {
    /// Create a record with a hostname and no access points.
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: truncate_to_capacity(hostname, HOSTNAME_CAPACITY),
            ..Default::default()
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn set_hostname(&mut self, hostname: &str) {
        self.hostname = truncate_to_capacity(hostname, HOSTNAME_CAPACITY);
    }

    /// Append an access point.
    ///
    /// Returns an error if the SSID is empty or the record is full.
    pub fn add_access_point(&mut self, ssid: &str, psk: &str) -> Result<(), CredentialError> {
        if ssid.is_empty() {
            return Err(CredentialError::SsidEmpty);
        }
        if self.access_points.len() >= MAX_ACCESS_POINTS {
            return Err(CredentialError::TooManyAccessPoints {
                max: MAX_ACCESS_POINTS,
            });
        }
        self.access_points.push(AccessPoint::new(ssid, psk));
        Ok(())
    }

    pub fn access_points(&self) -> &[AccessPoint] {
        &self.access_points
    }

    /// Service configuration, present only in the extended record.
    pub fn service(&self) -> Option<&ServiceConfig> {
        self.service.as_ref()
    }

    /// Set the service configuration. An empty section is stored as `None`.
    pub fn set_service(&mut self, service: Option<ServiceConfig>) {
        self.service = service.filter(|s| !s.is_empty());
    }

    /// Serialize to the fixed-width layout, signature included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; RECORD_LEN];
        bytes[..4].copy_from_slice(&SIGNATURE.to_le_bytes());
        put_str(&mut bytes, HOSTNAME_OFFSET, HOSTNAME_CAPACITY, &self.hostname);
        bytes[COUNT_OFFSET] = self.access_points.len() as u8;

        for (i, ap) in self.access_points.iter().enumerate() {
            let base = ACCESS_POINTS_OFFSET + i * ACCESS_POINT_LEN;
            put_str(&mut bytes, base, SSID_CAPACITY, &ap.ssid);
            put_str(&mut bytes, base + SSID_CAPACITY, PSK_CAPACITY, &ap.psk);
        }

        if let Some(service) = &self.service {
            put_str(&mut bytes, API_KEY_OFFSET, API_KEY_CAPACITY, &service.api_key);
            put_str(
                &mut bytes,
                BROKER_HOST_OFFSET,
                BROKER_HOST_CAPACITY,
                &service.broker_host,
            );
            bytes[BROKER_PORT_OFFSET..BROKER_PORT_OFFSET + 2]
                .copy_from_slice(&service.broker_port.to_le_bytes());
            put_str(&mut bytes, TOPIC_OFFSET, TOPIC_CAPACITY, &service.topic);
        }

        bytes
    }

    /// Deserialize from the fixed-width layout.
    ///
    /// The signature is checked before any other field is looked at.
    /// Trailing bytes beyond [`RECORD_LEN`] are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CredentialError> {
        if bytes.len() < RECORD_LEN {
            return Err(CredentialError::Truncated {
                len: bytes.len(),
                expected: RECORD_LEN,
            });
        }

        let signature = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if signature != SIGNATURE {
            return Err(CredentialError::BadSignature { found: signature });
        }

        let count = bytes[COUNT_OFFSET] as usize;
        if count > MAX_ACCESS_POINTS {
            return Err(CredentialError::AccessPointCount {
                count,
                max: MAX_ACCESS_POINTS,
            });
        }

        let hostname = get_str(bytes, HOSTNAME_OFFSET, HOSTNAME_CAPACITY, "hostname")?;

        let mut access_points = Vec::with_capacity(count);
        for i in 0..count {
            let base = ACCESS_POINTS_OFFSET + i * ACCESS_POINT_LEN;
            access_points.push(AccessPoint {
                ssid: get_str(bytes, base, SSID_CAPACITY, "ssid")?,
                psk: get_str(bytes, base + SSID_CAPACITY, PSK_CAPACITY, "psk")?,
            });
        }

        let service = ServiceConfig {
            api_key: get_str(bytes, API_KEY_OFFSET, API_KEY_CAPACITY, "api key")?,
            broker_host: get_str(
                bytes,
                BROKER_HOST_OFFSET,
                BROKER_HOST_CAPACITY,
                "broker host",
            )?,
            broker_port: u16::from_le_bytes([
                bytes[BROKER_PORT_OFFSET],
                bytes[BROKER_PORT_OFFSET + 1],
            ]),
            topic: get_str(bytes, TOPIC_OFFSET, TOPIC_CAPACITY, "topic")?,
        };

        Ok(Self {
            hostname,
            access_points,
            service: Some(service).filter(|s| !s.is_empty()),
        })
    }
}

fn put_str(buf: &mut [u8], offset: usize, capacity: usize, value: &str) {
    let raw = value.as_bytes();
    let len = raw.len().min(capacity - 1);
    buf[offset..offset + len].copy_from_slice(&raw[..len]);
}

fn get_str(
    bytes: &[u8],
    offset: usize,
    capacity: usize,
    field: &'static str,
) -> Result<String, CredentialError> {
    let raw = &bytes[offset..offset + capacity];
    let end = raw
        .iter()
        .position(|&b| b == 0)
        .ok_or(CredentialError::Unterminated(field))?;
    String::from_utf8(raw[..end].to_vec()).map_err(|_| CredentialError::InvalidUtf8(field))
}

/// Errors that can occur while building or decoding a credential record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// SSID is empty.
    SsidEmpty,
    /// The record already holds the maximum number of access points.
    TooManyAccessPoints { max: usize },
    /// Stored data is shorter than a full record.
    Truncated { len: usize, expected: usize },
    /// Signature does not mark a valid record.
    BadSignature { found: u32 },
    /// Stored access point count is out of range.
    AccessPointCount { count: usize, max: usize },
    /// A string field has no terminating NUL inside its capacity.
    Unterminated(&'static str),
    /// A string field is not valid UTF-8.
    InvalidUtf8(&'static str),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::TooManyAccessPoints { max } => {
                write!(f, "too many access points (max {})", max)
            }
            Self::Truncated { len, expected } => {
                write!(f, "record truncated: {} bytes (expected {})", len, expected)
            }
            Self::BadSignature { found } => write!(f, "bad signature: {:#010x}", found),
            Self::AccessPointCount { count, max } => {
                write!(f, "access point count {} out of range (max {})", count, max)
            }
            Self::Unterminated(field) => write!(f, "{} field is not terminated", field),
            Self::InvalidUtf8(field) => write!(f, "{} field is not valid UTF-8", field),
        }
    }
}

impl std::error::Error for CredentialError {}
