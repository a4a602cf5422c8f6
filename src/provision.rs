//! Interactive credential entry.
//!
//! When no valid record is stored, the controller hands over to a
//! [`CredentialEntry`]. [`SerialPrompt`] asks for the values line by line on
//! any reader/writer pair: the UART console on the device, a terminal on the
//! host. Closures returning credentials implement the trait too.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use wifi_manager_esp32::provision::{CredentialEntry, SerialPrompt};
//!
//! let input = Cursor::new("HomeNet\nsecret-psk\n\nkitchen-node\nn\n");
//! let mut prompt = SerialPrompt::new(input, Vec::new());
//! let creds = prompt.collect().unwrap();
//! assert_eq!(creds.hostname(), "kitchen-node");
//! assert_eq!(creds.access_points()[0].ssid(), "HomeNet");
//! ```

use crate::config::{CredentialError, Credentials, ServiceConfig, MAX_ACCESS_POINTS};
use std::fmt;
use std::io::{self, BufRead, Write};
use zeroize::Zeroize;

/// Broker port used when the prompt is left blank.
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Source of new credentials.
pub trait CredentialEntry {
    /// Produce a populated record. The caller persists it.
    fn collect(&mut self) -> Result<Credentials, EntryError>;
}

impl<F> CredentialEntry for F
where
    F: FnMut() -> Result<Credentials, EntryError>,
{
    fn collect(&mut self) -> Result<Credentials, EntryError> {
        self()
    }
}

/// Line-oriented credential prompt.
pub struct SerialPrompt<R, W> {
    input: R,
    output: W,
    ask_service: bool,
}

impl<R: BufRead, W: Write> SerialPrompt<R, W> {
    /// Create a prompt that also offers service endpoint configuration.
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            ask_service: true,
        }
    }

    /// Enable or disable the service endpoint questions.
    pub fn with_service(mut self, ask_service: bool) -> Self {
        self.ask_service = ask_service;
        self
    }

    /// Recover the writer, e.g. to inspect what was printed.
    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, prompt: &str) -> Result<String, EntryError> {
        write!(self.output, "\n{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(EntryError::Closed);
        }
        let value = line.trim_end_matches(['\r', '\n']).to_string();
        line.zeroize();
        Ok(value)
    }

    fn ask_port(&mut self) -> Result<u16, EntryError> {
        loop {
            let raw = self.ask(&format!("Enter the broker port [{}]: ", DEFAULT_BROKER_PORT))?;
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(DEFAULT_BROKER_PORT);
            }
            match raw.parse::<u16>() {
                Ok(port) if port > 0 => return Ok(port),
                _ => writeln!(self.output, "\nInvalid port: {}", raw)?,
            }
        }
    }

    fn collect_service(&mut self) -> Result<Option<ServiceConfig>, EntryError> {
        let answer = self.ask("Configure a service endpoint? [y/N]: ")?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            return Ok(None);
        }

        let mut api_key = self.ask("Enter the API key: ")?;
        let broker_host = self.ask("Enter the broker host: ")?;
        let broker_port = self.ask_port()?;
        let topic = self.ask("Enter the publish topic: ")?;

        let service = ServiceConfig::new(&api_key, &broker_host, broker_port, &topic);
        api_key.zeroize();
        Ok(Some(service))
    }
}

impl<R: BufRead, W: Write> CredentialEntry for SerialPrompt<R, W> {
    fn collect(&mut self) -> Result<Credentials, EntryError> {
        let mut creds = Credentials::default();

        while creds.access_points().len() < MAX_ACCESS_POINTS {
            let first = creds.access_points().is_empty();
            let ssid = self.ask(if first {
                "Enter the WiFi SSID: "
            } else {
                "Enter another WiFi SSID (blank to finish): "
            })?;

            if ssid.is_empty() {
                if first {
                    writeln!(self.output, "\nAt least one network is required.")?;
                    continue;
                }
                break;
            }

            let mut psk = self.ask("Enter the WiFi PSK: ")?;
            let added = creds.add_access_point(&ssid, &psk);
            psk.zeroize();
            added?;
        }

        let hostname = self.ask("Enter the hostname for this device: ")?;
        creds.set_hostname(hostname.trim());

        if self.ask_service {
            creds.set_service(self.collect_service()?);
        }

        writeln!(self.output)?;
        Ok(creds)
    }
}

/// Errors from the entry flow.
#[derive(Debug)]
pub enum EntryError {
    /// The input ended before all values were entered.
    Closed,
    /// An entered value was rejected.
    Credential(CredentialError),
    /// Console I/O failed.
    Io(io::Error),
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "input closed during credential entry"),
            Self::Credential(e) => write!(f, "invalid credential: {}", e),
            Self::Io(e) => write!(f, "console I/O error: {}", e),
        }
    }
}

impl std::error::Error for EntryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Credential(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Closed => None,
        }
    }
}

impl From<io::Error> for EntryError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<CredentialError> for EntryError {
    fn from(e: CredentialError) -> Self {
        Self::Credential(e)
    }
}
