//! ESP32 SNTP time client.

use super::{LinkError, TimeSync};
use esp_idf_svc::sntp::{EspSntp, SntpConf};
use log::info;
use std::time::{SystemTime, UNIX_EPOCH};

/// SNTP client setting the system clock.
///
/// Only one SNTP service may exist at a time, so a running one is dropped
/// before a new one starts.
#[derive(Default)]
pub struct EspTimeSync {
    sntp: Option<EspSntp<'static>>,
}

impl EspTimeSync {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeSync for EspTimeSync {
    fn begin(&mut self, servers: &[String]) -> Result<(), LinkError> {
        self.sntp = None;

        let mut conf = SntpConf::default();
        for (slot, server) in conf.servers.iter_mut().zip(servers) {
            *slot = server.as_str();
        }

        self.sntp = Some(EspSntp::new(&conf)?);
        info!("SNTP started: {:?}", servers);
        Ok(())
    }

    fn unix_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
