//! ESP32 WiFi link driver.
//!
//! Wraps the non-blocking `EspWifi` driver. `begin` only starts association;
//! the controller polls [`LinkDriver::status`] to learn the outcome.

use super::{LinkDriver, LinkError, LinkStatus};
use crate::config::AccessPoint;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
use log::{debug, info};
use std::net::IpAddr;
use zeroize::Zeroize;

/// WiFi station driver.
pub struct EspLink<'a> {
    wifi: EspWifi<'a>,
    /// Networks registered from the credential record.
    candidates: Vec<AccessPoint>,
    /// Index of the candidate tried next when no explicit target is given.
    next_candidate: usize,
    /// SSID of the network being joined.
    active: Option<String>,
}

impl<'a> EspLink<'a> {
    /// Create a new WiFi link driver.
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Result<Self, LinkError> {
        let wifi = EspWifi::new(modem, sysloop, None)?;

        Ok(Self {
            wifi,
            candidates: Vec::new(),
            next_candidate: 0,
            active: None,
        })
    }

    /// Pick the next registered candidate, rotating on every call.
    fn rotate_candidate(&mut self) -> Result<AccessPoint, LinkError> {
        if self.candidates.is_empty() {
            return Err(LinkError::NoCandidates);
        }
        let ap = self.candidates[self.next_candidate % self.candidates.len()].clone();
        self.next_candidate = (self.next_candidate + 1) % self.candidates.len();
        Ok(ap)
    }

    fn configure(&mut self, ap: &AccessPoint) -> Result<(), LinkError> {
        let auth_method = if ap.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let config = Configuration::Client(ClientConfiguration {
            ssid: ap.ssid().try_into().map_err(|_| LinkError::InvalidSsid)?,
            password: ap.psk().try_into().map_err(|_| LinkError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });

        self.wifi.set_configuration(&config)?;
        Ok(())
    }
}

impl<'a> LinkDriver for EspLink<'a> {
    fn set_hostname(&mut self, hostname: &str) -> Result<(), LinkError> {
        self.wifi.sta_netif_mut().set_hostname(hostname)?;
        Ok(())
    }

    fn register_candidate(&mut self, ssid: &str, psk: &str) {
        debug!("Registered candidate network: {}", ssid);
        self.candidates.push(AccessPoint::new(ssid, psk));
    }

    fn clear_candidates(&mut self) {
        self.candidates.zeroize();
        self.candidates.clear();
        self.next_candidate = 0;
    }

    fn begin(&mut self, target: Option<&AccessPoint>) -> Result<(), LinkError> {
        let ap = match target {
            Some(ap) => ap.clone(),
            None => self.rotate_candidate()?,
        };

        self.configure(&ap)?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }

        // Non-blocking: association continues in the driver task
        self.wifi.connect()?;
        info!("Association started: {}", ap.ssid());
        self.active = Some(ap.ssid().to_string());
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        match (self.wifi.is_connected(), self.wifi.sta_netif().is_up()) {
            (Ok(true), Ok(true)) => LinkStatus::Connected,
            (Ok(true), _) => LinkStatus::Connecting,
            (Ok(false), _) if self.active.is_some() => LinkStatus::Disconnected,
            (Ok(false), _) => LinkStatus::Idle,
            (Err(_), _) => LinkStatus::Failed,
        }
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        info!("Disconnecting from WiFi");
        self.active = None;
        self.wifi.disconnect()?;
        Ok(())
    }

    fn current_ssid(&self) -> Option<String> {
        self.active.clone()
    }

    fn local_addr(&self) -> Option<IpAddr> {
        let info = self.wifi.sta_netif().get_ip_info().ok()?;
        format!("{}", info.ip).parse().ok()
    }

    fn rssi(&self) -> Option<i32> {
        let mut ap_info = esp_idf_sys::wifi_ap_record_t::default();
        let rc = unsafe { esp_idf_sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        if rc == esp_idf_sys::ESP_OK {
            Some(i32::from(ap_info.rssi))
        } else {
            None
        }
    }
}
