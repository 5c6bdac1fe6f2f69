//! WiFi station-mode adapter.
//!
//! Implements [`LinkDriver`].  Every call only starts an operation; the
//! outcome comes back as a [`LinkEvent`] posted through the
//! [`LinkEventHandle`] the adapter was built with.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspWifi` plus a raw ESP-IDF event
//!   handler registered on `WIFI_EVENT` / `IP_EVENT`.  The handler runs
//!   in the system event task and only posts into the link channel.
//! - **all other targets**: a scripted simulation that posts events
//!   synchronously, for host-side tests.

use log::{info, warn};

use crate::app::ports::LinkDriver;
use crate::error::LinkError;
use crate::net::link::{LinkEvent, LinkEventHandle};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    nvs::EspDefaultNvsPartition,
    sys::*,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};

#[cfg(not(target_os = "espidf"))]
use crate::net::link::REASON_ASSOC_LEAVE;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(LinkError::NoCredentials);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::NoCredentials);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    /// Boxed so the ESP-IDF handler can hold a stable pointer to it.
    #[cfg_attr(target_os = "espidf", allow(dead_code))]
    events: Box<LinkEventHandle>,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    handlers: [esp_event_handler_instance_t; 2],
    /// Simulation: association state and scripted failure.
    #[cfg(not(target_os = "espidf"))]
    associated: bool,
    #[cfg(not(target_os = "espidf"))]
    fail_with: Option<u8>,
    #[cfg(not(target_os = "espidf"))]
    attempts: u32,
}

impl WifiAdapter {
    fn store_credentials(
        ssid: &str,
        password: &str,
    ) -> Result<(heapless::String<32>, heapless::String<64>), LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut s = heapless::String::new();
        s.push_str(ssid).map_err(|()| LinkError::NoCredentials)?;
        let mut p = heapless::String::new();
        p.push_str(password).map_err(|()| LinkError::NoCredentials)?;
        Ok((s, p))
    }

    pub fn is_open_network(&self) -> bool {
        self.password.is_empty()
    }
}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn on_network_event(
    arg: *mut core::ffi::c_void,
    base: esp_event_base_t,
    id: i32,
    data: *mut core::ffi::c_void,
) {
    // SAFETY: `arg` points at the adapter's boxed LinkEventHandle, which
    // outlives the handler registration (unregistered in Drop).
    let handle = unsafe { &*(arg as *const LinkEventHandle) };
    // SAFETY: WIFI_EVENT / IP_EVENT are immutable statics set by ESP-IDF.
    let (wifi_base, ip_base) = unsafe { (WIFI_EVENT, IP_EVENT) };

    if base == wifi_base && id == wifi_event_t_WIFI_EVENT_STA_DISCONNECTED as i32 {
        let reason = if data.is_null() {
            0
        } else {
            // SAFETY: ESP-IDF passes a wifi_event_sta_disconnected_t for
            // this event id.
            unsafe { (*(data as *const wifi_event_sta_disconnected_t)).reason }
        };
        handle.post(LinkEvent::Disconnected { reason });
    } else if base == ip_base && id == ip_event_t_IP_EVENT_STA_GOT_IP as i32 {
        handle.post(LinkEvent::GotIp);
    }
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        ssid: &str,
        password: &str,
        events: LinkEventHandle,
    ) -> anyhow::Result<Self> {
        let (ssid, password) =
            Self::store_credentials(ssid, password).map_err(crate::error::Error::from)?;
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        let events = Box::new(events);
        let arg = (&*events as *const LinkEventHandle).cast_mut().cast();

        let mut handlers: [esp_event_handler_instance_t; 2] = [core::ptr::null_mut(); 2];
        // SAFETY: the default event loop exists (EspSystemEventLoop was
        // taken); `arg` stays valid until Drop unregisters both handlers.
        unsafe {
            esp!(esp_event_handler_instance_register(
                WIFI_EVENT,
                wifi_event_t_WIFI_EVENT_STA_DISCONNECTED as i32,
                Some(on_network_event),
                arg,
                &mut handlers[0],
            ))?;
            esp!(esp_event_handler_instance_register(
                IP_EVENT,
                ip_event_t_IP_EVENT_STA_GOT_IP as i32,
                Some(on_network_event),
                arg,
                &mut handlers[1],
            ))?;
        }

        Ok(Self {
            ssid,
            password,
            events,
            wifi,
            handlers,
        })
    }

    fn platform_begin(&mut self) -> Result<(), LinkError> {
        let conf = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| LinkError::NoCredentials)?,
            password: self.password.as_str().try_into().map_err(|_| LinkError::NoCredentials)?,
            auth_method: if self.is_open_network() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });
        self.wifi
            .set_configuration(&conf)
            .map_err(|_| LinkError::DriverRejected)?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| LinkError::DriverRejected)?;
        }
        // Drop any half-open association before joining again.
        let _ = self.wifi.disconnect();
        self.wifi.connect().map_err(|_| LinkError::DriverRejected)
    }

    fn platform_reconnect(&mut self) -> Result<(), LinkError> {
        self.wifi.connect().map_err(|_| LinkError::DriverRejected)
    }

    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect failed ({})", e);
        }
    }

    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info = wifi_ap_record_t::default();
        // SAFETY: esp_wifi_sta_get_ap_info only writes into `ap_info`.
        let ret = unsafe { esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == ESP_OK as i32).then_some(ap_info.rssi)
    }
}

#[cfg(target_os = "espidf")]
impl Drop for WifiAdapter {
    fn drop(&mut self) {
        // SAFETY: instances were registered in new() and are released once.
        unsafe {
            esp_event_handler_instance_unregister(
                WIFI_EVENT,
                wifi_event_t_WIFI_EVENT_STA_DISCONNECTED as i32,
                self.handlers[0],
            );
            esp_event_handler_instance_unregister(
                IP_EVENT,
                ip_event_t_IP_EVENT_STA_GOT_IP as i32,
                self.handlers[1],
            );
        }
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new(ssid: &str, password: &str, events: LinkEventHandle) -> Result<Self, LinkError> {
        let (ssid, password) = Self::store_credentials(ssid, password)?;
        Ok(Self {
            ssid,
            password,
            events: Box::new(events),
            associated: false,
            fail_with: None,
            attempts: 0,
        })
    }

    /// Make every following attempt fail with `reason` (`None` restores success).
    pub fn sim_fail_with(&mut self, reason: Option<u8>) {
        self.fail_with = reason;
    }

    /// Drop the association as the radio would.
    pub fn sim_drop(&mut self, reason: u8) {
        self.associated = false;
        self.events.post(LinkEvent::Disconnected { reason });
    }

    pub fn sim_attempts(&self) -> u32 {
        self.attempts
    }

    fn attempt(&mut self) {
        self.attempts = self.attempts.wrapping_add(1);
        match self.fail_with {
            Some(reason) => {
                warn!("WiFi(sim): attempt {} fails with reason {}", self.attempts, reason);
                self.events.post(LinkEvent::Disconnected { reason });
            }
            None => {
                self.associated = true;
                info!("WiFi(sim): associated with '{}'", self.ssid);
                self.events.post(LinkEvent::GotIp);
            }
        }
    }

    fn platform_begin(&mut self) -> Result<(), LinkError> {
        self.attempt();
        Ok(())
    }

    fn platform_reconnect(&mut self) -> Result<(), LinkError> {
        self.attempt();
        Ok(())
    }

    fn platform_disconnect(&mut self) {
        self.associated = false;
        self.events.post(LinkEvent::Disconnected { reason: REASON_ASSOC_LEAVE });
    }

    fn platform_rssi(&self) -> Option<i8> {
        self.associated.then_some(-60)
    }
}

// ───────────────────────────────────────────────────────────────
// LinkDriver
// ───────────────────────────────────────────────────────────────

impl LinkDriver for WifiAdapter {
    fn begin(&mut self) -> Result<(), LinkError> {
        info!(
            "WiFi: associating with '{}' ({})",
            self.ssid,
            if self.is_open_network() { "open" } else { "WPA2" }
        );
        self.platform_begin()
    }

    fn reconnect(&mut self) -> Result<(), LinkError> {
        self.platform_reconnect()
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        info!("WiFi: disconnected");
    }

    fn rssi(&self) -> Option<i8> {
        self.platform_rssi()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
