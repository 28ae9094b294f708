//! Blocking WiFi scan over the ESP-IDF station driver.

use std::time::Duration;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, EspWifi, ScanConfig, ScanType};

use scanchain::protocol::ScanMode;
use scanchain::scanner::{Observation, ObservationList, ScanError, ScanRequest, WifiScanner};

pub struct EspScanner {
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl EspScanner {
    pub fn new(modem: Modem, sys_loop: EspSystemEventLoop, nvs: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sys_loop.clone(), Some(nvs))?, sys_loop)?;
        wifi.set_configuration(&esp_idf_svc::wifi::Configuration::Client(Default::default()))?;
        wifi.start()?;
        log::info!("WiFi station started for scanning");
        Ok(Self { wifi })
    }
}

/// ESP-IDF `wifi_auth_mode_t` value for an auth method
fn auth_code(auth: Option<AuthMethod>) -> u8 {
    match auth {
        None | Some(AuthMethod::None) => 0,
        Some(AuthMethod::WEP) => 1,
        Some(AuthMethod::WPA) => 2,
        Some(AuthMethod::WPA2Personal) => 3,
        Some(AuthMethod::WPAWPA2Personal) => 4,
        Some(AuthMethod::WPA2Enterprise) => 5,
        Some(AuthMethod::WPA3Personal) => 6,
        Some(AuthMethod::WPA2WPA3Personal) => 7,
        Some(AuthMethod::WAPIPersonal) => 8,
    }
}

impl WifiScanner for EspScanner {
    fn scan(&mut self, request: &ScanRequest, out: &mut ObservationList) -> Result<(), ScanError> {
        let dwell = Duration::from_millis(request.dwell_ms as u64);
        let config = ScanConfig {
            bssid: None,
            ssid: None,
            channel: (request.channel != 0).then_some(request.channel),
            scan_type: match request.mode {
                ScanMode::Active => ScanType::Active { min: dwell / 2, max: dwell },
                ScanMode::Passive => ScanType::Passive(dwell),
            },
            show_hidden: request.show_hidden,
        };

        let wifi = self.wifi.wifi_mut();
        wifi.start_scan(&config, true).map_err(|e| ScanError::Radio(e.code()))?;
        let found = wifi.get_scan_result().map_err(|e| ScanError::Radio(e.code()))?;

        for ap in found {
            let obs = Observation {
                bssid: ap.bssid,
                ssid: scanchain::protocol::ssid_from_bytes(ap.ssid.as_bytes()),
                rssi: ap.signal_strength,
                channel: ap.channel,
                auth_mode: auth_code(ap.auth_method),
            };
            if out.push(obs).is_err() {
                break;
            }
        }
        Ok(())
    }
}
