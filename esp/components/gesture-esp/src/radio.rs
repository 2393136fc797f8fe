use esp_hal::peripherals::WIFI;
use esp_radio::{
    Controller,
    esp_now::EspNow,
    wifi::{WifiController, WifiMode},
};
use gesture_core::{error, info};
use static_cell::StaticCell;

static RADIO: StaticCell<Controller<'static>> = StaticCell::new();

#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    AlreadyStarted,
    Init,
    Wifi,
    StationMode,
}

/// Starts Wi-Fi in station mode and hands out its ESP-NOW interface.
///
/// The returned controller has to stay alive, dropping it stops the radio.
pub fn bring_up(wifi: WIFI<'static>) -> Result<(WifiController<'static>, EspNow<'static>), RadioError> {
    let controller = esp_radio::init().map_err(|_| RadioError::Init)?;
    let radio = RADIO.try_init(controller).ok_or(RadioError::AlreadyStarted)?;

    let (mut wifi_controller, interfaces) = esp_radio::wifi::new(radio, wifi, Default::default()).map_err(|_| RadioError::Wifi)?;
    wifi_controller.set_mode(WifiMode::Sta).map_err(|_| RadioError::StationMode)?;
    wifi_controller.start().map_err(|_| RadioError::StationMode)?;
    info!("Radio> Wi-Fi started in station mode");

    let esp_now = interfaces.esp_now;
    match esp_now.version() {
        Ok(version) => info!("Radio> ESP-NOW version {}", version),
        Err(_) => error!("Radio> ESP-NOW not responding"),
    }
    Ok((wifi_controller, esp_now))
}
