use esp_hal::peripherals::WIFI;
use esp_radio::{
    esp_now::{EspNow, EspNowWifiInterface, PeerInfo},
    wifi::WifiController,
};
use gesture_core::{
    error,
    link::{Delivery, LinkError, MacAddress, Peer, Transport},
    receiver::{Datagram, DatagramSource, MAX_PAYLOAD},
    warn,
};
use heapless::Vec;

use crate::radio;

enum State {
    Down(WIFI<'static>),
    Up {
        // keeps the radio running
        _controller: WifiController<'static>,
        esp_now: EspNow<'static>,
    },
    Failed,
}

/// [`Transport`] over ESP-NOW. The radio is only started by [`Transport::init`].
pub struct EspNowTransport {
    state: State,
}

impl EspNowTransport {
    pub fn new(wifi: WIFI<'static>) -> Self {
        Self { state: State::Down(wifi) }
    }

    fn esp_now(&mut self) -> Option<&mut EspNow<'static>> {
        match &mut self.state {
            State::Up { esp_now, .. } => Some(esp_now),
            _ => None,
        }
    }
}

impl Transport for EspNowTransport {
    fn init(&mut self) -> Result<(), LinkError> {
        let State::Down(wifi) = core::mem::replace(&mut self.state, State::Failed) else {
            error!("ESP-NOW> radio already initialized");
            return Err(LinkError::Init);
        };
        let (controller, esp_now) = radio::bring_up(wifi).map_err(|e| {
            error!("ESP-NOW> radio bring-up failed: {:?}", e);
            LinkError::Init
        })?;
        self.state = State::Up {
            _controller: controller,
            esp_now,
        };
        Ok(())
    }

    fn add_peer(&mut self, peer: &Peer) -> Result<(), LinkError> {
        let esp_now = self.esp_now().ok_or(LinkError::AddPeer)?;
        esp_now
            .add_peer(PeerInfo {
                interface: EspNowWifiInterface::Sta,
                peer_address: *peer.address.octets(),
                lmk: None,
                channel: (peer.channel != 0).then_some(peer.channel),
                encrypt: peer.encrypt,
            })
            .map_err(|_| LinkError::AddPeer)
    }

    async fn transmit(&mut self, destination: &MacAddress, payload: &[u8]) -> Delivery {
        let Some(esp_now) = self.esp_now() else {
            return Delivery::Fail;
        };
        match esp_now.send_async(destination.octets(), payload).await {
            Ok(()) => Delivery::Success,
            Err(_) => {
                warn!("ESP-NOW> no acknowledgement from {}", destination);
                Delivery::Fail
            }
        }
    }
}

/// [`DatagramSource`] for the receiving node.
pub struct EspNowSource {
    esp_now: EspNow<'static>,
}

impl EspNowSource {
    pub fn new(esp_now: EspNow<'static>) -> Self {
        Self { esp_now }
    }
}

impl DatagramSource for EspNowSource {
    async fn receive(&mut self) -> Datagram {
        let received = self.esp_now.receive_async().await;
        let data = received.data();
        let len = data.len().min(MAX_PAYLOAD);
        let mut payload = Vec::new();
        // len <= MAX_PAYLOAD
        let _ = payload.extend_from_slice(&data[..len]);
        Datagram {
            source: MacAddress(received.info.src_address),
            payload,
        }
    }
}
