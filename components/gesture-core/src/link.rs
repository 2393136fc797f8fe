#![allow(async_fn_in_trait)]

use core::convert::Infallible;

use embassy_sync::{
    blocking_mutex::raw::NoopRawMutex,
    channel::{Channel, Receiver, Sender},
};

use crate::{fmt::FormatableMac, gesture::GestureRecord};

const CHANNEL_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    pub fn octets(&self) -> &[u8; 6] {
        &self.0
    }
}

impl core::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&FormatableMac(&self.0), f)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MacAddress {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", FormatableMac(&self.0))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Peer {
    pub address: MacAddress,
    /// 0 keeps whatever channel the radio is currently on.
    pub channel: u8,
    pub encrypt: bool,
}

impl Peer {
    pub fn unencrypted(address: MacAddress, channel: u8) -> Self {
        Self {
            address,
            channel,
            encrypt: false,
        }
    }
}

impl Default for Peer {
    fn default() -> Self {
        Self::unencrypted(MacAddress(crate::config::PEER_ADDRESS), crate::config::PEER_CHANNEL)
    }
}

#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    Init,
    AddPeer,
    QueueFull,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    Success,
    Fail,
}

/// Connectionless datagram radio, e.g. ESP-NOW.
pub trait Transport {
    /// Brings the radio stack up in station mode.
    fn init(&mut self) -> Result<(), LinkError>;

    fn add_peer(&mut self, peer: &Peer) -> Result<(), LinkError>;

    /// Sends one datagram and resolves once the radio reports the delivery outcome.
    async fn transmit(&mut self, destination: &MacAddress, payload: &[u8]) -> Delivery;
}

/// A transport that is up and knows its single peer.
pub struct Link<T: Transport> {
    transport: T,
    peer: Peer,
}

impl<T: Transport> Link<T> {
    pub fn peer(&self) -> &Peer {
        &self.peer
    }
}

pub fn init<T: Transport>(mut transport: T, peer: Peer) -> Result<Link<T>, LinkError> {
    transport.init().inspect_err(|e| error!("Link> error initializing radio: {:?}", e))?;
    info!("Link> radio initialized in station mode");

    transport
        .add_peer(&peer)
        .inspect_err(|e| error!("Link> failed to add peer {}: {:?}", peer.address, e))?;
    info!("Link> peer {} added on channel {}", peer.address, peer.channel);

    Ok(Link { transport, peer })
}

pub struct State<const N: usize = CHANNEL_SIZE> {
    channel: Channel<NoopRawMutex, GestureRecord, N>,
}

impl<const N: usize> State<N> {
    pub fn new() -> Self {
        State { channel: Channel::new() }
    }
}

impl<const N: usize> Default for State<N> {
    fn default() -> Self {
        Self::new()
    }
}

pub fn new<'a, T: Transport, const N: usize>(state: &'a mut State<N>, link: Link<T>) -> (Runner<'a, T, N>, LinkSender<'a, N>) {
    (
        Runner {
            link,
            rx: state.channel.receiver(),
        },
        LinkSender {
            tx: state.channel.sender(),
        },
    )
}

/// Hands records to the [`Runner`] without waiting for them to go out.
pub struct LinkSender<'a, const N: usize> {
    tx: Sender<'a, NoopRawMutex, GestureRecord, N>,
}

impl<const N: usize> LinkSender<'_, N> {
    pub fn send(&self, record: GestureRecord) -> Result<(), LinkError> {
        self.tx.try_send(record).map_err(|_| LinkError::QueueFull)
    }
}

/// Owns the transport: transmits queued records and reports how each delivery went.
pub struct Runner<'a, T: Transport, const N: usize> {
    link: Link<T>,
    rx: Receiver<'a, NoopRawMutex, GestureRecord, N>,
}

impl<T: Transport, const N: usize> Runner<'_, T, N> {
    pub async fn run(mut self) -> Infallible {
        loop {
            self.transmit_next().await;
        }
    }

    pub async fn transmit_next(&mut self) -> Delivery {
        let record = self.rx.receive().await;
        let payload = record.encode();
        let delivery = self.link.transport.transmit(&self.link.peer.address, &payload).await;
        match delivery {
            Delivery::Success => info!("Link> last packet send status: Delivery Success"),
            Delivery::Fail => warn!("Link> last packet send status: Delivery Fail"),
        }
        delivery
    }
}
