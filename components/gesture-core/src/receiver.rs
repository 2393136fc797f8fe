#![allow(async_fn_in_trait)]

use core::convert::Infallible;

use heapless::Vec;

use crate::{
    gesture::{DecodeError, Gesture, GestureRecord},
    link::MacAddress,
};

/// Largest payload an ESP-NOW (v1) datagram can carry.
pub const MAX_PAYLOAD: usize = 250;

pub struct Datagram {
    pub source: MacAddress,
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

/// Incoming side of the datagram radio.
pub trait DatagramSource {
    async fn receive(&mut self) -> Datagram;
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiverStats {
    pub accepted: u32,
    pub rejected: u32,
}

pub struct Receiver<S: DatagramSource> {
    source: S,
    stats: ReceiverStats,
}

impl<S: DatagramSource> Receiver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            stats: ReceiverStats::default(),
        }
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    pub async fn run(mut self) -> Infallible {
        loop {
            let _ = self.receive_next().await;
        }
    }

    pub async fn receive_next(&mut self) -> Result<(MacAddress, Gesture), DecodeError> {
        let datagram = self.source.receive().await;
        match GestureRecord::decode(&datagram.payload) {
            Ok(record) => {
                let gesture = record.gesture();
                self.stats.accepted = self.stats.accepted.wrapping_add(1);
                info!("Received gesture {} from {}", gesture.label(), datagram.source);
                Ok((datagram.source, gesture))
            }
            Err(e) => {
                self.stats.rejected = self.stats.rejected.wrapping_add(1);
                warn!("Dropped datagram from {}: {:?}", datagram.source, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use std::collections::VecDeque;

    use super::*;

    const TRANSMITTER: MacAddress = MacAddress([0x24, 0x6F, 0x28, 0x0A, 0x0B, 0x0C]);

    struct SourceMock {
        datagrams: VecDeque<Datagram>,
    }

    impl SourceMock {
        fn new(payloads: &[&[u8]]) -> Self {
            Self {
                datagrams: payloads
                    .iter()
                    .map(|payload| Datagram {
                        source: TRANSMITTER,
                        payload: Vec::from_slice(payload).unwrap(),
                    })
                    .collect(),
            }
        }
    }

    impl DatagramSource for SourceMock {
        async fn receive(&mut self) -> Datagram {
            match self.datagrams.pop_front() {
                Some(datagram) => datagram,
                None => core::future::pending().await,
            }
        }
    }

    #[tokio::test]
    async fn decodes_gestures() {
        let mut receiver = Receiver::new(SourceMock::new(&[&[0x01, 0, 0, 0], &[0x04, 0, 0, 0], &[0x2A, 0, 0, 0]]));
        assert_eq!(receiver.receive_next().await, Ok((TRANSMITTER, Gesture::Up)));
        assert_eq!(receiver.receive_next().await, Ok((TRANSMITTER, Gesture::Right)));
        assert_eq!(receiver.receive_next().await, Ok((TRANSMITTER, Gesture::Unknown(42))));
        assert_eq!(receiver.stats(), ReceiverStats { accepted: 3, rejected: 0 });
    }

    #[tokio::test]
    async fn rejects_foreign_payloads() {
        let mut receiver = Receiver::new(SourceMock::new(&[b"hello", &[0x02, 0, 0, 0]]));
        assert_eq!(
            receiver.receive_next().await,
            Err(DecodeError::Length { expected: 4, actual: 5 })
        );
        assert_eq!(receiver.receive_next().await, Ok((TRANSMITTER, Gesture::Down)));
        assert_eq!(receiver.stats(), ReceiverStats { accepted: 1, rejected: 1 });
    }
}
