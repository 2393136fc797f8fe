use core::convert::Infallible;

use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Timer};

use crate::{
    gesture::{Gesture, GestureRecord},
    link::{self, LinkSender, Peer, Transport},
    sensor::{GestureSensor, SensorError},
};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransmitterConfig {
    pub peer: Peer,
    /// Pause after every detected gesture before the sensor is polled again.
    pub settle: Duration,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            peer: Peer::default(),
            settle: Duration::from_millis(crate::config::SETTLE_MS),
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartupError {
    Sensor(SensorError),
}

impl From<SensorError> for StartupError {
    fn from(err: SensorError) -> Self {
        StartupError::Sensor(err)
    }
}

pub struct Poller<S: GestureSensor> {
    sensor: S,
    settle: Duration,
}

impl<S: GestureSensor> Poller<S> {
    pub async fn start(mut sensor: S, settle: Duration) -> Result<Self, SensorError> {
        sensor
            .begin()
            .await
            .inspect_err(|e| error!("Sensor> failed to initialize, check the wiring: {:?}", e))?;
        info!("Sensor> initialized");
        sensor.enable_gesture(true).await?;
        info!("Sensor> gesture sensing enabled");
        Ok(Self { sensor, settle })
    }

    /// Reads once and, on a gesture, hands it to the link and waits out the settle time.
    pub async fn poll_once<const N: usize>(&mut self, link: Option<&LinkSender<'_, N>>) -> Option<Gesture> {
        let gesture = match self.sensor.read_gesture().await {
            Ok(Gesture::None) => return None,
            Ok(gesture) => gesture,
            Err(e) => {
                warn!("Sensor> read error {:?}", e);
                return None;
            }
        };

        info!("Detected gesture: {}", gesture.label());
        match link {
            Some(link) => match link.send(GestureRecord::new(gesture)) {
                Ok(()) => debug!("Gesture {} queued for sending", gesture.label()),
                Err(e) => error!("Error sending gesture {}: {:?}", gesture.label(), e),
            },
            None => warn!("No link, gesture {} dropped", gesture.label()),
        }

        Timer::after(self.settle).await;
        Some(gesture)
    }

    pub async fn run<const N: usize>(&mut self, link: Option<&LinkSender<'_, N>>) -> Infallible {
        loop {
            self.poll_once(link).await;
        }
    }
}

/// Brings up sensor and link, then polls forever.
///
/// Only a sensor failure ends this early. A link that cannot be brought up
/// leaves the poller running without sending anything.
pub async fn run<S: GestureSensor, T: Transport, const N: usize>(
    state: &mut link::State<N>,
    sensor: S,
    transport: T,
    config: TransmitterConfig,
) -> Result<Infallible, StartupError> {
    let mut poller = Poller::start(sensor, config.settle).await?;

    match link::init(transport, config.peer) {
        Ok(link) => {
            let (runner, sender) = link::new(state, link);
            match select(poller.run(Some(&sender)), runner.run()).await {
                Either::First(never) | Either::Second(never) => match never {},
            }
        }
        Err(e) => {
            error!("Link unavailable ({:?}), continuing without wireless", e);
            let never = poller.run::<N>(None).await;
            match never {}
        }
    }
}
