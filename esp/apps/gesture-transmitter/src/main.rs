#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use core::convert::Infallible;

use defmt::*;
use embassy_executor::Spawner;
use esp_hal::{clock::CpuClock, timer::timg::TimerGroup};
use gesture_core::{
    link,
    sensor::apds9960::Apds9960,
    transmitter::{self, TransmitterConfig},
};
use gesture_esp::{esp_now::EspNowTransport, i2c};
use panic_rtt_target as _;

const LINK_QUEUE_SIZE: usize = 4;

// This creates a default app-descriptor required by the esp-idf bootloader.
esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_defmt!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // the Wi-Fi driver allocates its buffers on the heap
    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);
    info!("Gesture transmitter starting");

    let transmitter_config = TransmitterConfig::default();
    info!("Peer {} on channel {}", transmitter_config.peer.address, transmitter_config.peer.channel);

    let result = match i2c::init_sensor_bus(peripherals.I2C0, peripherals.GPIO21, peripherals.GPIO22) {
        Ok(bus) => {
            let sensor = Apds9960::new(bus);
            let transport = EspNowTransport::new(peripherals.WIFI);
            let mut state = link::State::<LINK_QUEUE_SIZE>::new();
            transmitter::run(&mut state, sensor, transport, transmitter_config).await
        }
        Err(e) => {
            error!("I2C bus config rejected: {:?}", e);
            park().await
        }
    };

    match result {
        Ok(never) => match never {},
        Err(e) => error!("Startup failed: {:?}, halting", e),
    }
    park().await
}

async fn park() -> ! {
    let never: Infallible = core::future::pending().await;
    match never {}
}
