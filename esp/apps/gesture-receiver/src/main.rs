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
use gesture_core::receiver::Receiver;
use gesture_esp::{esp_now::EspNowSource, radio};
use panic_rtt_target as _;

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
    info!("Gesture receiver starting");

    let (_controller, esp_now) = match radio::bring_up(peripherals.WIFI) {
        Ok(radio) => radio,
        Err(e) => {
            error!("Radio bring-up failed: {:?}, halting", e);
            let never: Infallible = core::future::pending().await;
            match never {}
        }
    };

    let receiver = Receiver::new(EspNowSource::new(esp_now));
    let never = receiver.run().await;
    match never {}
}
