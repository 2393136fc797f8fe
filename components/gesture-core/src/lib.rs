#![cfg_attr(not(test), no_std)]

#[macro_use]
pub mod fmt;

pub mod gesture;
pub mod link;
pub mod receiver;
pub mod sensor;
pub mod transmitter;

pub mod config {
    include!(concat!(env!("OUT_DIR"), "/consts.rs"));
}

#[cfg(test)]
pub mod tests {

    #[cfg(feature = "log")]
    #[cfg_attr(feature = "log", ctor::ctor)]
    fn init() {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_thread_names(true)
            .with_level(true)
            .pretty()
            .init();
    }
}
