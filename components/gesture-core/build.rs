use std::path::PathBuf;

const DEFAULT_PEER_ADDRESS: &str = "00:4B:12:34:8C:00";
const DEFAULT_PEER_CHANNEL: &str = "0";
const DEFAULT_SETTLE_MS: &str = "1000";

fn parse_mac(value: &str) -> [u8; 6] {
    let octets: Vec<u8> = value
        .split(':')
        .map(|octet| u8::from_str_radix(octet.trim(), 16).unwrap_or_else(|_| panic!("GESTURE_PEER_ADDRESS: invalid octet '{octet}'")))
        .collect();
    octets
        .try_into()
        .unwrap_or_else(|_| panic!("GESTURE_PEER_ADDRESS: expected six ':'-separated octets, got '{value}'"))
}

fn env_or(name: &str, default: &str) -> String {
    println!("cargo:rerun-if-env-changed={name}");
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn main() {
    let peer_address = parse_mac(&env_or("GESTURE_PEER_ADDRESS", DEFAULT_PEER_ADDRESS));
    let peer_channel: u8 = env_or("GESTURE_PEER_CHANNEL", DEFAULT_PEER_CHANNEL)
        .parse()
        .expect("GESTURE_PEER_CHANNEL must be a number between 0 and 14");
    assert!(peer_channel <= 14, "GESTURE_PEER_CHANNEL must be a number between 0 and 14");
    let settle_ms: u64 = env_or("GESTURE_SETTLE_MS", DEFAULT_SETTLE_MS)
        .parse()
        .expect("GESTURE_SETTLE_MS must be a number of milliseconds");

    let out_dir_path = PathBuf::from(std::env::var_os("OUT_DIR").unwrap());
    let out_file_path = out_dir_path.join("consts.rs");

    std::fs::write(
        out_file_path,
        format!(
            "
            // generated form env vars
            pub const PEER_ADDRESS: [u8; 6] = {peer_address:?};
            pub const PEER_CHANNEL: u8 = {peer_channel};
            pub const SETTLE_MS: u64 = {settle_ms};"
        ),
    )
    .unwrap();
}
