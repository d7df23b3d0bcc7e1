use std::{
    env,
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    time::Duration,
};

// Runtime/host constants (not gameplay tuning).

pub fn host_port() -> u16 {
    env::var("BOMBER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080)
}

pub fn bind_address() -> IpAddr {
    env::var("BOMBER_BIND")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub fn levels_dir() -> PathBuf {
    env::var("BOMBER_LEVELS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/levels")))
}

pub fn default_level() -> String {
    env::var("BOMBER_LEVEL").unwrap_or_else(|_| "level1".to_string())
}

pub fn display_name() -> String {
    env::var("BOMBER_DISPLAY_NAME").unwrap_or_else(|_| "Player".to_string())
}

/// Fixed RNG seed for reproducible rounds; entropy when unset.
pub fn rng_seed() -> Option<u64> {
    env::var("BOMBER_SEED").ok().and_then(|v| v.parse().ok())
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);
