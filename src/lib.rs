use std::time::Duration;

pub use crate::counter::{
    EventCounter, SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE,
};
pub use crate::error::{Error, Result};

mod counter;
mod error;
mod evictor;

#[derive(Clone)]
pub struct Config {
    //How often the background task sweeps expired buckets
    pub eviction_interval: Duration,
    //Maximum age of a bucket before it is eligible for eviction
    pub max_retention: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            eviction_interval: Duration::from_secs(60),
            max_retention: Duration::from_secs(SECONDS_PER_DAY as u64),
        }
    }
}
