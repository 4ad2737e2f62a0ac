//! Configuration structs

mod settings;

pub use settings::{
    ConfigError, Environment, LogFormat, PresenceSettings, RedisConfig, TimingConfig,
};
