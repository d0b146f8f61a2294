pub mod config;
pub mod mqtt_loop;
pub mod shadow_sync;
