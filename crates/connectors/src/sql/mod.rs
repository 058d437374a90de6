pub mod base;
pub mod mysql;
pub mod postgres;

#[cfg(feature = "testing")]
pub mod memory;
