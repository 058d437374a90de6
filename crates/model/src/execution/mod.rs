pub mod connection;
pub mod session;
pub mod state;
