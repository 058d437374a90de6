pub mod executor;
pub mod sink;
pub mod worker;
