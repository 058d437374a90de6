pub mod adapter;
pub mod error;
pub mod query;
pub mod registry;
pub mod sql;
