pub mod provider;
mod row;
