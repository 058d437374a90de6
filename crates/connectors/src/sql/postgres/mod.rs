mod params;
pub mod provider;
mod row;
pub(crate) mod utils;
