pub mod cursor;
pub mod error;
pub mod gate;
pub mod poll;
pub mod sink;
pub mod state;

#[cfg(test)]
mod tests;
