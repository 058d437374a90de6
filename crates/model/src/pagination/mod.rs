pub mod checkpoint;
pub mod offset;
