pub mod events;
pub mod memory;
pub mod persistence;
