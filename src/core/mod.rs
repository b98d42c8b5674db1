//! Driver core: the connection lifecycle and the packet decoder.

pub mod bluetooth;
pub mod controller;
