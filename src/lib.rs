pub mod checksum;
pub mod common;
pub mod planner;
pub mod protocol;
pub mod receive;
pub mod send;
pub mod server;
pub mod utils;
