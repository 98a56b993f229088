pub mod bench;
pub mod confidence;
pub mod config;
pub mod init;
pub mod learn;
pub mod signals;
