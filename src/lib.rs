pub mod config;
pub mod error;
pub mod model;
pub mod security;
pub mod identity;
pub mod storage;
pub mod media;
pub mod workflow;
pub mod server;
