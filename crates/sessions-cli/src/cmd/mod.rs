pub mod chunk;
pub mod config;
pub mod hook;
pub mod init;
pub mod state;
pub mod tasks;
pub mod update;
