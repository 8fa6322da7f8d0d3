pub mod adb;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod library;
pub mod progress;

#[cfg(test)]
pub mod testing;
