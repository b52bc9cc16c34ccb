pub mod catalog;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod flats;
pub mod models;
