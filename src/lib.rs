pub mod birthday;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod images;
pub mod roster;
pub mod runner;
pub mod startup;
pub mod utils;
