//! Notebook-side glue for the Rubin Science Platform: service discovery, authenticated
//! clients, and the startup sequence that prepares and launches a user's Lab.

pub mod cli;
pub mod command;
pub mod defaults;
pub mod discovery;
pub mod http;
pub mod logging;
pub mod startup;
pub mod tap;
pub mod token;
pub mod utils;
