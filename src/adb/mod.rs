pub mod apps;
pub mod command;
pub mod input;
pub mod keycodes;
pub mod locator;
pub mod media;
pub mod parse;
pub mod paths;
pub mod runner;
pub mod transfer;
pub mod transport;
