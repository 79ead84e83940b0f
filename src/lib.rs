pub mod catalog;
pub mod cli;
pub mod commands;
pub mod consensus;
pub mod segment;
pub mod selection;
pub mod tools;
pub mod utils;
