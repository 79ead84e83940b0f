pub mod consensus;
pub mod run;
pub mod select;
