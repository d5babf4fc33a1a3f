pub mod adapter;
pub mod artifacts;
pub mod classify;
pub mod compare;
pub mod fixtures;
pub mod report;
pub mod runner;
pub mod suite;
pub mod types;
