pub mod cohort;
pub mod config;
pub mod domains;
