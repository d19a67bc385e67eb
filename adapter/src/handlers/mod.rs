//! Command handlers

pub mod doctor;
pub mod run;

pub use doctor::run_doctor;
pub use run::run_server;
