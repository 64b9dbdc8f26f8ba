pub mod settlement_controller;

pub use settlement_controller::configure;
