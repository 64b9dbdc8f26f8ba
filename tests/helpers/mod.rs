// Test Helper Modules
//
// Shared fixtures for unit, integration and contract tests. Include with:
//
//   #[path = "../helpers/mod.rs"]
//   mod helpers;
//
// In-memory stores are used everywhere except `test_database`, which
// connects to a real MySQL instance for the ignored repository tests.

#![allow(dead_code)]

pub mod test_server;

pub use test_data::*;
pub use test_database::*;
pub use test_server::*;
