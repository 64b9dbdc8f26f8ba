pub mod allocation_calculator;

pub use allocation_calculator::{AllocationCalculator, Share};
