#![allow(dead_code)]

pub mod asserts;
pub mod fixtures;
pub mod steps;

pub use asserts::*;
pub use fixtures::*;
pub use steps::*;
