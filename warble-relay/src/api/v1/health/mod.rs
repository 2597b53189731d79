pub mod basic;
pub mod detailed;
