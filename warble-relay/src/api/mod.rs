pub mod greeting;
pub mod v1;
