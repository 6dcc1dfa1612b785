pub mod billing;
pub mod gateway;
pub mod lifecycle;
