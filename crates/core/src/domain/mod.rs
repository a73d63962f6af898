pub mod context;
pub mod mode;
pub mod phase;
pub mod session;
