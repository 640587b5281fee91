pub mod contract;
pub mod scheduler;
