pub mod bootstrap_steps;
pub mod lifecycle_steps;
pub mod retry_steps;
