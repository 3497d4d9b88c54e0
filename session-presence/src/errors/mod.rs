pub mod config_error;
pub mod session_error;
pub mod store_error;
pub mod terminate_error;
