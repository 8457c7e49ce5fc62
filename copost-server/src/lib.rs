pub mod http;
pub mod router;
pub mod server;
pub mod services;
pub mod subsystems;

pub use services::Services;
