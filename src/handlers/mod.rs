// Handlers module

pub mod chat;
pub mod health;
pub mod socket;
pub mod upload;

pub use chat::chat_handler;
pub use health::health_handler;
pub use socket::run_socket;
pub use upload::upload_handler;
