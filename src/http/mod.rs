pub mod encoding;
pub mod response;
pub mod server;
