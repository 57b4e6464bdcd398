pub mod bugzilla;
pub mod client;
pub mod http;
