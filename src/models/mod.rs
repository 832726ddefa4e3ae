pub mod credentials;
pub mod platform;
pub mod remote;
