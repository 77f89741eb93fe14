//! RESP2 protocol support — wire codec and TCP client.

pub mod client;
pub mod codec;

pub use client::RespClient;
pub use codec::Value;
