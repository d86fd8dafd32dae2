// Network module
//
// Transport for talking to other nodes: the HTTP peer client used by
// consensus and broadcasts, and neighbor reachability probing.

pub mod client;
pub mod neighbors;

pub use client::HttpPeerClient;
pub use neighbors::Neighbors;
