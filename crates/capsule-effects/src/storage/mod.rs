//! Content storage handlers

pub mod http;
pub mod memory;

pub use http::{HttpGateway, HttpUploader};
pub use memory::{MemoryGateway, MemoryNetwork, MemoryUploader};
