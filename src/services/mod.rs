//! Service layer: SDK seams (`ObjectStore`, `QueueClient`), their AWS
//! implementations, and the services the HTTP handlers call.

pub mod error;
pub mod object_store;
pub mod payload_offload;
pub mod queue_client;
pub mod queue_service;
pub mod storage_service;
