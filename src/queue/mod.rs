//! Producer/consumer queues of tensors

pub mod blobs_queue;

pub use blobs_queue::BlobsQueue;
