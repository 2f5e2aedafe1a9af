//! Named blob storage shared by the operators of a net

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{OpsError, OpsResult};
use crate::queue::BlobsQueue;
use crate::tensor::Tensor;

/// Value held by a workspace slot
#[derive(Debug, Default, Clone)]
pub enum Blob {
    #[default]
    Empty,
    Tensor(Tensor),
    Queue(Arc<BlobsQueue>),
}

impl Blob {
    pub fn kind(&self) -> &'static str {
        match self {
            Blob::Empty => "empty blob",
            Blob::Tensor(_) => "tensor",
            Blob::Queue(_) => "queue",
        }
    }
}

/// Shared handle to one workspace slot
pub type BlobRef = Arc<RwLock<Blob>>;

#[derive(Debug, Default)]
pub struct Workspace {
    blobs: HashMap<String, BlobRef>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing slot for `name`, or a new empty one
    pub fn create_blob(&mut self, name: &str) -> BlobRef {
        Arc::clone(
            self.blobs
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(Blob::Empty))),
        )
    }

    pub fn get_blob(&self, name: &str) -> OpsResult<BlobRef> {
        self.blobs
            .get(name)
            .cloned()
            .ok_or_else(|| OpsError::BlobNotFound(name.to_string()))
    }

    pub fn has_blob(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }

    pub fn remove_blob(&mut self, name: &str) -> bool {
        self.blobs.remove(name).is_some()
    }

    /// Sorted blob names
    pub fn blob_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blobs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn feed_tensor(&mut self, name: &str, tensor: Tensor) -> OpsResult<()> {
        let blob = self.create_blob(name);
        *blob.write()? = Blob::Tensor(tensor);
        Ok(())
    }

    /// Handle to the tensor stored under `name`. Pending device work writing
    /// it must be synchronized before reading the contents.
    pub fn fetch_tensor(&self, name: &str) -> OpsResult<Tensor> {
        let blob = self.get_blob(name)?;
        let guard = blob.read()?;
        match &*guard {
            Blob::Tensor(t) => Ok(t.clone()),
            _ => Err(OpsError::BlobType {
                name: name.to_string(),
                expected: "tensor",
            }),
        }
    }

    pub fn fetch_queue(&self, name: &str) -> OpsResult<Arc<BlobsQueue>> {
        let blob = self.get_blob(name)?;
        let guard = blob.read()?;
        match &*guard {
            Blob::Queue(q) => Ok(Arc::clone(q)),
            _ => Err(OpsError::BlobType {
                name: name.to_string(),
                expected: "queue",
            }),
        }
    }
}
