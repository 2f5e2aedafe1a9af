//! Shared fixtures for operator tests
//!
//! - One registry holding every operator, built once
//! - A shared device context for tests that only check results
//! - Fresh contexts for tests that fault a stream or count launches
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::OpHarness;
//!
//! #[test]
//! fn my_op_test() {
//!     let mut h = OpHarness::shared();
//!     h.feed("X", Tensor::from_vec(&[2], vec![1.0f32, 2.0]).unwrap());
//!     h.run(&OperatorDef::new("Sqr", &["X"], &["Y"])).unwrap();
//!     assert_eq!(h.fetch_vec::<f32>("Y"), vec![1.0, 4.0]);
//! }
//! ```

#![allow(dead_code)]

pub mod tempfile_helpers;

use std::sync::Arc;

use hipops::tensor::Element;
use hipops::{
    DeviceConfig, HipContext, Operator, OperatorDef, OperatorRegistry, OpsResult, Tensor, Workspace,
};
use once_cell::sync::Lazy;
pub use serial_test::serial;

pub static REGISTRY: Lazy<OperatorRegistry> = Lazy::new(|| {
    OperatorRegistry::with_hip_operators().expect("operator registration failed")
});

/// Context shared by result-only tests. Never fault it.
pub static SHARED_CONTEXT: Lazy<Arc<HipContext>> = Lazy::new(|| {
    hipops::logging::init_logging_default();
    Arc::new(HipContext::new(DeviceConfig::default()).expect("emulated device unavailable"))
});

pub fn fresh_context() -> Arc<HipContext> {
    fresh_context_with(DeviceConfig::default())
}

pub fn fresh_context_with(config: DeviceConfig) -> Arc<HipContext> {
    Arc::new(HipContext::new(config).expect("emulated device unavailable"))
}

/// Workspace plus context for driving operators one at a time
pub struct OpHarness {
    pub ws: Workspace,
    pub ctx: Arc<HipContext>,
}

impl OpHarness {
    pub fn shared() -> Self {
        Self::with_context(Arc::clone(&SHARED_CONTEXT))
    }

    pub fn fresh() -> Self {
        Self::with_context(fresh_context())
    }

    pub fn with_context(ctx: Arc<HipContext>) -> Self {
        OpHarness {
            ws: Workspace::new(),
            ctx,
        }
    }

    pub fn feed(&mut self, name: &str, tensor: Tensor) {
        self.ws.feed_tensor(name, tensor).expect("feed failed");
    }

    pub fn feed_vec<T: Element>(&mut self, name: &str, dims: &[usize], values: Vec<T>) {
        self.feed(name, Tensor::from_vec(dims, values).expect("bad test tensor"));
    }

    /// Create the operator from the shared registry
    pub fn create(&mut self, def: &OperatorDef) -> OpsResult<Box<dyn Operator>> {
        REGISTRY.create_operator(def, &mut self.ws, Arc::clone(&self.ctx))
    }

    /// Create, run once and wait for the device
    pub fn run(&mut self, def: &OperatorDef) -> OpsResult<()> {
        let mut op = self.create(def)?;
        op.run()?;
        self.ctx.synchronize()?;
        Ok(())
    }

    pub fn fetch(&self, name: &str) -> Tensor {
        self.ws.fetch_tensor(name).expect("blob missing")
    }

    pub fn fetch_vec<T: Element>(&self, name: &str) -> Vec<T> {
        self.fetch(name).to_vec::<T>().expect("blob has another type")
    }
}

pub fn assert_close(actual: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tol * (1.0 + e.abs()),
            "index {}: got {}, expected {}",
            i,
            a,
            e
        );
    }
}
