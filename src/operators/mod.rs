//! Concrete operators and their registration

pub mod cast;
pub mod cosine_embedding_criterion;
pub mod lrn;
pub mod math;
pub mod queue;
pub mod reverse_packed_segs;
pub mod softplus;

pub use cast::CastOp;
pub use cosine_embedding_criterion::{CosineEmbeddingCriterionGradientOp, CosineEmbeddingCriterionOp};
pub use lrn::{LrnGradientOp, LrnOp};
pub use math::{PowFunctor, SignFunctor, SqrFunctor};
pub use queue::{
    CloseBlobsQueueOp, CreateBlobsQueueOp, DequeueBlobsOp, EnqueueBlobsOp, SafeDequeueBlobsOp,
    SafeEnqueueBlobsOp,
};
pub use reverse_packed_segs::ReversePackedSegsOp;
pub use softplus::{SoftplusFunctor, SoftplusGradientOp};

use crate::error::OpsResult;
use crate::ops::{create_unary_op, DeviceKind, OperatorRegistry, OperatorSchema};

const ANY: usize = usize::MAX;

/// Register every operator of this crate, each exactly once
pub fn register_hip_operators(registry: &mut OperatorRegistry) -> OpsResult<()> {
    use DeviceKind::{Hip, Miopen};

    let unary = OperatorSchema::exact(1, 1);
    registry.register("Sqr", Hip, unary, create_unary_op::<SqrFunctor>)?;
    registry.register("Sign", Hip, unary, create_unary_op::<SignFunctor>)?;
    registry.register("Pow", Hip, unary, create_unary_op::<PowFunctor>)?;
    registry.register("Softplus", Hip, unary, create_unary_op::<SoftplusFunctor>)?;
    registry.register(
        "SoftplusGradient",
        Hip,
        OperatorSchema::exact(2, 1),
        softplus::create_softplus_gradient,
    )?;
    registry.register("Cast", Hip, unary, cast::create_cast)?;
    registry.register(
        "CosineEmbeddingCriterion",
        Hip,
        OperatorSchema::exact(2, 1),
        cosine_embedding_criterion::create_cosine_embedding_criterion,
    )?;
    registry.register(
        "CosineEmbeddingCriterionGradient",
        Hip,
        OperatorSchema::exact(3, 1),
        cosine_embedding_criterion::create_cosine_embedding_criterion_gradient,
    )?;
    registry.register(
        "ReversePackedSegs",
        Hip,
        OperatorSchema::exact(2, 1),
        reverse_packed_segs::create_reverse_packed_segs,
    )?;

    registry.register("LRN", Miopen, unary, lrn::create_lrn)?;
    registry.register(
        "LRNGradient",
        Miopen,
        OperatorSchema::exact(3, 1),
        lrn::create_lrn_gradient,
    )?;

    registry.register(
        "CreateBlobsQueue",
        Hip,
        OperatorSchema::exact(0, 1),
        queue::create_create_blobs_queue,
    )?;
    registry.register(
        "EnqueueBlobs",
        Hip,
        OperatorSchema::range((2, ANY), (1, ANY)),
        queue::create_enqueue_blobs,
    )?;
    registry.register(
        "DequeueBlobs",
        Hip,
        OperatorSchema::range((1, 1), (1, ANY)),
        queue::create_dequeue_blobs,
    )?;
    registry.register(
        "CloseBlobsQueue",
        Hip,
        OperatorSchema::exact(1, 0),
        queue::create_close_blobs_queue,
    )?;
    registry.register(
        "SafeEnqueueBlobs",
        Hip,
        OperatorSchema::range((2, ANY), (2, ANY)),
        queue::create_safe_enqueue_blobs,
    )?;
    registry.register(
        "SafeDequeueBlobs",
        Hip,
        OperatorSchema::range((1, 1), (2, ANY)),
        queue::create_safe_dequeue_blobs,
    )?;

    tracing::debug!(operators = registry.len(), "registered HIP operators");
    Ok(())
}
