//! Operator framework: descriptors, workspace, dispatch, adapters, registry

pub mod def;
pub mod dispatch;
pub mod elementwise;
pub mod net;
pub mod operator;
pub mod registry;
pub mod workspace;

pub use def::{ArgValue, Argument, DeviceKind, FromArgument, OperatorDef};
pub use elementwise::{create_unary_op, UnaryElementwiseOp, UnaryFunctor};
pub use net::{tensor_values_f64, Net, NetDef, TensorFill};
pub use operator::{Operator, OperatorBase, OperatorSchema};
pub use registry::{OperatorCreator, OperatorRegistry};
pub use workspace::{Blob, BlobRef, Workspace};
