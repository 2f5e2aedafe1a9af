//! `Cast`: convert every element of `X` to the type named by `to`
//!
//! The conversion body is chosen once, when the operator is built. Each body
//! then dispatches on the source type at run time. Only `FLOAT` and `FLOAT16`
//! destinations accept `FLOAT16` sources.

use std::sync::Arc;

use half::f16;

use crate::backend::hip_backend::HipContext;
use crate::dispatch_types;
use crate::error::{OpsError, OpsResult};
use crate::kernels::launch_cast;
use crate::ops::{ArgValue, Operator, OperatorBase, OperatorDef, Workspace};
use crate::tensor::{DataType, Element, Tensor};

type CastBody = fn(&HipContext, &Tensor, &mut Tensor) -> OpsResult<()>;

fn run_cast<S: Element, D: Element>(ctx: &HipContext, x: &Tensor, y: &mut Tensor) -> OpsResult<()> {
    let input = x.data::<S>()?;
    let output = y.mutable_data::<D>()?;
    launch_cast(ctx, x.size(), input, output)?;
    Ok(())
}

fn cast_to<D: Element>(ctx: &HipContext, x: &Tensor, y: &mut Tensor) -> OpsResult<()> {
    dispatch_types!(
        x.dtype(),
        "Cast",
        [f32, i32, bool, u8, i8, u16, i16, i64, f64],
        S => { run_cast::<S, D>(ctx, x, y) }
    )
}

fn cast_to_float(ctx: &HipContext, x: &Tensor, y: &mut Tensor) -> OpsResult<()> {
    dispatch_types!(
        x.dtype(),
        "Cast",
        [f32, f16, i32, bool, u8, i8, u16, i16, i64, f64],
        S => { run_cast::<S, f32>(ctx, x, y) }
    )
}

fn cast_to_half(ctx: &HipContext, x: &Tensor, y: &mut Tensor) -> OpsResult<()> {
    dispatch_types!(x.dtype(), "Cast", [f32, f16], S => { run_cast::<S, f16>(ctx, x, y) })
}

/// Destination type from the `to` argument, given as a type code or name
pub fn destination_type(def: &OperatorDef) -> OpsResult<DataType> {
    let unexpected = |value: &dyn std::fmt::Debug| {
        OpsError::InvalidArgument(format!("Unexpected 'to' argument value: {:?}", value))
    };
    let to = match def.arg("to") {
        None => DataType::Undefined,
        Some(ArgValue::Int(code)) => DataType::from_code(*code).ok_or_else(|| unexpected(code))?,
        Some(ArgValue::Str(name)) => DataType::from_name(name).ok_or_else(|| unexpected(name))?,
        Some(other) => return Err(unexpected(other)),
    };
    Ok(to)
}

fn select_body(to: DataType) -> OpsResult<CastBody> {
    let body: CastBody = match to {
        DataType::Float => cast_to_float,
        DataType::Int32 => cast_to::<i32>,
        DataType::Bool => cast_to::<bool>,
        DataType::Uint8 => cast_to::<u8>,
        DataType::Int8 => cast_to::<i8>,
        DataType::Uint16 => cast_to::<u16>,
        DataType::Int16 => cast_to::<i16>,
        DataType::Int64 => cast_to::<i64>,
        DataType::Float16 => cast_to_half,
        DataType::Double => cast_to::<f64>,
        DataType::Byte => {
            return Err(OpsError::InvalidArgument("BYTE is deprecated".to_string()));
        }
        DataType::String => {
            return Err(OpsError::Unimplemented(
                "Casting to and from strings is not supported yet".to_string(),
            ));
        }
        DataType::Undefined => {
            return Err(OpsError::MissingArgument(
                "Cast op must have 'to' argument of type DataType".to_string(),
            ));
        }
    };
    Ok(body)
}

pub struct CastOp {
    base: OperatorBase,
    to: DataType,
    body: CastBody,
}

impl CastOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        let to = destination_type(def)?;
        let body = select_body(to)?;
        Ok(CastOp {
            base: OperatorBase::new(def, ws, context)?,
            to,
            body,
        })
    }

    pub fn to(&self) -> DataType {
        self.to
    }
}

impl Operator for CastOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let x = self.base.input(0)?;
        let mut y = self.base.output(0)?;
        y.resize_like(&x);
        (self.body)(self.base.context(), &x, &mut y)?;
        self.base.set_output(0, y)
    }
}

pub fn create_cast(
    def: &OperatorDef,
    ws: &mut Workspace,
    context: Arc<HipContext>,
) -> OpsResult<Box<dyn Operator>> {
    Ok(Box::new(CastOp::new(def, ws, context)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_by_code_and_name() {
        let def = OperatorDef::new("Cast", &["X"], &["Y"]).with_arg("to", 10);
        assert_eq!(destination_type(&def).unwrap(), DataType::Int64);
        let def = OperatorDef::new("Cast", &["X"], &["Y"]).with_arg("to", "float16");
        assert_eq!(destination_type(&def).unwrap(), DataType::Float16);
    }

    #[test]
    fn test_body_selection_errors() {
        assert!(matches!(
            select_body(DataType::Byte),
            Err(OpsError::InvalidArgument(msg)) if msg == "BYTE is deprecated"
        ));
        assert!(matches!(
            select_body(DataType::String),
            Err(OpsError::Unimplemented(_))
        ));
        assert!(matches!(
            select_body(DataType::Undefined),
            Err(OpsError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_unknown_code_rejected() {
        let def = OperatorDef::new("Cast", &["X"], &["Y"]).with_arg("to", 11);
        assert!(matches!(
            destination_type(&def),
            Err(OpsError::InvalidArgument(_))
        ));
        let def = OperatorDef::new("Cast", &["X"], &["Y"]).with_arg("to", 2.5);
        assert!(matches!(
            destination_type(&def),
            Err(OpsError::InvalidArgument(_))
        ));
    }
}
