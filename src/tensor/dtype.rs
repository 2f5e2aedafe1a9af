//! Runtime element types and their compile-time counterparts

use std::fmt;

use half::f16;

use crate::tensor::storage::Storage;

/// Element type tag, numbered like the framework's `TensorProto.DataType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Undefined = 0,
    Float = 1,
    Int32 = 2,
    Byte = 3,
    String = 4,
    Bool = 5,
    Uint8 = 6,
    Int8 = 7,
    Uint16 = 8,
    Int16 = 9,
    Int64 = 10,
    Float16 = 12,
    Double = 13,
}

impl DataType {
    pub const ALL: [DataType; 13] = [
        DataType::Undefined,
        DataType::Float,
        DataType::Int32,
        DataType::Byte,
        DataType::String,
        DataType::Bool,
        DataType::Uint8,
        DataType::Int8,
        DataType::Uint16,
        DataType::Int16,
        DataType::Int64,
        DataType::Float16,
        DataType::Double,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|dt| dt.code() == code)
    }

    /// Parse the upper-case proto name, e.g. `FLOAT16`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|dt| dt.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Undefined => "UNDEFINED",
            DataType::Float => "FLOAT",
            DataType::Int32 => "INT32",
            DataType::Byte => "BYTE",
            DataType::String => "STRING",
            DataType::Bool => "BOOL",
            DataType::Uint8 => "UINT8",
            DataType::Int8 => "INT8",
            DataType::Uint16 => "UINT16",
            DataType::Int16 => "INT16",
            DataType::Int64 => "INT64",
            DataType::Float16 => "FLOAT16",
            DataType::Double => "DOUBLE",
        }
    }

    /// Whether tensors of this type can hold device storage
    pub fn has_storage(self) -> bool {
        !matches!(
            self,
            DataType::Undefined | DataType::Byte | DataType::String
        )
    }

    pub fn size_in_bytes(self) -> usize {
        match self {
            DataType::Bool | DataType::Uint8 | DataType::Int8 | DataType::Byte => 1,
            DataType::Uint16 | DataType::Int16 | DataType::Float16 => 2,
            DataType::Float | DataType::Int32 => 4,
            DataType::Int64 | DataType::Double => 8,
            DataType::Undefined | DataType::String => 0,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Widest representation of one element, used for conversions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// A type that can live in a tensor
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DataType;

    fn to_scalar(self) -> Scalar;
    fn from_scalar(value: Scalar) -> Self;

    fn slice(storage: &Storage) -> Option<&[Self]>;
    fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]>;
    fn into_storage(values: Vec<Self>) -> Storage;
}

/// Convert one element between types.
///
/// Numeric to numeric follows `as` semantics, numeric to bool is `x != 0`
/// and bool to numeric is `0`/`1`.
#[inline]
pub fn convert<S: Element, D: Element>(value: S) -> D {
    D::from_scalar(value.to_scalar())
}

macro_rules! impl_int_element {
    ($ty:ty, $dtype:expr, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DataType = $dtype;

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::Int(self as i64)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Int(v) => v as $ty,
                    Scalar::Float(v) => v as $ty,
                    Scalar::Bool(v) => v as $ty,
                }
            }

            fn slice(storage: &Storage) -> Option<&[Self]> {
                match storage {
                    Storage::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]> {
                match storage {
                    Storage::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_storage(values: Vec<Self>) -> Storage {
                Storage::$variant(values)
            }
        }
    };
}

impl_int_element!(i32, DataType::Int32, Int32);
impl_int_element!(u8, DataType::Uint8, Uint8);
impl_int_element!(i8, DataType::Int8, Int8);
impl_int_element!(u16, DataType::Uint16, Uint16);
impl_int_element!(i16, DataType::Int16, Int16);
impl_int_element!(i64, DataType::Int64, Int64);

macro_rules! impl_float_element {
    ($ty:ty, $dtype:expr, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DataType = $dtype;

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::Float(self as f64)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Int(v) => v as $ty,
                    Scalar::Float(v) => v as $ty,
                    Scalar::Bool(v) => {
                        if v {
                            1.0
                        } else {
                            0.0
                        }
                    }
                }
            }

            fn slice(storage: &Storage) -> Option<&[Self]> {
                match storage {
                    Storage::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]> {
                match storage {
                    Storage::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_storage(values: Vec<Self>) -> Storage {
                Storage::$variant(values)
            }
        }
    };
}

impl_float_element!(f32, DataType::Float, Float);
impl_float_element!(f64, DataType::Double, Double);

impl Element for bool {
    const DTYPE: DataType = DataType::Bool;

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::Int(v) => v != 0,
            Scalar::Float(v) => v != 0.0,
            Scalar::Bool(v) => v,
        }
    }

    fn slice(storage: &Storage) -> Option<&[Self]> {
        match storage {
            Storage::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]> {
        match storage {
            Storage::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn into_storage(values: Vec<Self>) -> Storage {
        Storage::Bool(values)
    }
}

impl Element for f16 {
    const DTYPE: DataType = DataType::Float16;

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Float(self.to_f64())
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::Int(v) => f16::from_f64(v as f64),
            Scalar::Float(v) => f16::from_f64(v),
            Scalar::Bool(v) => {
                if v {
                    f16::ONE
                } else {
                    f16::ZERO
                }
            }
        }
    }

    fn slice(storage: &Storage) -> Option<&[Self]> {
        match storage {
            Storage::Float16(v) => Some(v),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]> {
        match storage {
            Storage::Float16(v) => Some(v),
            _ => None,
        }
    }

    fn into_storage(values: Vec<Self>) -> Storage {
        Storage::Float16(values)
    }
}

/// Floating point elements; reduced precision computes through `f32`
pub trait FloatElement: Element {
    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
}

impl FloatElement for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        value
    }
}

impl FloatElement for f64 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        value as f64
    }
}

impl FloatElement for f16 {
    #[inline]
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }
}
