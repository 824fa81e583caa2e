//! Parameter resolution for named and positional calling conventions
//!
//! JSON-RPC lets a caller pass parameters either by name (an object) or by
//! position (an array). Method authors describe their parameters once, as a
//! `Deserialize` struct, and add a [`FromPositional`] implementation that maps
//! array positions to fields. [`parse_params`] picks the right path.
//!
//! `#[derive(FromPositional)]` from `jrpc2-macros` writes the positional
//! mapping for structs, using field declaration order.
//!
//! # Examples
//!
//! ```rust
//! use jrpc2_core::params::{self, FromPositional, ParamsError};
//! use serde::Deserialize;
//! use serde_json::{json, Value};
//!
//! #[derive(Deserialize)]
//! struct Subtract { minuend: f64, subtrahend: f64 }
//!
//! impl FromPositional for Subtract {
//!     fn from_positional(values: Vec<Value>) -> Result<Self, ParamsError> {
//!         params::expect_len(&values, 2)?;
//!         Ok(Subtract {
//!             minuend: params::decode_at(&values, 0)?,
//!             subtrahend: params::decode_at(&values, 1)?,
//!         })
//!     }
//! }
//!
//! let by_name: Subtract = params::parse_params(Some(json!({"minuend": 42, "subtrahend": 23}))).unwrap();
//! let by_position: Subtract = params::parse_params(Some(json!([42, 23]))).unwrap();
//! assert_eq!(by_name.minuend - by_name.subtrahend, 19.0);
//! assert_eq!(by_position.minuend - by_position.subtrahend, 19.0);
//! ```

use crate::error::ErrorObject;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Why a positional parameter list could not be mapped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    /// Wrong number of positional parameters
    #[error("expected {expected} positional params, got {actual}")]
    Count {
        /// Number the method takes
        expected: usize,
        /// Number that was sent
        actual: usize,
    },

    /// A positional parameter had the wrong type
    #[error("param {index}: {message}")]
    Type {
        /// Zero-based position
        index: usize,
        /// Decoder diagnostic
        message: String,
    },

    /// Any other method-specific failure
    #[error("{0}")]
    Custom(String),
}

impl From<ParamsError> for ErrorObject {
    fn from(err: ParamsError) -> Self {
        ErrorObject::invalid_params().with_detail(err.to_string())
    }
}

/// Build a parameter structure from an ordered list of values
pub trait FromPositional: Sized {
    /// Map positions to fields; fail on a count or type mismatch
    fn from_positional(values: Vec<Value>) -> Result<Self, ParamsError>;
}

/// Fail unless exactly `expected` values were sent
pub fn expect_len(values: &[Value], expected: usize) -> Result<(), ParamsError> {
    if values.len() != expected {
        return Err(ParamsError::Count {
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Decode the value at `index`
pub fn decode_at<T: DeserializeOwned>(values: &[Value], index: usize) -> Result<T, ParamsError> {
    let value = values.get(index).cloned().ok_or(ParamsError::Count {
        expected: index + 1,
        actual: values.len(),
    })?;
    decode_value(value, index)
}

/// Decode an owned value that came from position `index`
pub fn decode_value<T: DeserializeOwned>(value: Value, index: usize) -> Result<T, ParamsError> {
    serde_json::from_value(value).map_err(|e| ParamsError::Type {
        index,
        message: e.to_string(),
    })
}

/// Resolve a raw parameter payload into `P`
///
/// - an array goes through [`FromPositional`]
/// - an object (or any other non-array value) goes through `Deserialize`
/// - an absent payload is decoded from `null`, so `()` and `Option<T>`
///   parameter types accept calls without params
///
/// Failure is an Invalid params error whose `data` is the diagnostic of the
/// path that was taken.
pub fn parse_params<P>(params: Option<Value>) -> Result<P, ErrorObject>
where
    P: DeserializeOwned + FromPositional,
{
    match params {
        Some(Value::Array(values)) => P::from_positional(values).map_err(ErrorObject::from),
        Some(named) => serde_json::from_value(named)
            .map_err(|e| ErrorObject::invalid_params().with_detail(e.to_string())),
        None => serde_json::from_value(Value::Null)
            .map_err(|e| ErrorObject::invalid_params().with_detail(e.to_string())),
    }
}

/// Resolve a homogeneous positional payload such as `[1, 2, 3]`
pub fn positional<T: DeserializeOwned>(params: Option<Value>) -> Result<Vec<T>, ErrorObject> {
    match params {
        Some(Value::Array(values)) => values
            .into_iter()
            .enumerate()
            .map(|(index, value)| decode_value(value, index))
            .collect::<Result<Vec<T>, ParamsError>>()
            .map_err(ErrorObject::from),
        Some(_) => Err(ErrorObject::invalid_params().with_detail("params must be an array")),
        None => Ok(Vec::new()),
    }
}

impl FromPositional for () {
    fn from_positional(values: Vec<Value>) -> Result<Self, ParamsError> {
        expect_len(&values, 0)
    }
}

impl FromPositional for Value {
    fn from_positional(values: Vec<Value>) -> Result<Self, ParamsError> {
        Ok(Value::Array(values))
    }
}

impl<T: DeserializeOwned> FromPositional for Vec<T> {
    fn from_positional(values: Vec<Value>) -> Result<Self, ParamsError> {
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| decode_value(value, index))
            .collect()
    }
}

impl<T: FromPositional> FromPositional for Option<T> {
    fn from_positional(values: Vec<Value>) -> Result<Self, ParamsError> {
        T::from_positional(values).map(Some)
    }
}

macro_rules! tuple_from_positional {
    ($len:expr => $($name:ident $index:tt),+) => {
        impl<$($name: DeserializeOwned),+> FromPositional for ($($name,)+) {
            fn from_positional(values: Vec<Value>) -> Result<Self, ParamsError> {
                expect_len(&values, $len)?;
                Ok(($(decode_at::<$name>(&values, $index)?,)+))
            }
        }
    };
}

tuple_from_positional!(1 => A 0);
tuple_from_positional!(2 => A 0, B 1);
tuple_from_positional!(3 => A 0, B 1, C 2);
tuple_from_positional!(4 => A 0, B 1, C 2, D 3);
