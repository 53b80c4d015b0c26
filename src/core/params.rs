//! Parameter normalization
//!
//! Every step receives its input as an ordered list of positional arguments.
//! Block results and caller-supplied initial arguments are canonicalized into
//! that list here.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::block::BlockError;

/// Ordered positional arguments passed to a block.
pub type Params = Vec<Value>;

/// Convert a block result into the parameter list for the next step.
///
/// - `Null` becomes an empty list.
/// - An array is returned as-is.
/// - Any other value is wrapped into a one-element list.
///
/// ```
/// use block_flow::core::normalize;
/// use serde_json::{json, Value};
///
/// assert!(normalize(Value::Null).is_empty());
/// assert_eq!(normalize(json!(3)), vec![json!(3)]);
/// assert_eq!(normalize(json!([1, "a"])), vec![json!(1), json!("a")]);
/// ```
pub fn normalize(value: Value) -> Params {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Conversion of initial engine arguments into a parameter list.
pub trait IntoParams {
    fn into_params(self) -> Params;
}

impl IntoParams for Params {
    fn into_params(self) -> Params {
        self
    }
}

impl<const N: usize> IntoParams for [Value; N] {
    fn into_params(self) -> Params {
        self.into()
    }
}

impl IntoParams for () {
    fn into_params(self) -> Params {
        Vec::new()
    }
}

impl IntoParams for Value {
    fn into_params(self) -> Params {
        normalize(self)
    }
}

impl IntoParams for Option<Value> {
    fn into_params(self) -> Params {
        self.map(normalize).unwrap_or_default()
    }
}

/// Read the positional argument at `index` as `T`.
pub fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> Result<T, BlockError> {
    let value = args.get(index).ok_or(BlockError::MissingArgument {
        index,
        arity: args.len(),
    })?;

    T::deserialize(value).map_err(|e| BlockError::InvalidArgument {
        index,
        reason: e.to_string(),
    })
}
