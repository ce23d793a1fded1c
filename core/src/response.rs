//! Domain response models and their type-erased view for middlewares.

use std::any::Any;
use std::fmt::Debug;

use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// One API operation's output, constructible from raw JSON text.
///
/// Most models delegate to [`from_json`]; a model with shape rules beyond
/// what its serde derive expresses checks them here.
pub trait ApiResponse: Debug + Send + Sized + 'static {
    fn from_json(raw: &str) -> Result<Self, ApiError>;
}

/// Deserialize `raw` into `T`, logging the failure.
pub fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, ApiError> {
    serde_json::from_str(raw).map_err(|e| {
        tracing::warn!(
            model = std::any::type_name::<T>(),
            error = %e,
            "failed to deserialize response"
        );
        ApiError::Deserialization(e)
    })
}

/// Type-erased response model handed to response middlewares.
///
/// Middlewares receive `&mut dyn ResponseModel`, so they can change field
/// values or swap in another value of the same type, but never replace the
/// model with a different type.
pub trait ResponseModel: Any + Debug + Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn model_name(&self) -> &'static str;
}

impl<T: ApiResponse> ResponseModel for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn model_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl dyn ResponseModel {
    pub fn is<T: ResponseModel>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: ResponseModel>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: ResponseModel>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}
