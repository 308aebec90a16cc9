//! # Prediction programs
//!
//! A program owns a [Signature] and turns input [FieldValues] into a [Prediction] with one or more calls to a
//! [LanguageModel]:
//!
//! * [Predict]: one round trip.
//! * [ChainOfThought]: one round trip, with a `reasoning` output the model fills before the declared outputs.
//! * [ReAct]: a bounded loop of tool picks followed by an extraction round trip.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::adapter::AdapterError;
use crate::filler::FieldValues;
use crate::lm::{LanguageModel, LmError};
use crate::signature::Signature;
use crate::utils::JsonMap;

pub mod predict;
pub mod chain_of_thought;
pub mod react;
pub mod tool;

pub use chain_of_thought::ChainOfThought;
pub use predict::Predict;
pub use react::{ReAct, Trajectory};
pub use tool::Tool;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Lm(#[from] LmError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Output field values of one prediction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    fields: JsonMap,
}

impl Prediction {
    pub(crate) fn from_map(fields: JsonMap) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(Value::as_i64)
    }
}

#[async_trait]
pub trait Module: Send + Sync {
    fn signature(&self) -> &Signature;

    async fn forward(&self, lm: &dyn LanguageModel, inputs: &FieldValues) -> Result<Prediction, PredictError>;
}
