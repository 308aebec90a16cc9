use async_trait::async_trait;

use crate::filler::{FieldValues, Fill};
use crate::lm::LanguageModel;
use crate::modules::{Module, Predict, PredictError, Prediction};
use crate::signature::{Field, Signature, SignatureError};

pub const REASONING_FIELD: &str = "reasoning";

/// Step-by-step prediction: the model writes its `reasoning` before the declared outputs, in the same reply.
#[derive(Debug, Clone)]
pub struct ChainOfThought {
    signature: Signature,
    predict: Predict,
}

impl ChainOfThought {
    pub fn new(signature: Signature) -> Result<Self, SignatureError> {
        let extended = signature.clone().prepend_output(
            Field::str(REASONING_FIELD).with_desc("Think step by step in order to produce the outputs."),
        )?;
        Ok(Self { signature, predict: Predict::new(extended) })
    }

    pub fn parse(signature: &str) -> Result<Self, SignatureError> {
        Self::new(Signature::parse(signature)?)
    }

    pub(crate) async fn forward_with(
        &self,
        lm: &dyn LanguageModel,
        fillers: &[&(dyn Fill + Sync)],
    ) -> Result<Prediction, PredictError> {
        self.predict.forward_with(lm, fillers).await
    }
}

#[async_trait]
impl Module for ChainOfThought {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn forward(&self, lm: &dyn LanguageModel, inputs: &FieldValues) -> Result<Prediction, PredictError> {
        self.predict.forward(lm, inputs).await
    }
}

#[cfg(test)]
mod test_chain_of_thought {
    use super::ChainOfThought;
    use crate::filler::FieldValues;
    use crate::lm::testing::ScriptedLm;
    use crate::modules::{Module, PredictError};

    #[tokio::test]
    async fn test_reasoning_comes_first() {
        let lm = ScriptedLm::with(|messages| {
            let system = &messages[0].content;
            let reasoning = system.find("\"reasoning\"").unwrap();
            let summary = system.find("\"summary\"").unwrap();
            assert!(reasoning < summary);
            Ok(r#"{"reasoning": "It is about a cat.", "summary": "A cat sat on a mat."}"#.to_string())
        });
        let summarize = ChainOfThought::parse("text -> summary").unwrap();
        assert_eq!(vec!["summary"], summarize.signature().output_names());

        let inputs = FieldValues::new().with("text", "The cat, which was grey, sat down on the mat.");
        let prediction = summarize.forward(&lm, &inputs).await.unwrap();
        assert_eq!(Some("A cat sat on a mat."), prediction.get_str("summary"));
        assert_eq!(Some("It is about a cat."), prediction.get_str("reasoning"));
        assert_eq!(1, lm.calls());
    }

    #[tokio::test]
    async fn test_missing_reasoning_is_an_error() {
        let lm = ScriptedLm::replying(r#"{"summary": "short"}"#);
        let summarize = ChainOfThought::parse("text -> summary").unwrap();
        let inputs = FieldValues::new().with("text", "long text");
        let err = summarize.forward(&lm, &inputs).await.unwrap_err();
        assert!(matches!(err, PredictError::Adapter(_)));
    }

    #[test]
    fn test_reasoning_name_is_reserved() {
        assert!(ChainOfThought::parse("text -> reasoning").is_err());
    }
}
