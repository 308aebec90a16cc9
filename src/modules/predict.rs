use async_trait::async_trait;
use log::debug;

use crate::adapter::JsonAdapter;
use crate::filler::{FieldValues, Fill};
use crate::lm::LanguageModel;
use crate::modules::{Module, PredictError, Prediction};
use crate::signature::{Signature, SignatureError};

/// A direct prediction: format, one model call, parse.
#[derive(Debug, Clone)]
pub struct Predict {
    signature: Signature,
    adapter: JsonAdapter,
}

impl Predict {
    pub fn new(signature: Signature) -> Self {
        Self { signature, adapter: JsonAdapter }
    }

    pub fn parse(signature: &str) -> Result<Self, SignatureError> {
        Ok(Self::new(Signature::parse(signature)?))
    }

    /// Predict with several fillers sharing one prompt, e.g. the inputs plus a trajectory.
    pub(crate) async fn forward_with(
        &self,
        lm: &dyn LanguageModel,
        fillers: &[&(dyn Fill + Sync)],
    ) -> Result<Prediction, PredictError> {
        let messages = self.adapter.format(&self.signature, fillers)?;
        let reply = lm.chat(&messages).await?;
        debug!("{} replied to `{}`: {}", lm.model_name(), self.signature, reply);
        Ok(self.adapter.parse(&self.signature, &reply)?)
    }
}

#[async_trait]
impl Module for Predict {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn forward(&self, lm: &dyn LanguageModel, inputs: &FieldValues) -> Result<Prediction, PredictError> {
        let fillers: [&(dyn Fill + Sync); 1] = [inputs];
        self.forward_with(lm, &fillers).await
    }
}

#[cfg(test)]
mod test_predict {
    use super::Predict;
    use crate::filler::FieldValues;
    use crate::lm::testing::{block, ScriptedLm};
    use crate::lm::Role;
    use crate::modules::{Module, PredictError};

    #[tokio::test]
    async fn test_single_round_trip() {
        let lm = ScriptedLm::with(|messages| {
            assert_eq!(Role::System, messages[0].role);
            assert_eq!(Some("What is the capital of France?"), block(&messages[1].content, "question"));
            Ok(r#"{"answer": "Paris"}"#.to_string())
        });
        let qa = Predict::parse("question -> answer").unwrap();
        let inputs = FieldValues::new().with("question", "What is the capital of France?");
        let prediction = qa.forward(&lm, &inputs).await.unwrap();
        assert_eq!(Some("Paris"), prediction.get_str("answer"));
        assert_eq!(1, lm.calls());
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let lm = ScriptedLm::unreachable();
        let qa = Predict::parse("question -> answer").unwrap();
        let inputs = FieldValues::new().with("question", "anyone there?");
        let err = qa.forward(&lm, &inputs).await.unwrap_err();
        assert!(matches!(err, PredictError::Lm(_)));
        assert_eq!(1, lm.calls());
    }

    #[tokio::test]
    async fn test_unparsable_reply() {
        let lm = ScriptedLm::replying("Paris, obviously.");
        let qa = Predict::parse("question -> answer").unwrap();
        let inputs = FieldValues::new().with("question", "capital of France?");
        let err = qa.forward(&lm, &inputs).await.unwrap_err();
        assert!(matches!(err, PredictError::Adapter(_)));
    }
}
