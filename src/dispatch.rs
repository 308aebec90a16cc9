//! # Operation dispatch
//!
//! Maps a submitted operation name to its required fields and prediction program, validates the request,
//! runs the program under a timeout and renders the result as text.
//!
//! | Operation      | Required fields         | Program                                          |
//! |----------------|-------------------------|--------------------------------------------------|
//! | `count_letter` | `word`, `letter`        | [ReAct] over `word, letter -> answer: int` with the `count_letter` tool |
//! | `summarize`    | `text`                  | [ChainOfThought] over `text -> summary`          |
//! | `translate`    | `text`, `target_language` | [ChainOfThought] over `text, target_language -> translation` |
//! | `qa`           | `question`              | [Predict] over `question -> answer`              |

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde_json::{json, Value};
use thiserror::Error;

use crate::filler::FieldValues;
use crate::lm::LanguageModel;
use crate::modules::tool::str_arg;
use crate::modules::{ChainOfThought, Module, Predict, PredictError, Prediction, ReAct, Tool};
use crate::signature::Signature;
use crate::utils::JsonMap;

/// Form key carrying the operation name.
pub const FUNCTION_FIELD: &str = "function";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CountLetter,
    Summarize,
    Translate,
    Qa,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Operation::CountLetter, Operation::Summarize, Operation::Translate, Operation::Qa];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::CountLetter => "count_letter",
            Operation::Summarize => "summarize",
            Operation::Translate => "translate",
            Operation::Qa => "qa",
        }
    }

    /// Human readable name for the operation picker.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::CountLetter => "Count Letter",
            Operation::Summarize => "Summarize Text",
            Operation::Translate => "Translate Text",
            Operation::Qa => "Basic Q&A",
        }
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Operation::CountLetter => &["word", "letter"],
            Operation::Summarize => &["text"],
            Operation::Translate => &["text", "target_language"],
            Operation::Qa => &["question"],
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| DispatchError::InvalidOperation(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown operation {0:?}")]
    InvalidOperation(String),
    #[error("field `{field}` {reason}")]
    MissingField { field: String, reason: &'static str },
    #[error("prediction backend unavailable: {0}")]
    BackendUnavailable(#[from] BackendError),
}

impl DispatchError {
    /// Whether the request itself was at fault, as opposed to the backend.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, DispatchError::BackendUnavailable(_))
    }

    fn missing(field: &str, reason: &'static str) -> Self {
        DispatchError::MissingField { field: field.to_string(), reason }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Predict(#[from] PredictError),
    #[error("no reply within {0:?}")]
    TimedOut(Duration),
    #[error("prediction has no `{0}` output")]
    MissingOutput(&'static str),
}

/// A validated request. Holds exactly the fields its operation requires, in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[readonly::make]
pub struct OperationRequest {
    #[readonly]
    pub operation: Operation,
    #[readonly]
    pub fields: FieldValues,
}

impl OperationRequest {
    /// Validate `fields` against the operation. Fields the operation does not declare are dropped.
    pub fn new(operation: Operation, fields: &FieldValues) -> Result<Self, DispatchError> {
        let mut validated = FieldValues::new();
        for &name in operation.required_fields() {
            let value = fields.get(name).ok_or_else(|| DispatchError::missing(name, "is required"))?;
            if value.trim().is_empty() {
                return Err(DispatchError::missing(name, "must not be empty"));
            }
            if operation == Operation::CountLetter && name == "letter" && value.chars().count() != 1 {
                return Err(DispatchError::missing(name, "must be exactly one character"));
            }
            validated.insert(name, value);
        }
        for extra in fields.names().iter().filter(|n| !operation.required_fields().contains(&n.as_str())) {
            debug!("ignoring field `{}` not used by {}", extra, operation);
        }
        Ok(Self { operation, fields: validated })
    }

    /// Build a request from a submitted form: `function` names the operation, the rest are its fields.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, DispatchError> {
        let name = form
            .get(FUNCTION_FIELD)
            .ok_or_else(|| DispatchError::missing(FUNCTION_FIELD, "is required"))?;
        let operation: Operation = name.trim().parse()?;
        let fields: FieldValues = form
            .iter()
            .filter(|(k, _)| k.as_str() != FUNCTION_FIELD)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        Self::new(operation, &fields)
    }

    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).unwrap_or_default()
    }
}

/// Text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult(String);

impl OperationResult {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Case-insensitive count of non-overlapping occurrences of `letter` in `word`.
pub fn count_letter(word: &str, letter: char) -> usize {
    let letter: String = letter.to_lowercase().collect();
    word.to_lowercase().matches(letter.as_str()).count()
}

fn count_letter_tool() -> Tool {
    let mut args = JsonMap::new();
    args.insert("word".to_string(), json!({"type": "string"}));
    args.insert("letter".to_string(), json!({"type": "string"}));
    Tool::new(
        "count_letter",
        "Counts how many times a single letter occurs in a word, ignoring case.",
        args,
        |args| {
            let word = str_arg(args, "word")?;
            let letter = str_arg(args, "letter")?;
            let mut chars = letter.chars();
            match (chars.next(), chars.next()) {
                (Some(letter), None) => Ok(Value::from(count_letter(word, letter))),
                _ => anyhow::bail!("`letter` must be exactly one character, got {:?}", letter),
            }
        },
    )
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Upper bound on one whole dispatch, all model calls included.
    pub timeout: Duration,
    pub react_max_iters: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(60), react_max_iters: 1 }
    }
}

/// Runs validated requests against one language model. Holds no mutable state and is shared across requests.
pub struct Dispatcher {
    lm: Arc<dyn LanguageModel>,
    options: DispatchOptions,
    count_letter: ReAct,
    summarize: ChainOfThought,
    translate: ChainOfThought,
    qa: Predict,
}

impl Dispatcher {
    pub fn new(lm: Arc<dyn LanguageModel>, options: DispatchOptions) -> anyhow::Result<Self> {
        let count_letter = ReAct::new(
            Signature::parse("word, letter -> answer: int")?
                .with_instructions("Count how many times the letter occurs in the word, ignoring case.")
                .describe("answer", "number of occurrences of the letter in the word"),
            vec![count_letter_tool()],
            options.react_max_iters,
        )?;
        Ok(Self {
            lm,
            count_letter,
            summarize: ChainOfThought::parse("text -> summary")?,
            translate: ChainOfThought::parse("text, target_language -> translation")?,
            qa: Predict::parse("question -> answer")?,
            options,
        })
    }

    pub fn model_name(&self) -> &str {
        self.lm.model_name()
    }

    fn program(&self, operation: Operation) -> &dyn Module {
        match operation {
            Operation::CountLetter => &self.count_letter,
            Operation::Summarize => &self.summarize,
            Operation::Translate => &self.translate,
            Operation::Qa => &self.qa,
        }
    }

    pub async fn dispatch(&self, request: &OperationRequest) -> Result<OperationResult, DispatchError> {
        let operation = request.operation;
        info!("dispatching {} to {}", operation, self.lm.model_name());
        let started = Instant::now();
        let forward = self.program(operation).forward(self.lm.as_ref(), &request.fields);
        let prediction = match tokio::time::timeout(self.options.timeout, forward).await {
            Ok(Ok(prediction)) => prediction,
            Ok(Err(e)) => {
                warn!("{} failed after {:?}: {}", operation, started.elapsed(), e);
                return Err(BackendError::from(e).into());
            }
            Err(_) => {
                warn!("{} timed out after {:?}", operation, self.options.timeout);
                return Err(BackendError::TimedOut(self.options.timeout).into());
            }
        };
        let result = render(request, &prediction)?;
        info!("{} finished in {:?}", operation, started.elapsed());
        Ok(result)
    }

    /// Validate a submitted form and dispatch it.
    pub async fn dispatch_form(&self, form: &HashMap<String, String>) -> Result<OperationResult, DispatchError> {
        let request = OperationRequest::from_form(form)?;
        self.dispatch(&request).await
    }
}

fn render(request: &OperationRequest, prediction: &Prediction) -> Result<OperationResult, BackendError> {
    let text = |name: &'static str| {
        prediction
            .get_str(name)
            .map(str::to_string)
            .ok_or(BackendError::MissingOutput(name))
    };
    let rendered = match request.operation {
        Operation::CountLetter => {
            let count = prediction.get_i64("answer").ok_or(BackendError::MissingOutput("answer"))?;
            format!(
                "Letter '{}' appears {} times in '{}'.",
                request.field("letter"),
                count,
                request.field("word")
            )
        }
        Operation::Summarize => text("summary")?,
        Operation::Translate => text("translation")?,
        Operation::Qa => text("answer")?,
    };
    Ok(OperationResult(rendered))
}
