//! # Adapter
//! Turns a [Signature] plus fillers into chat messages, and a model reply back into a [Prediction].
//!
//! The system message describes the fields and asks for one JSON object holding exactly the output fields.
//! The user message carries one `[[ ## name ## ]]` block per input, rendered from a per-signature [PromptTemplate].

use lazy_static::lazy_static;
use log::trace;
use serde_json::Value;
use thiserror::Error;

use crate::filler::{FieldValues, Fill};
use crate::lm::ChatMessage;
use crate::modules::Prediction;
use crate::prompt::errors::UnfilledPlaceholders;
use crate::prompt::PromptTemplate;
use crate::signature::{backticked, Field, FieldType, Signature};
use crate::utils::postprocess::json::filter_to_json;
use crate::utils::JsonMap;

const SYSTEM_TEMPLATE_STR: &str = r#"Your input fields are:
{[input_fields]}
Your output fields are:
{[output_fields]}
All interactions will be structured in the following way, with the appropriate values filled in.

{[input_structure]}

Reply with a single JSON object and nothing else. It must have exactly these keys, in this order:
{[output_structure]}

In adhering to this structure, your objective is: {[instructions]}"#;

lazy_static! {
    static ref SYSTEM_TEMPLATE: PromptTemplate = PromptTemplate::new(SYSTEM_TEMPLATE_STR);
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to fill prompt: {0}")]
    Fill(#[source] anyhow::Error),
    #[error(transparent)]
    Unfilled(#[from] UnfilledPlaceholders),
    #[error("reply is not a JSON object: {reply:?}")]
    NotJson { reply: String },
    #[error("reply is missing output field `{field}`: {reply:?}")]
    MissingOutput { field: String, reply: String },
    #[error("output field `{field}` must be {expected}, got {got}")]
    InvalidValue { field: String, expected: &'static str, got: Value },
}

/// Formats prompts for, and parses replies from, chat models that are asked to answer in JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAdapter;

impl JsonAdapter {
    pub fn format(
        &self,
        signature: &Signature,
        fillers: &[&(dyn Fill + Sync)],
    ) -> Result<Vec<ChatMessage>, AdapterError> {
        let system = Self::system_message(signature)?;
        let mut user = Self::user_template(signature).construct_prompt();
        for filler in fillers {
            filler.fill(&mut user).map_err(AdapterError::Fill)?;
        }
        let user = user.complete()?;
        trace!("formatted prompt for `{}`:\n{}\n---\n{}", signature, system, user);
        Ok(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }

    pub fn parse(&self, signature: &Signature, reply: &str) -> Result<Prediction, AdapterError> {
        let not_json = || AdapterError::NotJson { reply: reply.to_string() };
        let Value::Object(mut object) = filter_to_json(reply).map_err(|_| not_json())? else {
            return Err(not_json());
        };
        let mut fields = JsonMap::new();
        for field in &signature.outputs {
            let value = match object.remove(&field.name) {
                Some(Value::Null) | None => {
                    return Err(AdapterError::MissingOutput { field: field.name.clone(), reply: reply.to_string() });
                }
                Some(value) => value,
            };
            fields.insert(field.name.clone(), normalize(field, value)?);
        }
        Ok(Prediction::from_map(fields))
    }

    fn system_message(signature: &Signature) -> Result<String, AdapterError> {
        let input_structure = signature
            .inputs
            .iter()
            .map(|f| format!("[[ ## {} ## ]]\n{{{}}}", f.name, f.name))
            .collect::<Vec<_>>()
            .join("\n\n");
        let output_structure = signature
            .outputs
            .iter()
            .map(|f| format!("  \"{}\": <{}>", f.name, f.ty.json_hint()))
            .collect::<Vec<_>>()
            .join(",\n");
        let values = FieldValues::new()
            .with("input_fields", describe_fields(&signature.inputs))
            .with("output_fields", describe_fields(&signature.outputs))
            .with("input_structure", input_structure)
            .with("output_structure", format!("{{\n{}\n}}", output_structure))
            .with("instructions", signature.instructions.as_str());
        let mut prompt = SYSTEM_TEMPLATE.construct_prompt();
        values.fill(&mut prompt).map_err(AdapterError::Fill)?;
        Ok(prompt.complete()?)
    }

    fn user_template(signature: &Signature) -> PromptTemplate {
        let mut template = signature
            .inputs
            .iter()
            .map(|f| format!("[[ ## {} ## ]]\n{{[{}]}}", f.name, f.name))
            .collect::<Vec<_>>()
            .join("\n\n");
        template.push_str(&format!(
            "\n\nRespond with the JSON object holding {}",
            backticked(&signature.outputs)
        ));
        let typed: Vec<String> = signature
            .outputs
            .iter()
            .filter(|f| f.ty == FieldType::Int)
            .map(|f| format!("`{}` must be formatted as a valid integer", f.name))
            .collect();
        if typed.is_empty() {
            template.push('.');
        } else {
            template.push_str(&format!(" ({}).", typed.join(", ")));
        }
        PromptTemplate::new(template)
    }
}

fn describe_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .enumerate()
        .map(|(idx, f)| match &f.desc {
            Some(desc) => format!("{}. `{}` ({}): {}", idx + 1, f.name, f.ty.as_str(), desc),
            None => format!("{}. `{}` ({})", idx + 1, f.name, f.ty.as_str()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn normalize(field: &Field, value: Value) -> Result<Value, AdapterError> {
    match field.ty {
        FieldType::Str => Ok(match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
            other => Value::String(other.to_string()),
        }),
        FieldType::Int => {
            let parsed = match &value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            parsed.map(Value::from).ok_or_else(|| AdapterError::InvalidValue {
                field: field.name.clone(),
                expected: "an integer",
                got: value,
            })
        }
        // models often hand back nested objects as JSON strings
        FieldType::Json => Ok(match value {
            Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
            other => other,
        }),
    }
}
