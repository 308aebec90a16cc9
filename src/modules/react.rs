use anyhow::{bail, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use log::debug;
use serde_json::Value;

use crate::filler::{FieldValues, Fill, FillPlaceholders, FillWith};
use crate::lm::LanguageModel;
use crate::modules::{ChainOfThought, Module, Predict, PredictError, Prediction, Tool};
use crate::prompt::{PartialPrompt, PromptTemplate};
use crate::signature::{backticked, Field, FieldType, Signature};
use crate::utils::JsonMap;

pub const FINISH_TOOL: &str = "finish";
pub const TRAJECTORY_FIELD: &str = "trajectory";

const INSTRUCTIONS_TEMPLATE_STR: &str = r#"{[instructions]}

You are an Agent. In each episode, you will be given the fields {[inputs]} as input. And you can see your past trajectory so far.
Your goal is to use one or more of the supplied tools to collect any necessary information for producing {[outputs]}.

To do this, you will interleave next_thought, next_tool_name, and next_tool_args in each turn, and also when finishing the task.
After each tool call, you receive a resulting observation, which gets appended to your trajectory.

When writing next_thought, you may reason about the current situation and plan for future steps.
When selecting the next_tool_name and its next_tool_args, the tool must be one of:

{[tools]}"#;

lazy_static! {
    static ref INSTRUCTIONS_TEMPLATE: PromptTemplate = PromptTemplate::new(INSTRUCTIONS_TEMPLATE_STR);
    static ref TRAJECTORY_PLACEHOLDERS: Vec<String> = vec![TRAJECTORY_FIELD.to_string()];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub thought: String,
    pub tool_name: String,
    pub tool_args: Value,
    pub observation: String,
}

/// Steps taken so far in a [ReAct] loop. Fills the `trajectory` placeholder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    steps: Vec<Step>,
}

impl Trajectory {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn render(&self) -> String {
        self.steps
            .iter()
            .enumerate()
            .map(|(idx, step)| {
                format!(
                    "[[ ## thought_{idx} ## ]]\n{}\n\n[[ ## tool_name_{idx} ## ]]\n{}\n\n[[ ## tool_args_{idx} ## ]]\n{}\n\n[[ ## observation_{idx} ## ]]\n{}",
                    step.thought, step.tool_name, step.tool_args, step.observation
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl FillPlaceholders for Trajectory {
    fn placeholders_to_fill(&self) -> &[String] {
        &TRAJECTORY_PLACEHOLDERS
    }
}

impl FillWith<()> for Trajectory {
    fn fill_with(&self, partial_prompt: &mut PartialPrompt, context: ()) -> Result<()> {
        partial_prompt.try_fill(TRAJECTORY_FIELD, self.render())?;
        Ok(context)
    }
}

/// Reasoning with tools: up to `max_iters` rounds of picking a tool and observing its result, then one
/// [ChainOfThought] round that extracts the declared outputs from the trajectory.
#[derive(Debug, Clone)]
pub struct ReAct {
    signature: Signature,
    tools: Vec<Tool>,
    max_iters: usize,
    react: Predict,
    extract: ChainOfThought,
}

impl ReAct {
    pub fn new(signature: Signature, tools: Vec<Tool>, max_iters: usize) -> Result<Self> {
        for (idx, tool) in tools.iter().enumerate() {
            if tool.name == FINISH_TOOL {
                bail!("`{}` is reserved for ending the loop", FINISH_TOOL);
            }
            if tools[..idx].iter().any(|t| t.name == tool.name) {
                bail!("duplicate tool `{}`", tool.name);
            }
        }

        let mut descriptions: Vec<String> = tools.iter().map(Tool::describe).collect();
        descriptions.push(format!(
            "{}, whose description is <desc>Marks the task as complete. That is, signals that all information for producing the outputs, i.e. {}, are now available to be extracted.</desc>. It takes arguments {{}} in JSON format.",
            FINISH_TOOL,
            backticked(&signature.outputs)
        ));
        let tool_list = descriptions
            .iter()
            .enumerate()
            .map(|(idx, d)| format!("({}) {}", idx + 1, d))
            .collect::<Vec<_>>()
            .join("\n");

        let mut instructions = INSTRUCTIONS_TEMPLATE.construct_prompt();
        FieldValues::new()
            .with("instructions", signature.instructions.as_str())
            .with("inputs", backticked(&signature.inputs))
            .with("outputs", backticked(&signature.outputs))
            .with("tools", tool_list)
            .fill(&mut instructions)?;

        let mut react_inputs = signature.inputs.clone();
        react_inputs.push(Field::str(TRAJECTORY_FIELD));
        let react_signature = Signature::new(
            react_inputs,
            vec![
                Field::str("next_thought"),
                Field::str("next_tool_name").with_desc(format!(
                    "one of {}",
                    tools
                        .iter()
                        .map(|t| t.name.as_str())
                        .chain(std::iter::once(FINISH_TOOL))
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
                Field::new("next_tool_args", FieldType::Json),
            ],
        )?
        .with_instructions(instructions.complete()?);

        let extract = ChainOfThought::new(signature.clone().append_input(Field::str(TRAJECTORY_FIELD))?)?;

        Ok(Self { signature, tools, max_iters, react: Predict::new(react_signature), extract })
    }

    /// Run the loop and return the extracted prediction together with the trajectory behind it.
    pub async fn forward_with_trajectory(
        &self,
        lm: &dyn LanguageModel,
        inputs: &FieldValues,
    ) -> Result<(Prediction, Trajectory), PredictError> {
        let mut trajectory = Trajectory::default();
        for idx in 0..self.max_iters {
            let fillers: [&(dyn Fill + Sync); 2] = [inputs, &trajectory];
            let step = self.react.forward_with(lm, &fillers).await?;
            let thought = step.get_str("next_thought").unwrap_or_default().to_string();
            let tool_name = step.get_str("next_tool_name").unwrap_or_default().trim().to_string();
            let tool_args = step.get("next_tool_args").cloned().unwrap_or_else(|| Value::Object(JsonMap::new()));
            debug!("react step {}: {} {}", idx, tool_name, tool_args);

            if tool_name == FINISH_TOOL {
                trajectory.push(Step { thought, tool_name, tool_args, observation: "Completed.".to_string() });
                break;
            }
            let observation = self.call_tool(&tool_name, &tool_args);
            debug!("react step {} observed: {}", idx, observation);
            trajectory.push(Step { thought, tool_name, tool_args, observation });
        }

        let fillers: [&(dyn Fill + Sync); 2] = [inputs, &trajectory];
        let prediction = self.extract.forward_with(lm, &fillers).await?;
        Ok((prediction, trajectory))
    }

    fn call_tool(&self, name: &str, args: &Value) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name == name) else {
            let available = self.tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ");
            return format!("Unknown tool `{}`. Available tools: {}, {}.", name, available, FINISH_TOOL);
        };
        let Value::Object(args) = args else {
            return format!("Execution error in {}: arguments must be a JSON object, got {}", name, args);
        };
        match tool.call(args) {
            Ok(Value::String(s)) => s,
            Ok(value) => value.to_string(),
            Err(e) => format!("Execution error in {}: {}", name, e),
        }
    }
}

#[async_trait]
impl Module for ReAct {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn forward(&self, lm: &dyn LanguageModel, inputs: &FieldValues) -> Result<Prediction, PredictError> {
        let (prediction, _) = self.forward_with_trajectory(lm, inputs).await?;
        Ok(prediction)
    }
}
