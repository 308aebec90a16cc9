//! # promptform
//!
//! A single web form in front of a language model. Pick an operation (count a letter, summarize, translate, ask a
//! question), fill in its fields, and read the model's answer.
//!
//! ## Pipeline
//!
//! Every request travels the same way:
//!
//! ```text
//! form -> OperationRequest -> program (Predict / ChainOfThought / ReAct)
//!      -> PromptTemplate -> PartialPrompt -> chat messages -> LanguageModel -> JSON reply -> Prediction -> text
//! ```
//!
//! ### Prompt Template and Placeholder
//!
//! A [`PromptTemplate`](crate::prompt::PromptTemplate) is a string with named slots, written `{[name]}`. The name can
//! be anything without line breaks. [`PromptTemplate::construct_prompt`](crate::prompt::PromptTemplate::construct_prompt)
//! gives a [`PartialPrompt`](crate::prompt::PartialPrompt) that records which slots are filled by what, and
//! [`PartialPrompt::complete`](crate::prompt::PartialPrompt::complete) turns it into the final string once nothing is
//! left unfilled.
//!
//! ### Filler
//!
//! Anything that fills one or more placeholders, i.e. anything implementing
//! [`FillPlaceholders`](crate::filler::FillPlaceholders) and one of [`Fill`](crate::filler::Fill) or
//! [`FillWith<CTX>`](crate::filler::FillWith). The request fields are a filler
//! ([`FieldValues`](crate::filler::FieldValues)), and so is the tool-use history of a
//! [`ReAct`](crate::modules::ReAct) loop.
//!
//! ### Signatures and programs
//!
//! A [`Signature`](crate::signature::Signature) declares the input and output fields of one prediction, e.g.
//! `"text, target_language -> translation"`. The [`JsonAdapter`](crate::adapter::JsonAdapter) renders it into chat
//! messages and parses the model's JSON reply back. [`modules`] composes these into prediction programs.
//!
//! ### Endpoint
//!
//! The endpoint is a [`LanguageModel`](crate::lm::LanguageModel): by default a local Ollama reached through its
//! OpenAI-compatible API.
//!
//! ### Dispatch
//!
//! [`dispatch`] maps each operation to its fields and program, and [`web`] serves the form.

pub mod prompt;
pub mod filler;
pub mod signature;
pub mod adapter;
pub mod lm;
pub mod modules;
pub mod dispatch;
pub mod web;
pub mod config;
pub mod utils;
