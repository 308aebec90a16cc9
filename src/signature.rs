//! # Signature
//! A signature declares what a prediction consumes and produces, e.g. `"text, target_language -> translation"`.
//!
//! Each side is a comma-separated list of field names. A field may carry a type after a colon
//! (`"word, letter -> answer: int"`); untyped fields are strings.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref FIELD_NAME_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Str,
    Int,
    /// Any JSON value, kept verbatim.
    Json,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Str => "str",
            FieldType::Int => "int",
            FieldType::Json => "json",
        }
    }

    /// How the value must be written in a JSON reply.
    pub(crate) fn json_hint(&self) -> &'static str {
        match self {
            FieldType::Str => "string",
            FieldType::Int => "integer",
            FieldType::Json => "JSON object",
        }
    }
}

impl FromStr for FieldType {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "str" | "string" => Ok(FieldType::Str),
            "int" | "integer" => Ok(FieldType::Int),
            "json" | "dict" => Ok(FieldType::Json),
            other => Err(SignatureError::UnknownType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub desc: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self { name: name.into(), ty, desc: None }
    }

    pub fn str(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Str)
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    fn parse(raw: &str) -> Result<Self, SignatureError> {
        let (name, ty) = match raw.split_once(':') {
            Some((name, ty)) => (name.trim(), ty.trim().parse()?),
            None => (raw.trim(), FieldType::Str),
        };
        if !FIELD_NAME_RE.is_match(name) {
            return Err(SignatureError::InvalidFieldName(name.to_string()));
        }
        Ok(Self::new(name, ty))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature must contain exactly one `->`: {0:?}")]
    MissingArrow(String),
    #[error("signature needs at least one {side} field: {signature:?}")]
    EmptySide { side: &'static str, signature: String },
    #[error("invalid field name: {0:?}")]
    InvalidFieldName(String),
    #[error("unknown field type: {0:?}")]
    UnknownType(String),
    #[error("duplicate field: {0:?}")]
    DuplicateField(String),
}

/// Input and output fields of one prediction plus the instructions given to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
#[readonly::make]
pub struct Signature {
    #[readonly]
    pub inputs: Vec<Field>,
    #[readonly]
    pub outputs: Vec<Field>,
    #[readonly]
    pub instructions: String,
}

impl Signature {
    pub fn new(inputs: Vec<Field>, outputs: Vec<Field>) -> Result<Self, SignatureError> {
        let mut seen = HashSet::new();
        for field in inputs.iter().chain(outputs.iter()) {
            if !FIELD_NAME_RE.is_match(&field.name) {
                return Err(SignatureError::InvalidFieldName(field.name.clone()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SignatureError::DuplicateField(field.name.clone()));
            }
        }
        let instructions = default_instructions(&inputs, &outputs);
        Ok(Self { inputs, outputs, instructions })
    }

    pub fn parse(signature: &str) -> Result<Self, SignatureError> {
        let mut sides = signature.split("->");
        let (inputs, outputs) = match (sides.next(), sides.next(), sides.next()) {
            (Some(inputs), Some(outputs), None) => (inputs, outputs),
            _ => return Err(SignatureError::MissingArrow(signature.to_string())),
        };
        let parse_side = |side: &str, which: &'static str| -> Result<Vec<Field>, SignatureError> {
            let fields = side
                .split(',')
                .filter(|raw| !raw.trim().is_empty())
                .map(Field::parse)
                .collect::<Result<Vec<_>, _>>()?;
            if fields.is_empty() {
                return Err(SignatureError::EmptySide { side: which, signature: signature.to_string() });
            }
            Ok(fields)
        };
        Self::new(parse_side(inputs, "input")?, parse_side(outputs, "output")?)
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Adds an output in front of the existing ones, e.g. a `reasoning` field that the model fills first.
    pub fn prepend_output(mut self, field: Field) -> Result<Self, SignatureError> {
        self.ensure_unused(&field.name)?;
        self.outputs.insert(0, field);
        Ok(self)
    }

    pub fn append_input(mut self, field: Field) -> Result<Self, SignatureError> {
        self.ensure_unused(&field.name)?;
        self.inputs.push(field);
        Ok(self)
    }

    /// Attach a description to a declared field. Unknown names are ignored.
    pub fn describe(mut self, name: &str, desc: impl Into<String>) -> Self {
        let desc = desc.into();
        if let Some(field) = self.inputs.iter_mut().chain(self.outputs.iter_mut()).find(|f| f.name == name) {
            field.desc = Some(desc);
        }
        self
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|f| f.name.as_str()).collect()
    }

    fn ensure_unused(&self, name: &str) -> Result<(), SignatureError> {
        if !FIELD_NAME_RE.is_match(name) {
            return Err(SignatureError::InvalidFieldName(name.to_string()));
        }
        if self.inputs.iter().chain(self.outputs.iter()).any(|f| f.name == name) {
            return Err(SignatureError::DuplicateField(name.to_string()));
        }
        Ok(())
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |fields: &[Field]| {
            fields
                .iter()
                .map(|field| match field.ty {
                    FieldType::Str => field.name.clone(),
                    ty => format!("{}: {}", field.name, ty.as_str()),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(f, "{} -> {}", side(&self.inputs), side(&self.outputs))
    }
}

pub(crate) fn backticked(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| format!("`{}`", f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn default_instructions(inputs: &[Field], outputs: &[Field]) -> String {
    format!("Given the fields {}, produce the fields {}.", backticked(inputs), backticked(outputs))
}
