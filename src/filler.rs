//! # Filler
//! Anything that fills one or more placeholders in a [PartialPrompt].
//!
//! [FieldValues] is the filler for named fields: every value it holds fills the placeholder of the same name.

use crate::prompt::PartialPrompt;
use anyhow::Result;

pub trait FillPlaceholders {
    fn placeholders_to_fill(&self) -> &[String];
}

pub trait Fill: FillPlaceholders {
    fn fill(&self, partial_prompt: &mut PartialPrompt) -> Result<()>;
}

pub trait FillWith<CTX>: FillPlaceholders {
    fn fill_with(&self, partial_prompt: &mut PartialPrompt, context: CTX) -> Result<CTX>;
}

impl<T: FillWith<()>> Fill for T {
    fn fill(&self, partial_prompt: &mut PartialPrompt) -> Result<()> {
        self.fill_with(partial_prompt, ())
    }
}

/// Ordered mapping from field name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues {
    names: Vec<String>,
    values: Vec<String>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, keeping the position of an existing field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.names.iter().position(|n| *n == name) {
            Some(idx) => self.values[idx] = value,
            None => {
                self.names.push(name);
                self.values.push(value);
            }
        }
        self
    }

    /// Builder flavour of [FieldValues::insert].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx].as_str())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(String::as_str).zip(self.values.iter().map(String::as_str))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = FieldValues::new();
        for (name, value) in iter {
            fields.insert(name, value);
        }
        fields
    }
}

impl FillPlaceholders for FieldValues {
    fn placeholders_to_fill(&self) -> &[String] {
        &self.names
    }
}

impl FillWith<()> for FieldValues {
    fn fill_with(&self, partial_prompt: &mut PartialPrompt, context: ()) -> Result<()> {
        for (name, value) in self.iter() {
            partial_prompt.try_fill(name, value)?;
        }
        Ok(context)
    }
}
