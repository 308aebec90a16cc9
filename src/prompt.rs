//! # Prompt
//! A prompt is simply a string
//! ## PromptTemplate
//! A prompt template is a string with placeholders.
//!
//! ## Placeholder
//! A placeholder is a string that is in the format of `{[name]}`. It can be filled with a value.
//! It has a name, which is the string inside the square brackets.
//!
//! ## PartialPrompt
//! A partial prompt is a prompt template with some placeholders filled. A partial prompt can be only constructed from a prompt template via [PromptTemplate::construct_prompt].
//!
//! The placeholders in a partial prompt can be filled with values via [PartialPrompt::fill] or [PartialPrompt::try_fill]. You can also use these two methods to update the filling values of the placeholders.
//! When all placeholders are filled, the partial prompt can be completed via [PartialPrompt::complete], in which the placeholders in a template are **actually** replaced with the filling values.


use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use crate::prompt::errors::{PlaceholderNotExist, UnfilledPlaceholders};
use crate::utils::prompt_processing::{get_placeholders, replace_all_placeholders};
use log::warn;


/// A prompt template with some placeholders filled. A partial prompt can be only constructed from a prompt template via [PromptTemplate::construct_prompt].
#[derive(Debug, Clone)]
#[readonly::make]
pub struct PartialPrompt {
    /// The template of the partial prompt, readonly
    #[readonly]
    pub template: PromptTemplate,

    /// Mapping from placeholder name to its filling value
    pub(crate) placeholder_to_vals: HashMap<String, Option<String>>,

    /// Record the placeholders that are not filled yet
    pub(crate) unfilled_placeholders: HashSet<String>,
}

impl PartialPrompt {
    /// Fill a placeholder whose existence is known statically, for chaining.
    /// A nonexistent placeholder is logged and ignored; use [PartialPrompt::try_fill] to handle it.
    pub fn fill(&mut self, placeholder: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let placeholder = placeholder.into();
        if let Err(e) = self.try_fill(placeholder, value) {
            warn!("{}", e);
        }
        self
    }

    /// Fill the placeholders in the partial prompt with the given values.
    /// Returns an error if the placeholder does not exist.
    pub fn try_fill(
        &mut self,
        placeholder: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self, PlaceholderNotExist> {
        let placeholder = placeholder.into();
        if self.placeholder_to_vals.contains_key(&placeholder) {
            self.unfilled_placeholders.remove(&placeholder);
            self.placeholder_to_vals.insert(placeholder, Some(value.into()));
            Ok(self)
        } else {
            Err(PlaceholderNotExist::new(placeholder, value, &self.template.placeholders))
        }
    }

    /// Whether every placeholder has a filling value.
    pub fn is_complete(&self) -> bool {
        self.unfilled_placeholders.is_empty()
    }

    /// Complete the partial prompt and return the completed prompt.
    /// Returns an error if there are still unfilled placeholders.
    pub fn complete(&self) -> Result<String, UnfilledPlaceholders> {
        if self.is_complete() {
            Ok(replace_all_placeholders(self.template.str(), &self.placeholder_to_vals))
        } else {
            let mut all_placeholders: Vec<String> = self.template.placeholders.iter().cloned().collect();
            let mut unfilled_placeholders: Vec<String> = self.unfilled_placeholders.iter().cloned().collect();
            all_placeholders.sort();
            unfilled_placeholders.sort();
            Err(UnfilledPlaceholders {
                all_placeholders,
                unfilled_placeholders,
            })
        }
    }
}

/// A prompt template with placeholders.
#[derive(Debug, Clone)]
#[readonly::make]
pub struct PromptTemplate {
    /// The template of the partial prompt, immutable
    template: Arc<String>,

    /// The placeholders in the template, readonly
    #[readonly]
    pub placeholders: HashSet<String>,
}

impl PromptTemplate {
    /// Create a prompt template from a string. Warns if the template does not have any placeholder.
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let placeholders = get_placeholders(&template);
        if placeholders.is_empty() {
            warn!("Your prompt template does not have a placeholder. If this is intended, ignore this message. \
            Otherwise, check whether you have written placeholders correctly.\n\
            Got prompt template:\n\
            {}", template);
        }
        Self {
            template: Arc::new(template),
            placeholders,
        }
    }

    /// Get the prompt template as a string.
    #[inline]
    pub fn str(&self) -> &str {
        &self.template
    }

    /// Construct a partial prompt from the prompt template.
    pub fn construct_prompt(&self) -> PartialPrompt {
        PartialPrompt {
            template: self.clone(),
            placeholder_to_vals: self.placeholders.iter().map(|p| (p.clone(), None)).collect(),
            unfilled_placeholders: self.placeholders.clone(),
        }
    }
}

pub mod errors {
    use std::collections::HashSet;
    use thiserror::Error;

    /// Error when trying to complete a partial prompt but there are still unfilled placeholders.
    #[derive(Debug, Clone, Error)]
    #[error("UnfilledPlaceholders: to complete the prompt template,\n  Requires Placeholders:{all_placeholders:?}\n  Unfilled Placeholders:{unfilled_placeholders:?}")]
    pub struct UnfilledPlaceholders {
        pub unfilled_placeholders: Vec<String>,
        pub all_placeholders: Vec<String>,
    }

    /// Error when trying to fill a placeholder that does not exist in the prompt template of the partial prompt.
    #[derive(Debug, Clone, Error)]
    #[error("PlaceholderNotExist: try to fill placeholder = {try_fill_placeholder} with value = {value}, but available placeholders are {available_placeholders:?}")]
    pub struct PlaceholderNotExist {
        pub try_fill_placeholder: String,
        pub value: String,
        pub available_placeholders: Vec<String>,
    }

    impl PlaceholderNotExist {
        pub(crate) fn new(try_fill_placeholder: impl Into<String>,
                          value: impl Into<String>,
                          available_placeholders: &HashSet<String>) -> Self {
            let mut available_placeholders: Vec<String> = available_placeholders.iter().cloned().collect();
            available_placeholders.sort();
            PlaceholderNotExist {
                try_fill_placeholder: try_fill_placeholder.into(),
                value: value.into(),
                available_placeholders,
            }
        }
    }
}

#[cfg(test)]
mod test_prompt {
    use super::PromptTemplate;

    #[test]
    fn test_fill_and_complete() {
        let template = PromptTemplate::new("Translate {[text]} into {[target_language]}. Again: {[text]}");
        assert_eq!(2, template.placeholders.len());

        let mut prompt = template.construct_prompt();
        assert!(!prompt.is_complete());
        prompt
            .try_fill("text", "hola").unwrap()
            .try_fill("target_language", "English").unwrap();
        assert!(prompt.is_complete());
        assert_eq!("Translate hola into English. Again: hola", prompt.complete().unwrap());
    }

    #[test]
    fn test_refill_overrides_value() {
        let template = PromptTemplate::new("Q: {[question]}");
        let mut prompt = template.construct_prompt();
        prompt.fill("question", "first").fill("question", "second");
        assert_eq!("Q: second", prompt.complete().unwrap());
    }

    #[test]
    fn test_unfilled_placeholders() {
        let template = PromptTemplate::new("{[word]} {[letter]}");
        let mut prompt = template.construct_prompt();
        prompt.fill("word", "banana");
        let err = prompt.complete().expect_err("letter is still unfilled");
        assert_eq!(vec!["letter".to_string()], err.unfilled_placeholders);
        assert_eq!(vec!["letter".to_string(), "word".to_string()], err.all_placeholders);
    }

    #[test]
    fn test_placeholder_not_exist() {
        let template = PromptTemplate::new("{[a]}");
        let mut prompt = template.construct_prompt();
        let err = prompt.try_fill("b", "bob").expect_err("b is not a placeholder");
        assert_eq!("b", err.try_fill_placeholder);
        assert_eq!(vec!["a".to_string()], err.available_placeholders);
        // `fill` swallows the error and leaves the prompt untouched
        prompt.fill("b", "bob");
        assert!(!prompt.is_complete());
    }

    #[test]
    fn test_template_without_placeholder_completes_as_is() {
        let template = PromptTemplate::new("no slots here");
        assert!(template.placeholders.is_empty());
        assert_eq!("no slots here", template.construct_prompt().complete().unwrap());
    }
}
