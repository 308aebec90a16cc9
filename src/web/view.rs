//! The single HTML page, rendered through a [PromptTemplate] like any other prompt.

use lazy_static::lazy_static;
use serde_json::{Map, Value};

use crate::dispatch::Operation;
use crate::prompt::errors::UnfilledPlaceholders;
use crate::prompt::PromptTemplate;

const PAGE: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>promptform</title>
    <style>
      body { font-family: Arial, sans-serif; max-width: 800px; margin: auto; padding: 20px; }
      h1 { text-align: center; }
      form { margin-bottom: 40px; }
      label { display: block; margin-top: 10px; }
      input[type=text], textarea, select { width: 100%; padding: 8px; margin-top: 4px; }
      button { margin-top: 12px; padding: 8px 16px; }
      .result { background: #f4f4f4; padding: 10px; margin-top: 10px; white-space: pre-wrap; }
      .error { background: #fbe9e9; }
    </style>
  </head>
  <body>
    <h1>promptform</h1>
    <form method="post" action="/run">
      <label for="function">Choose function:</label>
      <select name="function" id="function">
{[options]}
      </select>
      <div id="inputs"></div>
      <button type="submit">Run</button>
    </form>
{[outcome]}
    <script>
      const inputFields = {[inputs]};
      const inputsDiv = document.getElementById('inputs');
      const functionSelect = document.getElementById('function');
      function renderInputs() {
        inputsDiv.innerHTML = inputFields[functionSelect.value] || '';
      }
      functionSelect.addEventListener('change', renderInputs);
      window.onload = renderInputs;
    </script>
  </body>
</html>
"#;

lazy_static! {
    static ref PAGE_TEMPLATE: PromptTemplate = PromptTemplate::new(PAGE);
}

/// What to show under the form after a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Result(String),
    Error(String),
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn input_markup(operation: Operation) -> &'static str {
    match operation {
        Operation::CountLetter => concat!(
            r#"<label>Word:<input type="text" name="word" required></label>"#,
            r#"<label>Letter:<input type="text" name="letter" maxlength="1" required></label>"#,
        ),
        Operation::Summarize => {
            r#"<label>Text to Summarize:<textarea name="text" rows="4" required></textarea></label>"#
        }
        Operation::Translate => concat!(
            r#"<label>Text to Translate:<textarea name="text" rows="4" required></textarea></label>"#,
            r#"<label>Target Language:<input type="text" name="target_language" required></label>"#,
        ),
        Operation::Qa => r#"<label>Question:<input type="text" name="question" required></label>"#,
    }
}

fn options(selected: Option<Operation>) -> String {
    Operation::ALL
        .iter()
        .map(|&op| {
            let marker = if Some(op) == selected { " selected" } else { "" };
            format!(r#"        <option value="{}"{}>{}</option>"#, op.name(), marker, escape_html(op.label()))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn outcome_block(outcome: Option<&Outcome>) -> String {
    match outcome {
        None => String::new(),
        Some(Outcome::Result(text)) => {
            format!("    <h2>Result:</h2>\n    <div class=\"result\">{}</div>", escape_html(text))
        }
        Some(Outcome::Error(text)) => {
            format!("    <h2>Error:</h2>\n    <div class=\"result error\">{}</div>", escape_html(text))
        }
    }
}

/// Render the page with `selected` preselected in the operation picker.
pub fn render_page(selected: Option<Operation>, outcome: Option<&Outcome>) -> Result<String, UnfilledPlaceholders> {
    let inputs: Map<String, Value> = Operation::ALL
        .iter()
        .map(|&op| (op.name().to_string(), Value::from(input_markup(op))))
        .collect();
    PAGE_TEMPLATE
        .construct_prompt()
        .fill("options", options(selected))
        .fill("outcome", outcome_block(outcome))
        .fill("inputs", Value::Object(inputs).to_string())
        .complete()
}

#[cfg(test)]
mod test_view {
    use super::{escape_html, render_page, Outcome};
    use crate::dispatch::Operation;

    #[test]
    fn test_escape_html() {
        assert_eq!("&lt;b&gt;Q&amp;A&lt;/b&gt;", escape_html("<b>Q&A</b>"));
        assert_eq!("it&#39;s &quot;fine&quot;", escape_html(r#"it's "fine""#));
    }

    #[test]
    fn test_form_page() {
        let page = render_page(None, None).unwrap();
        for op in Operation::ALL {
            assert!(page.contains(&format!(r#"<option value="{}">"#, op.name())));
        }
        assert!(page.contains("Basic Q&amp;A"));
        assert!(page.contains(r#"name=\"target_language\""#));
        assert!(!page.contains("Result:"));
    }

    #[test]
    fn test_outcome_is_escaped() {
        let outcome = Outcome::Result("<script>alert(1)</script>".to_string());
        let page = render_page(Some(Operation::Qa), Some(&outcome)).unwrap();
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(page.contains(r#"<option value="qa" selected>"#));

        let page = render_page(None, Some(&Outcome::Error("field `text` is required".to_string()))).unwrap();
        assert!(page.contains("Error:"));
    }
}
