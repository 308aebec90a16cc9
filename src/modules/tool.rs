use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::utils::JsonMap;

type ToolFn = dyn Fn(&JsonMap) -> Result<Value> + Send + Sync;

/// A local function the model may call from a [ReAct](crate::modules::ReAct) loop.
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub desc: String,
    /// Argument name to JSON schema, shown to the model.
    pub args: JsonMap,
    func: Arc<ToolFn>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        desc: impl Into<String>,
        args: JsonMap,
        func: impl Fn(&JsonMap) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), desc: desc.into(), args, func: Arc::new(func) }
    }

    pub fn call(&self, args: &JsonMap) -> Result<Value> {
        (self.func)(args)
    }

    pub(crate) fn describe(&self) -> String {
        format!(
            "{}, whose description is <desc>{}</desc>. It takes arguments {} in JSON format.",
            self.name,
            self.desc,
            Value::Object(self.args.clone())
        )
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("desc", &self.desc)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Fetch a string argument of a tool call.
pub fn str_arg<'a>(args: &'a JsonMap, name: &str) -> Result<&'a str> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(anyhow!("argument `{}` must be a string, got {}", name, other)),
        None => Err(anyhow!("missing argument `{}`", name)),
    }
}

#[cfg(test)]
mod test_tool {
    use serde_json::{json, Value};

    use super::{str_arg, Tool};
    use crate::utils::JsonMap;

    fn echo() -> Tool {
        let mut args = JsonMap::new();
        args.insert("text".to_string(), json!({"type": "string"}));
        Tool::new("echo", "Returns its input.", args, |args| Ok(Value::from(str_arg(args, "text")?)))
    }

    #[test]
    fn test_call() {
        let tool = echo();
        let mut args = JsonMap::new();
        args.insert("text".to_string(), json!("hi"));
        assert_eq!(json!("hi"), tool.call(&args).unwrap());

        args.insert("text".to_string(), json!(3));
        assert!(tool.call(&args).is_err());
        assert!(tool.call(&JsonMap::new()).is_err());
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            r#"echo, whose description is <desc>Returns its input.</desc>. It takes arguments {"text":{"type":"string"}} in JSON format."#,
            echo().describe()
        );
    }
}
