//! Prompts and chat templates
//!
//! A [`ChatTemplate`] pairs a system template with a human template, both in
//! MiniJinja syntax, and renders them into a [`Prompt`].

use crate::completion::CompletionRequestBuilder;
use crate::{CompletionRequest, LLMError, Message, Result};
use minijinja::Environment;
use serde::Serialize;

/// A rendered prompt: optional system text plus ordered messages
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    /// System instructions
    pub system: Option<String>,
    /// Conversation messages, in order
    pub messages: Vec<Message>,
}

impl Prompt {
    /// Single user message, no system text
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            system: None,
            messages: vec![Message::user(text)],
        }
    }

    /// Set the system text
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Append a message
    pub fn push(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Start a completion request for `model` carrying this prompt
    pub fn to_request(&self, model: impl Into<String>) -> CompletionRequestBuilder {
        CompletionRequest::builder(model)
            .system_opt(self.system.clone())
            .extend_messages(self.messages.iter().cloned())
    }
}

/// System and human templates rendered together
#[derive(Debug, Clone)]
pub struct ChatTemplate {
    name: String,
    system: String,
    human: String,
}

impl ChatTemplate {
    /// Create a template pair, checking both for syntax errors
    pub fn new(
        name: impl Into<String>,
        system: impl Into<String>,
        human: impl Into<String>,
    ) -> Result<Self> {
        let template = Self {
            name: name.into(),
            system: system.into(),
            human: human.into(),
        };

        let env = Environment::new();
        for source in [&template.system, &template.human] {
            env.template_from_str(source)
                .map_err(|e| template.error(&e))?;
        }

        Ok(template)
    }

    /// Template name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render both templates with `vars`
    pub fn render<S: Serialize>(&self, vars: &S) -> Result<Prompt> {
        let env = Environment::new();
        let ctx = minijinja::Value::from_serialize(vars);

        let system = env
            .render_str(&self.system, &ctx)
            .map_err(|e| self.error(&e))?;
        let human = env
            .render_str(&self.human, &ctx)
            .map_err(|e| self.error(&e))?;

        Ok(Prompt::user(human).with_system(system))
    }

    fn error(&self, e: &minijinja::Error) -> LLMError {
        LLMError::TemplateError {
            name: self.name.clone(),
            detail: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render() {
        let template = ChatTemplate::new(
            "greeting",
            "You are {{ persona }}.",
            "Analyze {{ ticker }}:\n{{ data }}\nReturn JSON like {\"signal\": \"...\"}",
        )
        .unwrap();

        let prompt = template
            .render(&json!({"persona": "an analyst", "ticker": "AAPL", "data": "{}"}))
            .unwrap();

        assert_eq!(prompt.system.as_deref(), Some("You are an analyst."));
        assert_eq!(prompt.messages.len(), 1);
        let human = prompt.messages[0].text().unwrap();
        assert!(human.starts_with("Analyze AAPL:"));
        assert!(human.contains("{\"signal\": \"...\"}"));
    }

    #[test]
    fn test_syntax_error_rejected() {
        let err = ChatTemplate::new("bad", "{% if %}", "ok").unwrap_err();
        assert!(matches!(err, LLMError::TemplateError { name, .. } if name == "bad"));
    }

    #[test]
    fn test_prompt_to_request() {
        let request = Prompt::user("hi")
            .with_system("be brief")
            .to_request("gpt-4o")
            .build();
        assert_eq!(request.system.as_deref(), Some("be brief"));
        assert_eq!(request.messages.len(), 1);
    }
}
