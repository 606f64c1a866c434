//! This module provides a service for rendering templates using the minijinja
//! templating engine.

use minijinja::Environment;
use thiserror::Error;

/// A service for rendering templates using the minijinja templating engine.
pub struct TemplateService {
    env: Environment<'static>,
}

/// Error type for the TemplateService.
#[derive(Debug, Error)]
pub enum TemplateServiceError {
    /// The template failed to parse or referenced an undefined value.
    #[error("Failed to render template")]
    RenderError(#[from] minijinja::Error),
}

impl TemplateService {
    /// Creates a new instance of `TemplateService`. Undefined variables are an
    /// error rather than silently rendering as empty.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);

        Self { env }
    }

    /// Renders a template with the given context.
    pub fn render(
        &self,
        template_str: &str,
        context: serde_json::Value,
    ) -> Result<String, TemplateServiceError> {
        tracing::debug!(template = template_str, context = %context, "Rendering template with context.");

        match self.env.render_str(template_str, context) {
            Ok(rendered_string) => Ok(rendered_string),
            Err(e) => {
                tracing::warn!("Failed to render template '{}': {}", template_str, e);
                Err(TemplateServiceError::RenderError(e))
            }
        }
    }
}

impl Default for TemplateService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_render_template_with_context() {
        let service = TemplateService::new();
        let template = "Device: {{ device_id }}, Owner: {{ recipient.name }}";
        let context = json!({
            "device_id": "D1",
            "recipient": {
                "name": "Ada"
            }
        });
        let result = service.render(template, context).unwrap();
        assert_eq!(result, "Device: D1, Owner: Ada");
    }

    #[test]
    fn test_render_template_with_invalid_template() {
        let service = TemplateService::new();
        let template = "Hello, {{ name }";
        let context = json!({ "name": "World" });
        let result = service.render(template, context);
        assert!(matches!(result, Err(TemplateServiceError::RenderError(_))));
    }

    #[test]
    fn test_render_template_with_undefined_variable() {
        let service = TemplateService::new();
        let result = service.render("{{ missing.field }}", json!({}));
        assert!(result.is_err());
    }
}
