use handlebars::{Handlebars, no_escape};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template error: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),
    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// A single named handlebars template rendered without HTML escaping, so
/// message bodies reach the model exactly as they were received.
pub struct PromptTemplate {
    name: String,
    handlebars: Handlebars<'static>,
}

impl PromptTemplate {
    pub fn new(name: &str, source: &str) -> Result<Self, TemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(no_escape);
        handlebars.set_strict_mode(true);
        handlebars
            .register_template_string(name, source)
            .map_err(Box::new)?;
        Ok(Self {
            name: name.to_string(),
            handlebars,
        })
    }

    pub fn render<T: Serialize>(&self, data: &T) -> Result<String, TemplateError> {
        Ok(self.handlebars.render(&self.name, data)?)
    }
}
