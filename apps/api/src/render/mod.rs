//! Template Renderer: fills a trusted template's `{{slot}}` placeholders with
//! escaped, user-derived content.

pub mod escape;
pub mod sections;
pub mod template;

pub use template::{render_template, TemplateContext};
