//! Turn a JSON résumé into a PDF through an HTML template.
//!
//! The pipeline is load → resolve → render → export:
//!
//! ```no_run
//! use std::path::Path;
//! use resume_generator::ResumeGenerator;
//!
//! let generator = ResumeGenerator::new(None);
//! generator.generate_resume(Path::new("resume.json"), Path::new("out/resume.pdf"), "modern")?;
//! # Ok::<(), resume_generator::Error>(())
//! ```

mod block;
mod html;
mod typst;

pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod logging;
pub mod render;
pub mod templates;

use std::path::{Path, PathBuf};

pub use block::{Alignment, Block, Document, List, ListItem, Span};
pub use config::Config;
pub use data::ResumeData;
pub use error::{Error, Result};
pub use export::Exporter;
pub use render::{AutoEscapePolicy, RenderConfig, Renderer};
pub use templates::{TemplateHandle, TemplateSource};

/// Template used when none is requested.
pub const DEFAULT_TEMPLATE: &str = "modern";

/// Parse rendered HTML into blocks.
pub fn parse_html(html: &str) -> Document {
    html::parse(html)
}

/// Convert rendered HTML to Typst markup with the given config.
pub fn html_to_typst(html: &str, config: &Config) -> String {
    typst::document_to_typst(&html::parse(html), config)
}

/// A template source plus the settings to render and export with it.
#[derive(Debug, Clone)]
pub struct ResumeGenerator {
    renderer: Renderer,
    exporter: Exporter,
}

impl ResumeGenerator {
    /// Use `templates_dir`, or the bundled templates when `None`.
    pub fn new(templates_dir: Option<PathBuf>) -> Self {
        Self {
            renderer: Renderer::new(RenderConfig::new(TemplateSource::new(templates_dir))),
            exporter: Exporter::new(Config::compiled_default()),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.exporter = Exporter::new(config);
        self
    }

    pub fn with_autoescape(mut self, autoescape: AutoEscapePolicy) -> Self {
        let mut render_config = self.renderer.config().clone();
        render_config.autoescape = autoescape;
        self.renderer = Renderer::new(render_config);
        self
    }

    pub fn templates(&self) -> &TemplateSource {
        &self.renderer.config().templates
    }

    /// Names of the templates currently available.
    pub fn available_templates(&self) -> Vec<String> {
        self.templates().list_available()
    }

    pub fn resolve_template(&self, name: &str) -> Result<TemplateHandle> {
        self.templates().resolve(name)
    }

    pub fn describe_template(&self, name: &str) -> Result<String> {
        self.resolve_template(name)?;
        self.templates().describe(name)
    }

    pub fn load_json_data(&self, json_file: &Path) -> Result<ResumeData> {
        data::load(json_file)
    }

    pub fn generate_html(&self, data: &ResumeData, template_name: &str) -> Result<String> {
        let template = self.resolve_template(template_name)?;
        self.renderer.render(data, &template)
    }

    pub fn generate_pdf(&self, html: &str, output_file: &Path) -> Result<()> {
        self.exporter.export(html, output_file)
    }

    /// Run the whole pipeline. Nothing is written unless every earlier step succeeds.
    pub fn generate_resume(
        &self,
        json_file: &Path,
        output_file: &Path,
        template_name: &str,
    ) -> Result<()> {
        let data = self.load_json_data(json_file)?;
        let template = self.resolve_template(template_name)?;
        tracing::info!(template = template.name(), "rendering resume");

        let html = self.renderer.render(&data, &template)?;
        self.generate_pdf(&html, output_file)
    }
}

impl Default for ResumeGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}
