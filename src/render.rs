use std::path::Path;

use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};
use pulldown_cmark::{Event, Options, Parser};

use crate::data::ResumeData;
use crate::error::Result;
use crate::templates::{self, TemplateHandle, TemplateSource};

/// When string values get HTML-escaped on output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoEscapePolicy {
    /// Escape for templates whose file name ends in `.html`, `.htm` or `.xml`.
    #[default]
    ByExtension,
    Always,
    Never,
}

impl AutoEscapePolicy {
    fn for_template(self, name: &str) -> AutoEscape {
        match self {
            AutoEscapePolicy::Always => AutoEscape::Html,
            AutoEscapePolicy::Never => AutoEscape::None,
            AutoEscapePolicy::ByExtension => {
                let ext = Path::new(name).extension().and_then(|e| e.to_str());
                match ext {
                    Some("html" | "htm" | "xml") => AutoEscape::Html,
                    _ => AutoEscape::None,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    pub templates: TemplateSource,
    pub autoescape: AutoEscapePolicy,
}

impl RenderConfig {
    pub fn new(templates: TemplateSource) -> Self {
        Self {
            templates,
            autoescape: AutoEscapePolicy::default(),
        }
    }
}

/// Fills templates with résumé data.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render `template` with the top-level keys of `data` as variables.
    ///
    /// Missing optional sections are simply undefined in the template. Only
    /// engine failures (bad syntax, invalid operations) are errors.
    pub fn render(&self, data: &ResumeData, template: &TemplateHandle) -> Result<String> {
        // A fresh environment per render so edits to template files are always picked up.
        let env = self.environment();
        let tmpl = env.get_template(&template.file_name())?;
        let html = tmpl.render(data.as_value())?;
        tracing::debug!(template = template.name(), bytes = html.len(), "rendered template");
        Ok(html)
    }

    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        match &self.config.templates {
            TemplateSource::Bundled => env.set_loader(|name| Ok(templates::bundled_source(name))),
            TemplateSource::Directory(dir) => env.set_loader(minijinja::path_loader(dir)),
        }
        env.set_undefined_behavior(UndefinedBehavior::Lenient);

        let policy = self.config.autoescape;
        env.set_auto_escape_callback(move |name| policy.for_template(name));

        env.add_filter("markdown", markdown);
        env
    }
}

/// `{{ job.description | markdown }}`
fn markdown(value: Value) -> Value {
    if value.is_undefined() || value.is_none() {
        return Value::from_safe_string(String::new());
    }
    let source = match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    };
    Value::from_safe_string(markdown_to_html(&source))
}

/// Convert Markdown to HTML. Raw HTML in the source is escaped, not passed through.
pub fn markdown_to_html(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let events = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
        other => other,
    });

    let mut out = String::new();
    pulldown_cmark::html::push_html(&mut out, events);
    out
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;
    use crate::error::Error;
    use crate::templates::resolve;

    fn render_source(source: &str, data: serde_json::Value) -> Result<String> {
        render_with(source, data, AutoEscapePolicy::default())
    }

    fn render_with(
        source: &str,
        data: serde_json::Value,
        autoescape: AutoEscapePolicy,
    ) -> Result<String> {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("test.html"), source).unwrap();
        let handle = resolve(dir.path(), "test").unwrap();
        let renderer = Renderer::new(RenderConfig {
            templates: TemplateSource::Directory(dir.path().to_path_buf()),
            autoescape,
        });
        renderer.render(&ResumeData::from_value(data).unwrap(), &handle)
    }

    fn jane() -> serde_json::Value {
        json!({"personal": {"name": "Jane Doe", "email": "jane@example.com"}, "skills": ["Go"]})
    }

    #[test]
    fn substitutes_top_level_keys() {
        let html = render_source(
            "<h1>{{ personal.name }}</h1><p>{{ personal.email }}</p>{% for s in skills %}<li>{{ s }}</li>{% endfor %}",
            jane(),
        )
        .unwrap();
        assert_eq!(html, "<h1>Jane Doe</h1><p>jane@example.com</p><li>Go</li>");
    }

    #[test]
    fn escapes_html_in_values() {
        let data = json!({"personal": {"name": "Tom & <Jerry>", "email": "t@j"}});
        let html = render_source("<h1>{{ personal.name }}</h1>", data).unwrap();
        assert_eq!(html, "<h1>Tom &amp; &lt;Jerry&gt;</h1>");
    }

    #[test]
    fn never_policy_leaves_values_raw() {
        let data = json!({"personal": {"name": "<b>Jane</b>", "email": "j@d"}});
        let html = render_with("{{ personal.name }}", data, AutoEscapePolicy::Never).unwrap();
        assert_eq!(html, "<b>Jane</b>");
    }

    #[test]
    fn missing_optional_sections_are_empty() {
        let html = render_source(
            "[{{ summary }}]{% if experience %}jobs{% endif %}{% for e in education %}x{% endfor %}",
            jane(),
        )
        .unwrap();
        assert_eq!(html, "[]");
    }

    #[test]
    fn syntax_error_is_template_error() {
        let err = render_source("{% if %}", jane()).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn includes_siblings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("header.html"), "<h1>{{ personal.name }}</h1>").unwrap();
        fs::write(dir.path().join("main.html"), "{% include 'header.html' %}<p>body</p>").unwrap();
        let renderer = Renderer::new(RenderConfig::new(TemplateSource::Directory(
            dir.path().to_path_buf(),
        )));
        let html = renderer
            .render(
                &ResumeData::from_value(jane()).unwrap(),
                &resolve(dir.path(), "main").unwrap(),
            )
            .unwrap();
        assert_eq!(html, "<h1>Jane Doe</h1><p>body</p>");
    }

    #[test]
    fn markdown_filter() {
        let data = json!({
            "personal": {"name": "J", "email": "j"},
            "summary": "Built **fast** things <script>x</script>"
        });
        let html = render_source("{{ summary | markdown }}{{ missing | markdown }}", data).unwrap();
        assert_eq!(
            html,
            "<p>Built <strong>fast</strong> things &lt;script&gt;x&lt;/script&gt;</p>\n"
        );
    }

    #[test]
    fn bundled_templates_render_without_a_directory() {
        let renderer = Renderer::new(RenderConfig::default());
        let handle = TemplateSource::Bundled.resolve("classic").unwrap();
        let html = renderer
            .render(&ResumeData::from_value(jane()).unwrap(), &handle)
            .unwrap();
        assert!(html.contains("Jane Doe"));
    }

    #[test]
    fn rendering_is_reproducible() {
        let source = "{{ personal.name }}{% for s in skills %}, {{ s }}{% endfor %}";
        assert_eq!(
            render_source(source, jane()).unwrap(),
            render_source(source, jane()).unwrap()
        );
    }
}
