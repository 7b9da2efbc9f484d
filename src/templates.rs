use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rust_embed::Embed;

use crate::data::example_document;
use crate::error::{Error, Result};

/// File extension that marks a file as a template.
pub const TEMPLATE_EXTENSION: &str = "html";

/// File extension of the optional per-template documentation.
pub const DOC_EXTENSION: &str = "md";

/// The templates shipped inside the binary.
#[derive(Embed)]
#[folder = "templates/"]
struct BundledTemplates;

/// Where templates are looked up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TemplateSource {
    /// The set compiled into the binary.
    #[default]
    Bundled,
    /// A directory on disk, read afresh on every call.
    Directory(PathBuf),
}

impl TemplateSource {
    /// `dir` when given, the bundled set otherwise.
    pub fn new(dir: Option<PathBuf>) -> Self {
        dir.map_or(TemplateSource::Bundled, TemplateSource::Directory)
    }

    pub fn dir(&self) -> Option<&Path> {
        match self {
            TemplateSource::Bundled => None,
            TemplateSource::Directory(dir) => Some(dir),
        }
    }

    /// Names of all templates, sorted.
    pub fn list_available(&self) -> Vec<String> {
        match self {
            TemplateSource::Bundled => template_names(
                BundledTemplates::iter()
                    .filter(|file| !file.contains('/'))
                    .map(|file| PathBuf::from(file.as_ref())),
            ),
            TemplateSource::Directory(dir) => list_available(dir),
        }
    }

    pub fn resolve(&self, name: &str) -> Result<TemplateHandle> {
        match self {
            TemplateSource::Bundled => {
                check_name(name, || self.list_available())?;
                let handle = TemplateHandle {
                    name: name.to_string(),
                    path: None,
                };
                match BundledTemplates::get(&handle.file_name()) {
                    Some(_) => Ok(handle),
                    None => Err(Error::TemplateNotFound {
                        name: name.to_string(),
                        available: self.list_available(),
                    }),
                }
            }
            TemplateSource::Directory(dir) => resolve(dir, name),
        }
    }

    pub fn describe(&self, name: &str) -> Result<String> {
        match self {
            TemplateSource::Bundled => {
                match BundledTemplates::get(&format!("{name}.{DOC_EXTENSION}")) {
                    Some(doc) => Ok(String::from_utf8_lossy(&doc.data).into_owned()),
                    None => Ok(generic_description(name)),
                }
            }
            TemplateSource::Directory(dir) => describe(dir, name),
        }
    }
}

/// A template that exists in its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateHandle {
    name: String,
    path: Option<PathBuf>,
}

impl TemplateHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location on disk; `None` for bundled templates.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Name the template is registered under in the rendering environment.
    pub fn file_name(&self) -> String {
        format!("{}.{TEMPLATE_EXTENSION}", self.name)
    }
}

/// Source of a bundled file, for the rendering environment's loader.
pub(crate) fn bundled_source(file_name: &str) -> Option<String> {
    BundledTemplates::get(file_name).map(|file| String::from_utf8_lossy(&file.data).into_owned())
}

/// Names of all templates in `dir`, sorted. A missing directory has none.
pub fn list_available(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "templates directory not readable");
            return Vec::new();
        }
    };

    template_names(
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file()),
    )
}

fn template_names(paths: impl Iterator<Item = PathBuf>) -> Vec<String> {
    let names: BTreeSet<String> = paths
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(TEMPLATE_EXTENSION))
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect();

    names.into_iter().collect()
}

/// Only plain file stems name a template.
fn check_name(name: &str, available: impl FnOnce() -> Vec<String>) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::TemplateNotFound {
            name: name.to_string(),
            available: available(),
        });
    }
    Ok(())
}

/// Look up `name` in `dir`.
pub fn resolve(dir: &Path, name: &str) -> Result<TemplateHandle> {
    check_name(name, || list_available(dir))?;

    let path = dir.join(format!("{name}.{TEMPLATE_EXTENSION}"));
    if !path.is_file() {
        return Err(Error::TemplateNotFound {
            name: name.to_string(),
            available: list_available(dir),
        });
    }

    Ok(TemplateHandle {
        name: name.to_string(),
        path: Some(path),
    })
}

/// Human-readable notes for a template: its `.md` file if there is one,
/// otherwise the standard JSON structure.
pub fn describe(dir: &Path, name: &str) -> Result<String> {
    let doc_file = dir.join(format!("{name}.{DOC_EXTENSION}"));
    if doc_file.is_file() {
        return fs::read_to_string(&doc_file).map_err(|e| Error::read(doc_file, e));
    }

    Ok(generic_description(name))
}

fn generic_description(name: &str) -> String {
    let structure = serde_json::to_string_pretty(&example_document()).unwrap_or_default();
    format!(
        "No documentation found for template '{name}'.\n\
         This template uses the standard JSON structure:\n{structure}\n\n\
         Styling: <style> blocks and linked style sheets are ignored. Inline style\n\
         attributes support font-weight, font-style, text-align (center, right)\n\
         and page-break-before/-after (or break-before/-after)."
    )
}
