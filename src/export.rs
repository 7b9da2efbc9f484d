use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::Builder;
use typst_as_lib::TypstEngine;
use typst_as_lib::typst_kit_options::TypstKitFontOptions;
use typst_library::layout::PagedDocument;
use typst_pdf::PdfOptions;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::html;
use crate::typst;

/// Turns rendered HTML into a PDF file.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    config: Config,
}

impl Exporter {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Lower `html` to Typst markup.
    pub fn to_typst(&self, html: &str) -> String {
        let document = html::parse(html);
        typst::document_to_typst(&document, &self.config)
    }

    /// Lay out `html` and return the PDF bytes.
    pub fn to_pdf(&self, html: &str) -> Result<Vec<u8>> {
        let doc = self.compile(html)?;

        typst_pdf::pdf(&doc, &PdfOptions::default()).map_err(|diagnostics| {
            let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
            Error::Render(format!("PDF generation failed: {}", messages.join("; ")))
        })
    }

    /// Write the PDF for `html` to `output`, creating parent directories.
    ///
    /// The file is written next to `output` and renamed into place, so an
    /// existing file is replaced in one step and a failed export leaves
    /// nothing behind. A new file gets the usual create mode; a replaced one
    /// keeps its permissions.
    pub fn export(&self, html: &str, output: &Path) -> Result<()> {
        let parent = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

        let pdf_bytes = self.to_pdf(html)?;

        let mut builder = Builder::new();
        builder.prefix(".resume-").suffix(".pdf.tmp");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // 0666 less the umask, as `File::create` would give.
            builder.permissions(fs::Permissions::from_mode(0o666));
        }
        let mut staged = builder.tempfile_in(parent).map_err(|e| Error::io(parent, e))?;

        staged
            .write_all(&pdf_bytes)
            .and_then(|()| match fs::metadata(output) {
                Ok(existing) => staged.as_file().set_permissions(existing.permissions()),
                Err(_) => Ok(()),
            })
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| Error::io(staged.path(), e))?;
        staged
            .persist(output)
            .map_err(|e| Error::io(output, e.error))?;

        tracing::info!(output = %output.display(), bytes = pdf_bytes.len(), "wrote PDF");
        Ok(())
    }

    /// Compile `html` to a Typst document.
    fn compile(&self, html: &str) -> Result<PagedDocument> {
        let typst_content = self.to_typst(html);
        tracing::debug!(bytes = typst_content.len(), "compiling typst markup");

        let font_options = TypstKitFontOptions::new()
            .include_embedded_fonts(true)
            .include_system_fonts(self.config.font.system_fonts);

        let engine = TypstEngine::builder()
            .main_file(typst_content)
            .search_fonts_with(font_options)
            .build();

        let compiled = engine.compile::<PagedDocument>();
        for warning in &compiled.warnings {
            tracing::warn!("typst: {}", warning.message);
        }

        compiled
            .output
            .map_err(|e| Error::Render(format!("Typst compilation failed: {:?}", e)))
    }
}
