//! Command vectors run inside the container.
//!
//! Pure functions over a validated [`SlideSource`] and user flags. Nothing
//! here touches the filesystem or the engine.

use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};
use crate::source::SlideSource;

/// Default `--timeout` for exports, in milliseconds.
pub const DEFAULT_EXPORT_TIMEOUT_MS: u64 = 60_000;

/// A command plus the file it is expected to produce, relative to the deck's
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedCommand {
    pub command: Vec<String>,
    pub output: Option<String>,
}

/// Builder for argument vectors.
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    args: Vec<String>,
}

impl CommandBuilder {
    /// Start a command from its program name.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            args: vec![program.into()],
        }
    }

    /// `npx slidev`.
    pub fn slidev() -> Self {
        Self::new("npx").arg("slidev")
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append `flag` only when `enabled`.
    pub fn flag(self, flag: &str, enabled: bool) -> Self {
        if enabled {
            self.arg(flag)
        } else {
            self
        }
    }

    /// Append `name value` when a value is given.
    pub fn option(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.arg(name).arg(value),
            None => self,
        }
    }

    pub fn build(self) -> Vec<String> {
        self.args
    }
}

/// Flags for `export`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub with_clicks: bool,
    pub with_toc: bool,
    /// Milliseconds; omitted from the command when unset
    pub timeout_ms: Option<u64>,
}

/// Flags for `spa`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaOptions {
    pub with_clicks: bool,
    pub with_toc: bool,
    /// Offer a downloadable PDF in the built app
    pub download: bool,
    /// Public base path; must begin and end with `/`
    pub base: String,
}

impl Default for SpaOptions {
    fn default() -> Self {
        Self {
            with_clicks: false,
            with_toc: false,
            download: false,
            base: "/".to_string(),
        }
    }
}

/// Dev server with remote control enabled.
pub fn run(source: &SlideSource) -> PreparedCommand {
    PreparedCommand {
        command: CommandBuilder::slidev()
            .arg(source.file_name())
            .arg("--remote")
            .build(),
        output: None,
    }
}

/// PDF export next to the deck.
pub fn export(source: &SlideSource, options: &ExportOptions) -> PreparedCommand {
    let output = source.with_extension("pdf");

    let command = CommandBuilder::slidev()
        .arg("export")
        .arg(source.file_name())
        .arg("--format")
        .arg("pdf")
        .arg("--output")
        .arg(&output)
        .flag("--with-clicks", options.with_clicks)
        .flag("--with-toc", options.with_toc)
        .option("--timeout", options.timeout_ms.map(|t| t.to_string()))
        .build();

    PreparedCommand {
        command,
        output: Some(output),
    }
}

/// Ghostscript pass over an exported PDF.
pub fn compress_pdf(source: &SlideSource) -> PreparedCommand {
    let input = source.with_extension("pdf");
    let output = format!("{}-compressed.pdf", source.stem());

    let command = CommandBuilder::new("gs")
        .arg("-sDEVICE=pdfwrite")
        .arg("-dCompatibilityLevel=1.4")
        .arg("-dPDFSETTINGS=/printer")
        .arg("-dNOPAUSE")
        .arg("-dQUIET")
        .arg("-dBATCH")
        .arg(format!("-sOutputFile={}", output))
        .arg(input)
        .build();

    PreparedCommand {
        command,
        output: Some(output),
    }
}

/// Static single-page app build into `dist/`.
pub fn spa(source: &SlideSource, options: &SpaOptions) -> RunnerResult<PreparedCommand> {
    if !options.base.starts_with('/') || !options.base.ends_with('/') {
        return Err(RunnerError::InvalidOption(format!(
            "--base must begin and end with a slash, got '{}'",
            options.base
        )));
    }

    let base = (options.base != "/").then(|| options.base.clone());

    let command = CommandBuilder::slidev()
        .arg("build")
        .arg(source.file_name())
        .flag("--with-clicks", options.with_clicks)
        .flag("--with-toc", options.with_toc)
        .flag("--download", options.download)
        .option("--base", base)
        .build();

    Ok(PreparedCommand {
        command,
        output: Some("dist".to_string()),
    })
}

/// Interactive shell with the deck directory mounted.
pub fn shell() -> PreparedCommand {
    PreparedCommand {
        command: CommandBuilder::new("bash").build(),
        output: None,
    }
}
