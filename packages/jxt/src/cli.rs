//! Command-line interface for the registry.

use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use serde_json::Value;

use crate::error::{JxtError, Result};
use crate::registry::{Imported, Registry, TranslationContext};
use crate::stanzas::define_core_stanzas;
use crate::xml::{parse, QualifiedName};

/// JXT - Translate XMPP stanzas between XML and JSON.
#[derive(Parser)]
#[command(name = "jxt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import an XML stanza and print it as structured data.
    Import {
        /// XML file to import
        file: std::path::PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[command(flatten)]
        language: LanguageArgs,
    },

    /// Export JSON data through the translator at a dotted path.
    Export {
        /// Dotted path, e.g. `message` or `iq.error`
        path: String,

        /// JSON file holding the data object
        file: std::path::PathBuf,

        #[command(flatten)]
        language: LanguageArgs,
    },

    /// List the registered top-level paths.
    Paths,
}

#[derive(clap::Args, Debug, Default)]
pub struct LanguageArgs {
    /// Inherited language of the stanza
    #[arg(long)]
    pub lang: Option<String>,

    /// Accepted languages, most preferred first (comma separated)
    #[arg(long = "accept-language", value_delimiter = ',')]
    pub accept_languages: Vec<String>,
}

impl LanguageArgs {
    fn context(&self) -> TranslationContext<'static> {
        let context = TranslationContext::new().with_accept_languages(self.accept_languages.clone());
        match &self.lang {
            Some(lang) => context.with_lang(lang.clone()),
            None => context,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut registry = Registry::new();
    define_core_stanzas(&mut registry);

    match cli.command {
        Commands::Import {
            file,
            format,
            language,
        } => {
            let output = import_command(&registry, &file, format, &language)?;
            println!("{output}");
        }
        Commands::Export {
            path,
            file,
            language,
        } => {
            let output = export_command(&registry, &path, &file, &language)?;
            println!("{output}");
        }
        Commands::Paths => paths_command(&registry),
    }

    Ok(())
}

/// Import an XML file and render the result.
fn import_command(
    registry: &Registry,
    file: &Path,
    format: OutputFormat,
    language: &LanguageArgs,
) -> Result<String> {
    let xml = parse(&fs::read_to_string(file)?)?;
    let imported = registry
        .import(&xml, language.context())?
        .ok_or_else(|| JxtError::UnknownElement {
            namespace: xml.namespace().to_string(),
            name: xml.name().to_string(),
        })?;

    tracing::debug!(path = %imported.path, fields = imported.data.len(), "Imported stanza");
    render(&imported, format)
}

fn render(imported: &Imported, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(imported)?),
        OutputFormat::Yaml => Ok(serde_yaml_ng::to_string(imported)?),
    }
}

/// Export a JSON file through the translator at `path`.
fn export_command(
    registry: &Registry,
    path: &str,
    file: &Path,
    language: &LanguageArgs,
) -> Result<String> {
    let data: Value = serde_json::from_str(&fs::read_to_string(file)?)?;
    let xml = registry
        .export(path, &data, language.context())?
        .ok_or_else(|| JxtError::UnknownPath(path.to_string()))?;
    Ok(xml.to_string())
}

fn paths_command(registry: &Registry) {
    let paths = registry.paths();
    println!("{} registered paths:", style(paths.len()).bold());
    for path in paths {
        println!("  {}", style(path).cyan());
    }
}
