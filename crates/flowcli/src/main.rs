// crates/flowcli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flowconvert::{demo_workflow, import_file, to_legacy, write_document, ExportDocument};
use flowcore::Workflow;
use flowstore::{node_palette, WorkflowStore};
use flowvalidate::{validate_workflow, ValidationResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Workflow document converter and validator", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a workflow in any accepted format and save it as an export document
    Import {
        /// Legacy, export or internal JSON file
        file: PathBuf,

        /// Output file path (prints a summary only when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a workflow file
    Validate {
        /// Legacy, export or internal JSON file
        file: PathBuf,
    },

    /// Convert a workflow to the legacy format
    Legacy {
        file: PathBuf,

        /// Output file path
        #[arg(short, long, default_value = "workflow.legacy.json")]
        output: PathBuf,
    },

    /// Wrap a workflow in an export document
    Export {
        file: PathBuf,

        /// Output file path
        #[arg(short, long, default_value = "workflow.export.json")]
        output: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new workflow with a start and an end node
    Init {
        /// Workflow name
        #[arg(short, long, default_value = "新建工作流")]
        name: String,

        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },

    /// Convert the bundled outpatient registration workflow
    Demo {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Import { file, output } => import_workflow(&file, output.as_deref()),
        Commands::Validate { file } => validate_file(&file),
        Commands::Legacy { file, output } => convert_to_legacy(&file, &output),
        Commands::Export { file, output } => export_workflow(&file, &output),
        Commands::Nodes => {
            list_nodes();
            Ok(())
        }
        Commands::Init { name, output } => create_workflow(&name, &output),
        Commands::Demo { output } => run_demo(output.as_deref()),
    }
}

/// Reads a workflow from any of the accepted import shapes.
fn read_workflow(file: &Path) -> Result<Workflow> {
    tracing::debug!("Reading {}", file.display());
    import_file(file).with_context(|| format!("Failed to import {}", file.display()))
}

fn write_json<T: Serialize>(output: &Path, value: &T) -> Result<()> {
    write_document(output, value).with_context(|| format!("Failed to write {}", output.display()))
}

fn print_summary(workflow: &Workflow) {
    println!("📋 Workflow: {} ({})", workflow.name, workflow.id);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!("   Variables: {}", workflow.variables.len());
    println!("   Expressions: {}", workflow.expressions.len());
}

fn print_validation(result: &ValidationResult) {
    for issue in &result.errors {
        println!("  ❌ {}", issue);
    }
    for issue in &result.warnings {
        println!("  ⚠️  {}", issue);
    }
    if result.is_valid {
        println!("✅ {}", result.summary());
    } else {
        println!("💥 {}", result.summary());
    }
}

fn import_workflow(file: &Path, output: Option<&Path>) -> Result<()> {
    println!("📥 Importing workflow from: {}", file.display());

    let workflow = read_workflow(file)?;
    print_summary(&workflow);

    if let Some(output) = output {
        write_json(output, &ExportDocument::new(workflow))?;
        println!();
        println!("✨ Saved to: {}", output.display());
    }

    Ok(())
}

fn validate_file(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = read_workflow(file)?;
    let result = validate_workflow(&workflow);
    print_validation(&result);

    if !result.is_valid {
        bail!("{} has {} validation error(s)", file.display(), result.errors.len());
    }
    Ok(())
}

fn convert_to_legacy(file: &Path, output: &Path) -> Result<()> {
    let workflow = read_workflow(file)?;
    write_json(output, &to_legacy(&workflow))?;

    println!("✨ Wrote legacy workflow: {}", output.display());
    Ok(())
}

fn export_workflow(file: &Path, output: &Path) -> Result<()> {
    let workflow = read_workflow(file)?;
    write_json(output, &ExportDocument::new(workflow))?;

    println!("✨ Wrote export document: {}", output.display());
    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    for template in node_palette() {
        println!("  • {} ({})", template.kind, template.name);
        println!("    {}", template.description);
    }
}

fn create_workflow(name: &str, output: &Path) -> Result<()> {
    let mut store = WorkflowStore::new();
    store.create_workflow(name);
    let workflow = store
        .into_workflow()
        .context("Store did not hold the new workflow")?;

    write_json(output, &ExportDocument::new(workflow))?;

    println!("✨ Created workflow: {}", output.display());
    println!();
    println!("Validate it with:");
    println!("  flow validate {}", output.display());
    Ok(())
}

fn run_demo(output: Option<&Path>) -> Result<()> {
    let workflow = demo_workflow()?;
    print_summary(&workflow);
    println!();
    print_validation(&validate_workflow(&workflow));

    if let Some(output) = output {
        write_json(output, &ExportDocument::new(workflow))?;
        println!();
        println!("✨ Saved to: {}", output.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowconvert::DEMO_LEGACY_JSON;
    use flowcore::NodeKind;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_importable_export() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("new.json");

        create_workflow("流程", &output).unwrap();

        let workflow = read_workflow(&output).unwrap();
        assert_eq!(workflow.name, "流程");
        assert_eq!(workflow.nodes_of_kind(NodeKind::Start).count(), 1);
        assert_eq!(workflow.nodes_of_kind(NodeKind::End).count(), 1);
    }

    #[test]
    fn test_legacy_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("legacy.json");
        let output = dir.path().join("back.json");
        std::fs::write(&source, DEMO_LEGACY_JSON).unwrap();

        convert_to_legacy(&source, &output).unwrap();

        let original = read_workflow(&source).unwrap();
        let restored = read_workflow(&output).unwrap();
        assert_eq!(restored.nodes.len(), original.nodes.len());
        assert_eq!(restored.edges, original.edges);
    }

    #[test]
    fn test_validate_rejects_invalid_workflow() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("empty.json");
        std::fs::write(&file, r#"{ "id": "wf", "name": "empty" }"#).unwrap();

        assert!(validate_file(&file).is_err());
    }

    #[test]
    fn test_import_reports_bad_json() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("broken.json");
        std::fs::write(&file, "{ nope").unwrap();

        let err = import_workflow(&file, None).unwrap_err();
        assert!(format!("{:#}", err).contains("Malformed JSON"), "{:#}", err);
    }
}
