//! Stencil CLI - template engine for markdown notes
//!
//! Command-line interface for Stencil: prepare a vault, manage the variable
//! prompt registry and apply templates to notes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use stencil_core::tools::document_impl::FileDocument;
use stencil_core::{MergeMode, MissingValuePolicy, StencilConfig, StencilRuntime};
use tracing::{error, info};

/// Stencil - AI-filled templates for markdown notes
///
/// Templates declare variables; Stencil fills them from the note or asks a
/// language model, then merges the result into the note.
#[derive(Parser)]
#[command(name = "stencil", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Vault root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    vault: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available Stencil commands
#[derive(Subcommand)]
enum Commands {
    /// Prepare the vault for templates
    ///
    /// Creates the templates folder with the bundled defaults and the
    /// variable prompt registry. Existing files are kept.
    Init,

    /// List templates with their command ids
    Templates,

    /// Show the variables a template declares
    Inspect {
        /// Template name, path or command id
        template: String,
    },

    /// Manage the variable prompt registry
    Vars {
        #[command(subcommand)]
        command: VarsCommand,
    },

    /// Apply a template to a note
    ///
    /// Renders the template against the note (or a part of it) and merges
    /// the output into the note.
    Generate {
        /// Template name, path or command id
        template: String,

        /// Note to update, relative to the vault root
        file: PathBuf,

        /// Replace sections with matching headings instead of appending
        #[arg(long)]
        replace: bool,

        /// Use this text as the context instead of the note
        #[arg(long, conflicts_with = "lines")]
        selection: Option<String>,

        /// Use lines A:B of the note (1-based, inclusive) as the context
        #[arg(long, value_name = "A:B")]
        lines: Option<String>,

        /// Render unresolved variables as empty text instead of failing
        #[arg(long)]
        degrade: bool,
    },
}

#[derive(Subcommand)]
enum VarsCommand {
    /// List registry entries, active variables first
    List,

    /// Record variables declared by templates
    Sync,

    /// Set the prompt of a variable
    Set {
        /// Variable name
        name: String,
        /// Instruction sent to the model
        prompt: String,
    },

    /// Remove a variable from the registry
    Remove {
        /// Variable name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing subscriber
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = run_command(cli.vault, cli.command).await {
        // Log with tracing
        error!("Command failed: {:#}", e);
        // Also print to stderr for CLI users
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize tracing subscriber for structured logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if verbose {
        EnvFilter::new("stencil=debug,stencil_core=debug,stencil_pm=debug")
    } else {
        EnvFilter::new("stencil=info,stencil_core=info,stencil_pm=info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();
}

/// Execute the specified command
async fn run_command(vault: Option<PathBuf>, command: Commands) -> Result<()> {
    let vault_root = resolve_vault(vault)?;
    let config = StencilConfig::load(vault_root.clone()).context("Failed to load Stencil configuration")?;
    let runtime = StencilRuntime::new(config).context("Failed to create Stencil runtime")?;
    info!("Vault root: {}", vault_root.display());

    match command {
        Commands::Init => run_init(&runtime),
        Commands::Templates => run_templates(&runtime),
        Commands::Inspect { template } => run_inspect(&runtime, &template),
        Commands::Vars { command } => run_vars(&runtime, command),
        Commands::Generate {
            template,
            file,
            replace,
            selection,
            lines,
            degrade,
        } => {
            let mode = if replace { MergeMode::ReplaceBlocks } else { MergeMode::Append };
            let policy = if degrade {
                MissingValuePolicy::Empty
            } else {
                MissingValuePolicy::Abort
            };
            run_generate(&runtime, &template, &file, mode, policy, selection, lines).await
        }
    }
}

/// Run the init command
fn run_init(runtime: &StencilRuntime) -> Result<()> {
    let report = runtime.init_vault().context("Failed to initialize vault")?;

    println!("✔ Templates folder: {}", runtime.config.templates_dir.display());
    for path in &report.created_templates {
        println!("✔ Created {}", runtime.store.display_name(path));
    }
    if report.created_registry {
        println!("✔ Created {}", runtime.config.var_prompts_file.display());
    }
    if !report.seeded.is_empty() {
        println!("✔ Added default prompts: {}", report.seeded.join(", "));
    }
    println!("\nVault initialized for Stencil!");
    println!("\nNext steps:");
    println!("  stencil templates                     List templates");
    println!("  stencil generate <template> <note>    Apply a template");

    Ok(())
}

/// Run the templates command
fn run_templates(runtime: &StencilRuntime) -> Result<()> {
    let templates = runtime.list_templates().context("Failed to list templates")?;
    if templates.is_empty() {
        println!("No templates in {}", runtime.config.templates_dir.display());
        println!("Run 'stencil init' to add the default templates.");
        return Ok(());
    }

    for t in templates {
        println!(
            "{}  ({} variables)  {}  {}",
            t.name, t.variables, t.generate_command, t.replace_command
        );
    }
    Ok(())
}

/// Run the inspect command
fn run_inspect(runtime: &StencilRuntime, template: &str) -> Result<()> {
    let decls = runtime
        .inspect(template)
        .with_context(|| format!("Failed to inspect template '{template}'"))?;
    if decls.is_empty() {
        println!("No variables declared.");
        return Ok(());
    }

    for decl in decls {
        let kind = if decl.inline { "inline" } else { "prompted" };
        print!("{}  [{}]", decl.name, kind);
        if let Some(prompt) = decl.prompt.as_deref().filter(|p| !p.is_empty()) {
            print!("  prompt: {}", prompt.replace('\n', "\\n"));
        }
        if let Some(default) = &decl.default {
            print!("  default: {}", default.replace('\n', "\\n"));
        }
        println!();
    }
    Ok(())
}

/// Run the vars subcommands
fn run_vars(runtime: &StencilRuntime, command: VarsCommand) -> Result<()> {
    match command {
        VarsCommand::List => {
            let entries = runtime.var_prompt_entries().context("Failed to read var prompts")?;
            if entries.is_empty() {
                println!("No variables recorded.");
            }
            for entry in entries {
                let marker = if entry.active { "active" } else { "unused" };
                println!("{}  [{}]  {}", entry.name, marker, entry.prompt.replace('\n', "\\n"));
            }
        }
        VarsCommand::Sync => {
            let report = runtime.sync_var_prompts().context("Failed to sync var prompts")?;
            println!(
                "✔ Scanned {} templates, {} active variables{}",
                report.templates,
                report.active.len(),
                if report.changed { " (registry updated)" } else { "" }
            );
        }
        VarsCommand::Set { name, prompt } => {
            if runtime.set_var_prompt(&name, &prompt).context("Failed to save var prompt")? {
                println!("✔ Updated prompt for {name}");
            } else {
                println!("Prompt for {name} unchanged");
            }
        }
        VarsCommand::Remove { name } => {
            if runtime.remove_var_prompt(&name).context("Failed to save var prompts")? {
                println!("✔ Removed {name}");
            } else {
                println!("{name} is not in the registry");
            }
        }
    }
    Ok(())
}

/// Run the generate command
async fn run_generate(
    runtime: &StencilRuntime,
    template: &str,
    file: &Path,
    mode: MergeMode,
    policy: MissingValuePolicy,
    selection: Option<String>,
    lines: Option<String>,
) -> Result<()> {
    let mut doc: FileDocument<'_> = runtime
        .open_document(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    if let Some(selection) = selection {
        doc = doc.with_selection(selection);
    }
    if let Some(lines) = lines {
        let (start, end) = parse_line_range(&lines)?;
        doc = doc.with_line_selection(start, end)?;
    }

    let outcome = runtime
        .generate(template, &mut doc, mode, policy)
        .await
        .with_context(|| format!("Failed to apply template '{template}'"))?;

    println!("✔ Applied {template} to {} ({mode})", file.display());
    if outcome.merge.degraded {
        println!("  note: sections could not be replaced, output was appended");
    }
    if !outcome.render.missing.is_empty() {
        println!("  note: left empty: {}", outcome.render.missing.join(", "));
    }
    Ok(())
}

/// Parses `A:B` into a 1-based inclusive line range.
fn parse_line_range(raw: &str) -> Result<(usize, usize)> {
    let (start, end) = raw
        .split_once(':')
        .with_context(|| format!("Invalid line range '{raw}', expected A:B"))?;
    let start = start
        .trim()
        .parse()
        .with_context(|| format!("Invalid start line in '{raw}'"))?;
    let end = end
        .trim()
        .parse()
        .with_context(|| format!("Invalid end line in '{raw}'"))?;
    Ok((start, end))
}

/// Resolve the vault root from `--vault` or the current directory
fn resolve_vault(vault: Option<PathBuf>) -> Result<PathBuf> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let root = match vault {
        Some(dir) if dir.is_absolute() => dir,
        Some(dir) => current_dir.join(dir),
        None => current_dir,
    };
    if !root.is_dir() {
        anyhow::bail!("Vault directory does not exist: {}", root.display());
    }
    Ok(root)
}
