//! Integration tests for the Stencil CLI.
//!
//! Runs each subcommand against a temporary vault to check output, files
//! written and failure behavior.

use anyhow::Result;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Path to the stencil binary built for this test run
fn stencil_bin() -> &'static str {
    env!("CARGO_BIN_EXE_stencil")
}

/// Runs stencil against `vault` without any API key in the environment.
fn stencil(vault: &Path, args: &[&str]) -> Result<Output> {
    let output = Command::new(stencil_bin())
        .arg("--vault")
        .arg(vault)
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .output()?;
    Ok(output)
}

/// Helper to create an initialized vault
fn create_test_vault() -> Result<TempDir> {
    let vault = tempfile::tempdir()?;
    let output = stencil(vault.path(), &["init"])?;
    assert!(output.status.success(), "init failed: {:?}", output);
    Ok(vault)
}

#[test]
fn test_cli_version() -> Result<()> {
    let output = Command::new(stencil_bin()).arg("--version").output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("stencil"));

    Ok(())
}

#[test]
fn test_cli_help() -> Result<()> {
    let output = Command::new(stencil_bin()).arg("--help").output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("init"));
    assert!(stdout.contains("templates"));
    assert!(stdout.contains("generate"));
    assert!(stdout.contains("vars"));

    Ok(())
}

#[test]
fn test_init_command_success() -> Result<()> {
    let vault = tempfile::tempdir()?;

    let output = stencil(vault.path(), &["init"])?;

    assert!(output.status.success(), "Init command failed: {:?}", output);
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Vault initialized"));

    let templates = vault.path().join("smart-templates");
    assert!(templates.join("default/summary.md").exists());
    assert!(templates.join("default/notes.md").exists());
    assert!(templates.join("default/mermaid.md").exists());
    let registry = std::fs::read_to_string(templates.join("var_prompts.json"))?;
    assert!(registry.contains("A brief summary paragraph."));

    Ok(())
}

#[test]
fn test_init_keeps_edited_template() -> Result<()> {
    let vault = create_test_vault()?;
    let summary = vault.path().join("smart-templates/default/summary.md");
    std::fs::write(&summary, "# Mine\n{{summary}}\n")?;

    let output = stencil(vault.path(), &["init"])?;

    assert!(output.status.success());
    assert_eq!(std::fs::read_to_string(&summary)?, "# Mine\n{{summary}}\n");

    Ok(())
}

#[test]
fn test_missing_vault_fails() -> Result<()> {
    let vault = tempfile::tempdir()?;
    let missing = vault.path().join("nope");

    let output = stencil(&missing, &["templates"])?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("does not exist"));

    Ok(())
}

#[test]
fn test_templates_lists_commands() -> Result<()> {
    let vault = create_test_vault()?;

    let output = stencil(vault.path(), &["templates"])?;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("default/summary.md"));
    assert!(stdout.contains("summary-generate"));
    assert!(stdout.contains("mermaid-replace"));

    Ok(())
}

#[test]
fn test_inspect_shows_registry_prompt() -> Result<()> {
    let vault = create_test_vault()?;

    let output = stencil(vault.path(), &["inspect", "summary"])?;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("summary  [prompted]"));
    assert!(stdout.contains("A brief summary paragraph."));

    Ok(())
}

#[test]
fn test_inspect_unknown_template_fails() -> Result<()> {
    let vault = create_test_vault()?;

    let output = stencil(vault.path(), &["inspect", "does-not-exist"])?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("template not found"));

    Ok(())
}

#[test]
fn test_vars_set_list_remove() -> Result<()> {
    let vault = create_test_vault()?;

    let output = stencil(vault.path(), &["vars", "set", "keywords", "Five keywords."])?;
    assert!(output.status.success());

    let output = stencil(vault.path(), &["vars", "list"])?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines[0].contains("[active]"));
    assert!(stdout.contains("keywords  [unused]  Five keywords."));

    let output = stencil(vault.path(), &["vars", "remove", "keywords"])?;
    assert!(output.status.success());
    let registry = std::fs::read_to_string(vault.path().join("smart-templates/var_prompts.json"))?;
    assert!(!registry.contains("keywords"));

    Ok(())
}

#[test]
fn test_generate_inline_only_template_offline() -> Result<()> {
    let vault = create_test_vault()?;
    std::fs::write(
        vault.path().join("smart-templates/source.md"),
        "Source: {{file_path}}\n",
    )?;
    std::fs::write(vault.path().join("note.md"), "Body\n")?;

    let output = stencil(vault.path(), &["generate", "source", "note.md"])?;

    assert!(output.status.success(), "generate failed: {:?}", output);
    assert_eq!(
        std::fs::read_to_string(vault.path().join("note.md"))?,
        "Body\nSource: note.md\n"
    );

    Ok(())
}

#[test]
fn test_generate_with_selected_lines() -> Result<()> {
    let vault = create_test_vault()?;
    std::fs::write(
        vault.path().join("smart-templates/quote.md"),
        "> {{selection}}\n",
    )?;
    std::fs::write(vault.path().join("note.md"), "one\ntwo\nthree\n")?;

    let output = stencil(vault.path(), &["generate", "quote", "note.md", "--lines", "2:2"])?;

    assert!(output.status.success(), "generate failed: {:?}", output);
    assert_eq!(
        std::fs::read_to_string(vault.path().join("note.md"))?,
        "one\ntwo\nthree\n> two\n"
    );

    Ok(())
}

#[test]
fn test_generate_without_api_key_leaves_note_unchanged() -> Result<()> {
    let vault = create_test_vault()?;
    std::fs::write(vault.path().join("note.md"), "Meeting notes\n")?;

    let output = stencil(vault.path(), &["generate", "summary", "note.md"])?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("OPENAI_API_KEY"));
    assert_eq!(
        std::fs::read_to_string(vault.path().join("note.md"))?,
        "Meeting notes\n"
    );

    Ok(())
}

#[test]
fn test_generate_invalid_line_range_fails() -> Result<()> {
    let vault = create_test_vault()?;
    std::fs::write(vault.path().join("note.md"), "one\n")?;

    let output = stencil(vault.path(), &["generate", "summary", "note.md", "--lines", "3:9"])?;

    assert!(!output.status.success());
    assert_eq!(std::fs::read_to_string(vault.path().join("note.md"))?, "one\n");

    Ok(())
}
