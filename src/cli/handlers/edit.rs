// src/cli/handlers/edit.rs

//! # Handler for the `edit` command
//!
//! Opens a module in the configured editor (`editor` in `config.toml`, then `$VISUAL`,
//! `$EDITOR`, `vi`), validates the result, and reloads.
//!
//! ## Core Logic
//!
//! - **Backup**: the module's bytes are held in memory before the editor starts.
//! - **Validation**: an edit that no longer parses triggers a three-way prompt: edit again,
//!   restore the backup and stop, or keep the broken file.
//! - **Reload**: a valid (or knowingly kept) edit is followed by a full reload so the
//!   effect on every module is visible at once.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use dialoguer::{Select, theme::ColorfulTheme};

use crate::{
    cli::handlers::commons,
    core::{
        orchestrator::{EditChoice, EditOutcome, EditPrompt, SystemEditor},
        parser::ValidationError,
        settings::Settings,
    },
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Edits a module, validates it, and reloads."
)]
struct EditArgs {
    /// The module to edit.
    name: String,
}

/// Asks through an interactive `Select`. A cancelled prompt restores the backup.
#[derive(Debug, Default)]
struct DialoguerPrompt;

impl EditPrompt for DialoguerPrompt {
    fn on_invalid(&mut self, module: &str, error: &ValidationError) -> EditChoice {
        eprintln!(
            "\n{} {}",
            t!("common.error").red().bold(),
            format!(t!("edit.error.invalid"), name = module.cyan(), error = error)
        );

        let choices = [
            (t!("edit.choice.re_edit"), EditChoice::ReEdit),
            (t!("edit.choice.restore"), EditChoice::RestoreAndAbort),
            (t!("edit.choice.keep"), EditChoice::KeepDespiteErrors),
        ];
        let labels: Vec<&str> = choices.iter().map(|(label, _)| *label).collect();

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("edit.prompt.what_now"))
            .items(&labels)
            .default(0)
            .interact_opt();

        match selection {
            Ok(Some(index)) => choices
                .get(index)
                .map_or(EditChoice::RestoreAndAbort, |(_, choice)| *choice),
            Ok(None) => EditChoice::RestoreAndAbort,
            Err(e) => {
                log::warn!("Prompt failed, restoring backup: {}", e);
                EditChoice::RestoreAndAbort
            }
        }
    }
}

pub fn handle(args: Vec<String>, settings: &Settings) -> Result<()> {
    let edit_args = EditArgs::try_parse_from(&args)?;
    let mut orchestrator = commons::build_orchestrator(settings, false);
    let mut editor = SystemEditor::new(&settings.editor);

    let outcome = orchestrator.edit(&edit_args.name, &mut editor, &mut DialoguerPrompt)?;

    match outcome {
        EditOutcome::Unchanged | EditOutcome::Restored => {}
        EditOutcome::Reloaded(_) | EditOutcome::KeptWithErrors(_) => {
            eprintln!("{}", t!("edit.info.apply_hint").dimmed());
        }
    }
    Ok(())
}
