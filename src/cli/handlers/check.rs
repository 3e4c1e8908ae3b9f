// src/cli/handlers/check.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::Colorize;

use crate::{
    cli::handlers::commons::{self, pad},
    core::{health, registry::Registry, settings::Settings},
    models::HealthReport,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Runs static diagnostics over modules without loading them."
)]
struct CheckArgs {
    /// Check only this module.
    name: Option<String>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

pub fn handle(args: Vec<String>, settings: &Settings) -> Result<()> {
    let check_args = CheckArgs::try_parse_from(&args)?;
    let mut registry = Registry::new(&settings.modules_dir, settings.disabled.clone());
    let modules = registry.discover()?;

    let report = match &check_args.name {
        Some(name) => {
            let module = modules
                .iter()
                .find(|m| m.name() == name)
                .ok_or_else(|| anyhow!(t!("check.error.not_found"), name = name))?;
            HealthReport {
                modules: vec![health::check(module)],
            }
        }
        None => health::check_all(modules),
    };

    if check_args.json {
        commons::print_json(&report)?;
    } else {
        print_report(&report);
    }

    if report.failed() > 0 {
        return Err(anyhow!(t!("check.error.failures"), count = report.failed()));
    }
    Ok(())
}

fn print_report(report: &HealthReport) {
    if report.modules.is_empty() {
        println!("\n{}", t!("check.info.no_modules"));
        return;
    }

    let name_width = report
        .modules
        .iter()
        .map(|m| m.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(t!("check.header.module").len());

    println!(
        "\n{}  {}  {}",
        pad(t!("check.header.module"), name_width).bold(),
        pad(t!("check.header.status"), 6).bold(),
        t!("check.header.first_issue").bold()
    );

    for module in &report.modules {
        let (status, issue) = if module.pass {
            (t!("check.status.pass").green(), String::new())
        } else {
            (
                t!("check.status.fail").red().bold(),
                health::first_issue_summary(module).unwrap_or_default(),
            )
        };
        println!(
            "{}  {}  {}",
            pad(&module.name, name_width),
            pad(&status.to_string(), 6),
            issue
        );
    }

    println!(
        "\n{}",
        format!(
            t!("check.info.summary"),
            passed = report.passed(),
            failed = report.failed()
        )
    );
}
