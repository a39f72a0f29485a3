use crate::agents::project_scanner::REQUIRED_TOOLS;
use crate::agents::update::{
    AutoApprove, Prompter, PushStatus, TerminalPrompter, UpdateWorkflow, WorkflowOptions,
    drupal_classifier,
};
use crate::agents::{
    ComposerAgent, PackageCandidate, PackageSource, ProjectScannerAgent, UpdateReport,
    VersionControlAgent,
};
use crate::cli::UpdateArgs;
use crate::config::{PinnedSet, Settings};
use crate::error::Result;
use colored::Colorize;
use jiff::Zoned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Execute the update workflow
pub fn execute_update<P: AsRef<Path>>(project_path: P, args: UpdateArgs) -> Result<()> {
    println!("{}", "Starting dependency update process...".cyan().bold());

    // Step 1: Validate project structure and tooling
    println!("\n{}", "1. Validating project structure...".yellow());
    let scanner = ProjectScannerAgent::new(project_path.as_ref());
    let project_info = scanner.validate()?;
    scanner.ensure_tools(REQUIRED_TOOLS)?;
    println!("{}", "✓ Project structure is valid".green());
    if !project_info.has_lock_file {
        println!(
            "{}",
            "⚠ composer.lock is missing; updates will be detected from composer.json only".yellow()
        );
    }
    let project_path = project_info.project_path.as_path();

    // Step 2: Configuration
    println!("\n{}", "2. Loading configuration...".yellow());
    let settings = apply_overrides(Settings::load(project_path)?, &args);
    let pinned = load_pinned(project_path, &settings)?;

    // Step 3: Preconditions on the working tree
    println!("\n{}", "3. Checking Git status...".yellow());
    let timeout = settings.command_timeout();
    let git_agent = VersionControlAgent::new(project_path, timeout)?;
    let composer = ComposerAgent::new(project_path, settings.tracked_files.clone(), timeout);
    let mut prompter: Box<dyn Prompter> = if args.yes {
        Box::new(AutoApprove)
    } else {
        Box::new(TerminalPrompter::open())
    };

    let mut workflow = UpdateWorkflow::initialize(
        &composer,
        &git_agent,
        prompter.as_mut(),
        WorkflowOptions::from(&settings),
        pinned,
    )?;
    println!("{}", "✓ Working directory is clean".green());
    println!(
        "   On branch {}",
        workflow.state().original_branch.bright_cyan()
    );

    // Step 4: Per-package updates
    println!("\n{}", "4. Checking for outdated packages...".yellow());
    let today = Zoned::now().date();
    let report = workflow.run(today, drupal_classifier)?;

    // Step 5: Summary
    print_update_report(&report);

    println!(
        "\n{}",
        "✨ Update process completed successfully!".green().bold()
    );
    Ok(())
}

/// Execute the check workflow (read-only)
pub fn execute_check<P: AsRef<Path>>(project_path: P, include_dev: bool) -> Result<()> {
    println!(
        "{}",
        "Checking for outdated direct dependencies...".cyan().bold()
    );

    println!("\n{}", "1. Validating project structure...".yellow());
    let scanner = ProjectScannerAgent::new(project_path.as_ref());
    let project_info = scanner.validate()?;
    scanner.ensure_tools(&["composer"])?;
    println!("{}", "✓ Project structure is valid".green());
    let project_path = project_info.project_path.as_path();

    println!("\n{}", "2. Loading configuration...".yellow());
    let mut settings = Settings::load(project_path)?;
    settings.include_dev |= include_dev;
    let pinned = load_pinned(project_path, &settings)?;

    println!("\n{}", "3. Asking composer...".yellow());
    let composer = ComposerAgent::new(
        project_path,
        settings.tracked_files.clone(),
        settings.command_timeout(),
    );
    let candidates = composer.list_outdated_direct(settings.include_dev)?;
    println!("{}", "✓ Check completed".green());

    print_available_updates(&candidates, &pinned);
    Ok(())
}

fn apply_overrides(mut settings: Settings, args: &UpdateArgs) -> Settings {
    settings.include_dev |= args.include_dev;
    if let Some(remote) = &args.remote {
        settings.remote = remote.clone();
    }
    if let Some(timeout) = args.timeout {
        settings.command_timeout_secs = timeout;
    }
    settings
}

fn load_pinned(project_path: &Path, settings: &Settings) -> Result<PinnedSet> {
    let ignore_file: PathBuf = project_path.join(&settings.ignore_file);
    let pinned = PinnedSet::load(&ignore_file)?;
    if pinned.is_empty() {
        println!("   No pinned packages");
    } else {
        println!(
            "   {} pinned package(s) from {}",
            pinned.len(),
            settings.ignore_file.display().to_string().bright_cyan()
        );
    }
    Ok(pinned)
}

fn print_available_updates(candidates: &[PackageCandidate], pinned: &PinnedSet) {
    if candidates.is_empty() {
        println!("\n{}", "✨ All direct dependencies are up to date!".green().bold());
        return;
    }

    println!("\n{}", "📦 Available Updates:".cyan().bold());
    println!(
        "{}",
        format!("Found {} outdated package(s)", candidates.len()).yellow()
    );

    let mut groups: BTreeMap<String, Vec<&PackageCandidate>> = BTreeMap::new();
    for candidate in candidates {
        groups
            .entry(drupal_classifier(candidate))
            .or_default()
            .push(candidate);
    }

    for (group, mut members) in groups {
        members.sort_by(|a, b| a.name.cmp(&b.name));
        println!("\n{}:", group.cyan().bold());
        for candidate in members {
            let status = candidate
                .latest_status
                .as_deref()
                .map(|s| format!(" ({s})"))
                .unwrap_or_default();
            let marker = if pinned.contains(&candidate.name) {
                " [pinned]".dimmed().to_string()
            } else {
                String::new()
            };
            println!(
                "  • {} {} → {}{}{}",
                candidate.name.white().bold(),
                candidate.current_version.red(),
                candidate.latest_version.green().bold(),
                status.dimmed(),
                marker
            );
        }
    }

    println!("\n{}", "To apply these updates, run:".dimmed());
    println!("  {}", "drupdate update".cyan());
}

fn print_update_report(report: &UpdateReport) {
    if report.is_empty() {
        println!("\n{}", "No updates were found".yellow());
        return;
    }

    println!("\n{}", "Update Summary:".cyan().bold());
    if let Some(branch) = &report.branch {
        println!("  Branch: {}", branch.bright_cyan());
    }
    println!(
        "{}",
        format!(
            "  Commits made: {} ({} updated, {} not updated)",
            report.commits,
            report.total_updates(),
            report.total_not_updated()
        )
        .green()
    );

    if !report.updated.is_empty() {
        println!("\n{}:", "Updated".green().bold());
        for (group, entries) in &report.updated {
            println!("  {}", group.cyan());
            for entry in entries {
                println!("    • {}", entry.to_string().green());
            }
        }
    }

    if !report.not_updated.is_empty() {
        println!("\n{}:", "Not updated".yellow().bold());
        for (group, entries) in &report.not_updated {
            println!("  {}", group.cyan());
            for entry in entries {
                println!("    • {}", entry.to_string().dimmed());
                if let Some(detail) = entry.detail.as_deref().and_then(|d| d.lines().next()) {
                    println!("      {}", detail.dimmed());
                }
            }
        }
    }

    match &report.push {
        PushStatus::Pushed => println!("\n{}", "✓ Branch pushed".green()),
        PushStatus::Failed(reason) => {
            eprintln!("\n{}", format!("⚠ Branch was not pushed: {reason}").yellow());
            println!("{}", "  Local commits are kept; push manually when ready.".dimmed());
        }
        PushStatus::Declined => println!("\n{}", "Branch not pushed".dimmed()),
        PushStatus::NotOffered => {}
    }

    if report.returned_to_original {
        println!(
            "{}",
            format!("Switched back to {}", report.original_branch).dimmed()
        );
    }
    if report.branch_deleted {
        println!("{}", "Removed the empty update branch".dimmed());
    }

    if !report.warnings.is_empty() {
        println!("\n{}", "Warnings:".yellow().bold());
        for warning in &report.warnings {
            println!("  ⚠ {}", warning.yellow());
        }
    }
}
