//! Table and JSON rendering for CLI results.

use anyhow::Result;
use clap::ValueEnum;
use console::style;
use serde::Serialize;

use quiver_core::prelude::*;

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("{} {}", style("warning:").yellow().bold(), warning);
    }
}

pub fn print_skills(skills: &[Skill], format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(&skills);
    }
    if skills.is_empty() {
        println!("No skills found.");
        return Ok(());
    }

    println!(
        "{:<18} {:<12} {:<28} {:<10} {:>5}  Path",
        "ID", "Agent", "Name", "Source", "Files"
    );
    println!("{}", "-".repeat(100));
    for skill in skills {
        let source = if skill.is_local {
            style("local".to_string()).green()
        } else {
            style(format!("v{}", skill.version.as_deref().unwrap_or("?"))).cyan()
        };
        println!(
            "{:<18} {:<12} {:<28} {:<10} {:>5}  {}",
            skill.id,
            skill.agent.to_string(),
            truncate(&skill.name, 28),
            source,
            skill.file_count,
            skill.folder_path.display()
        );
    }
    Ok(())
}

pub fn print_skill(skill: &Skill, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(skill);
    }
    println!("{}", style(&skill.name).bold());
    println!("  ID:       {}", skill.id);
    println!("  Agent:    {}", skill.agent);
    println!("  Path:     {}", skill.folder_path.display());
    if let Some(description) = &skill.description {
        println!("  About:    {}", description);
    }
    if !skill.tags.is_empty() {
        println!("  Tags:     {}", skill.tags.join(", "));
    }
    if let Some(version) = &skill.version {
        println!("  Version:  {}", version);
    }
    if let Some(author) = &skill.author {
        println!("  Author:   {}", author);
    }
    println!(
        "  Source:   {}",
        if skill.is_local { "local" } else { "registry (read-only)" }
    );
    println!("  Files:");
    for file in &skill.files {
        let marker = if file.is_entry { "*" } else { " " };
        println!(
            "   {} {:<40} {:>8} B  {:?}",
            marker,
            file.file_path
                .strip_prefix(&skill.folder_path)
                .unwrap_or(&file.file_path)
                .display(),
            file.size,
            file.format
        );
    }
    Ok(())
}

pub fn print_agents(agents: &[AgentConfig], format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(&agents);
    }
    println!("{:<14} {:<20} {:<9} Skills root", "Agent", "Name", "Enabled");
    println!("{}", "-".repeat(80));
    for agent in agents {
        let enabled = if agent.enabled {
            style("yes").green()
        } else {
            style("no").dim()
        };
        println!(
            "{:<14} {:<20} {:<9} {}",
            agent.agent.to_string(),
            agent.name,
            enabled,
            agent.skills_root().display()
        );
    }
    Ok(())
}

pub fn print_registry(registry: &SkillRegistry, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(registry);
    }
    println!("{} ({})", style(&registry.name).bold(), registry.url);
    if let Some(description) = &registry.description {
        println!("{}", description);
    }
    println!();
    println!("{:<24} {:<10} {:<30} Agents", "ID", "Version", "Name");
    println!("{}", "-".repeat(90));
    for skill in &registry.skills {
        let agents: Vec<String> = skill.supported_agents().iter().map(|a| a.to_string()).collect();
        println!(
            "{:<24} {:<10} {:<30} {}",
            skill.id,
            skill.version,
            truncate(&skill.name, 30),
            agents.join(", ")
        );
    }
    Ok(())
}

pub fn print_installed(entries: &[InstalledSkill], format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No registry skills installed.");
        return Ok(());
    }
    println!("{:<24} {:<12} {:<10} {:<20} Registry", "ID", "Agent", "Version", "Installed");
    println!("{}", "-".repeat(100));
    for entry in entries {
        println!(
            "{:<24} {:<12} {:<10} {:<20} {}",
            entry.skill_id,
            entry.agent.to_string(),
            entry.version,
            entry.installed_at.format("%Y-%m-%d %H:%M"),
            entry.registry_url
        );
    }
    Ok(())
}

pub fn print_backups(backups: &[Backup], format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(&backups);
    }
    if backups.is_empty() {
        println!("No backups.");
        return Ok(());
    }
    println!("{:<40} {:<20} Original path", "ID", "Created");
    println!("{}", "-".repeat(100));
    for backup in backups {
        println!(
            "{:<40} {:<20} {}",
            truncate(&backup.id, 40),
            backup.created_at.format("%Y-%m-%d %H:%M"),
            backup.original_path.display()
        );
    }
    Ok(())
}

pub fn print_updates(updates: &[SkillUpdate]) {
    if updates.is_empty() {
        println!("All installed skills are up to date.");
        return;
    }
    println!("{:<24} {:<12} {:<10}    {:<10}", "ID", "Agent", "Current", "Available");
    println!("{}", "-".repeat(70));
    for update in updates {
        let new_version = if update.is_major {
            style(format!("{} (major)", update.new_version)).yellow()
        } else {
            style(update.new_version.clone()).green()
        };
        println!(
            "{:<24} {:<12} {:<10} -> {}",
            update.skill_id,
            update.agent.to_string(),
            update.current_version,
            new_version
        );
        if let Some(changelog) = &update.changelog {
            println!("    {}", style(truncate(changelog, 90)).dim());
        }
    }
}

pub fn print_check_result(result: &UpdateCheckResult, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(result);
    }
    print_updates(&result.available_updates);
    for error in &result.errors {
        eprintln!(
            "{} {} [{}] {}",
            style("error:").red().bold(),
            error.registry_url,
            error.kind,
            error.message
        );
    }
    println!(
        "{}",
        style(format!("Checked at {}", result.last_checked.format("%Y-%m-%d %H:%M:%S UTC"))).dim()
    );
    Ok(())
}

pub fn print_installed_one(verb: &str, entry: &InstalledSkill, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(entry);
    }
    println!(
        "{} {} {} v{} for {}",
        style("✓").green(),
        verb,
        entry.skill_id,
        entry.version,
        entry.agent
    );
    println!("  {}", entry.installed_path.display());
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
