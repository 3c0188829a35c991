//! Quiver - AI agent skill manager
//!
//! Usage:
//!   quiver list                      # Skills found on disk
//!   quiver create claude "My Skill"  # New local skill
//!   quiver install <registry> <id>   # Install from a registry
//!   quiver updates                   # Check installed skills for updates

mod output;

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiver_core::prelude::*;

use crate::output::{OutputFormat, print_json};

#[derive(Parser)]
#[command(name = "quiver")]
#[command(about = "AI agent skill manager", long_about = None)]
struct Cli {
    /// Output format
    #[arg(short = 'o', long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rescan every enabled agent and list its skills
    Scan,

    /// List skills, optionally for one agent
    #[command(alias = "ls")]
    List {
        #[arg(long, short)]
        agent: Option<String>,
    },

    /// Show one skill by id
    Show { id: String },

    /// Print a skill file
    Cat { file: PathBuf },

    /// Create a local skill
    Create(CreateArgs),

    /// Replace the content of a local skill file
    Edit {
        file: PathBuf,
        /// Read new content from this file instead of stdin
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Delete a local skill
    #[command(alias = "rm")]
    Delete {
        path: PathBuf,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Copy a skill under a new name
    Duplicate { path: PathBuf, name: String },

    /// Rename a local skill folder or file
    #[command(alias = "mv")]
    Rename { path: PathBuf, name: String },

    /// Write a skill file to another location (stdout when no output is given)
    Export {
        file: PathBuf,
        #[arg(long, short = 'O')]
        out: Option<PathBuf>,
    },

    /// List or restore backups taken before local edits and deletes
    Backups(BackupArgs),

    /// Add or remove files inside a local skill
    File(FileArgs),

    /// Show or change agent configuration
    Agents(AgentArgs),

    /// Browse registries
    Registry(RegistryArgs),

    /// Install a skill from a registry
    Install {
        /// Registry URL, GitHub repository or local path
        registry: String,
        /// Skill id inside the registry
        skill: String,
        #[arg(long, short, default_value = "claude")]
        agent: String,
    },

    /// Remove an installed registry skill
    Uninstall {
        skill: String,
        #[arg(long, short, default_value = "claude")]
        agent: String,
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List registry skills recorded in the ledger
    Installed,

    /// Check installed skills for newer registry versions
    Updates {
        /// Check a single registry instead of every registry in the ledger
        #[arg(long)]
        registry: Option<String>,
    },

    /// Apply available updates
    Update(UpdateArgs),

    /// Stop offering a specific version of a skill
    Skip { skill: String, version: String },

    /// Restore the version that was installed before the last update
    Rollback {
        skill: String,
        #[arg(long, short, default_value = "claude")]
        agent: String,
    },
}

#[derive(Args)]
struct CreateArgs {
    agent: String,
    name: String,
    #[arg(long, short)]
    description: Option<String>,
    #[arg(long = "tag", short)]
    tags: Vec<String>,
    /// Entry file content; defaults to a starter template
    #[arg(long)]
    from: Option<PathBuf>,
}

#[derive(Args)]
struct FileArgs {
    #[command(subcommand)]
    command: FileSubcommand,
}

#[derive(Subcommand)]
enum FileSubcommand {
    /// Add a file to a skill folder (`.md` is appended when no extension is given)
    Add {
        folder: PathBuf,
        name: String,
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Remove a file from a skill folder
    Rm { file: PathBuf },
    /// List every file of a skill
    Ls { path: PathBuf },
}

#[derive(Args)]
struct BackupArgs {
    #[command(subcommand)]
    command: Option<BackupSubcommand>,
}

#[derive(Subcommand)]
enum BackupSubcommand {
    /// Put a backup back at its original path
    Restore { id: String },
}

#[derive(Args)]
struct AgentArgs {
    #[command(subcommand)]
    command: Option<AgentSubcommand>,
}

#[derive(Subcommand)]
enum AgentSubcommand {
    Enable { agent: String },
    Disable { agent: String },
}

#[derive(Args)]
struct RegistryArgs {
    #[command(subcommand)]
    command: RegistrySubcommand,
}

#[derive(Subcommand)]
enum RegistrySubcommand {
    /// Registries listed in config.toml
    List,
    /// Fetch a registry and list its skills
    Show { url: String },
}

#[derive(Args)]
struct UpdateArgs {
    /// Skill id to update (omit with --all)
    skill: Option<String>,
    #[arg(long, short, default_value = "claude")]
    agent: String,
    /// Apply every available update
    #[arg(long)]
    all: bool,
    /// Include major version updates when using --all
    #[arg(long)]
    major: bool,
    #[arg(short = 'y', long)]
    yes: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quiver=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        match err.downcast_ref::<SkillError>() {
            Some(skill_err) => eprintln!(
                "{} [{}] {}",
                style("error:").red().bold(),
                skill_err.kind(),
                skill_err
            ),
            None => eprintln!("{} {:#}", style("error:").red().bold(), err),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = AppContext::from_env()?;
    tracing::debug!(
        config_dir = %ctx.config_dir().display(),
        state_dir = %ctx.state_dir().display(),
        "Opening skill hub"
    );
    let hub = SkillHub::open(&ctx)?;
    let format = cli.format;

    match cli.command {
        Commands::Scan => {
            let skills = hub.scan_skills();
            output::print_skills(&skills, format)?;
            output::print_warnings(&hub.warnings());
        }
        Commands::List { agent } => {
            let skills = match agent {
                Some(agent) => hub.get_skills_by_agent(&parse_agent(&agent)?),
                None => hub.get_all_skills(),
            };
            output::print_skills(&skills, format)?;
            output::print_warnings(&hub.warnings());
        }
        Commands::Show { id } => {
            let skill = hub.get_skill_by_id(&id)?;
            output::print_skill(&skill, format)?;
        }
        Commands::Cat { file } => {
            print!("{}", hub.read_skill_content(&absolute(file)?)?);
        }
        Commands::Create(args) => {
            let agent = parse_agent(&args.agent)?;
            let content = match &args.from {
                Some(path) => read_file(path)?,
                None => String::new(),
            };
            let skill = hub.create_skill(
                &agent,
                NewSkill {
                    name: args.name,
                    content,
                    description: args.description,
                    tags: args.tags,
                },
            )?;
            done(format, &skill, || format!("Created {}", skill.folder_path.display()))?;
        }
        Commands::Edit { file, from } => {
            let content = match from {
                Some(path) => read_file(&path)?,
                None => read_stdin()?,
            };
            let skill = hub.update_skill(&absolute(file)?, &content)?;
            done(format, &skill, || format!("Updated {}", skill.name))?;
        }
        Commands::Delete { path, yes } => {
            let path = absolute(path)?;
            if !confirm(yes, &format!("Delete {}?", path.display()))? {
                println!("Cancelled.");
                return Ok(());
            }
            let backup = hub.delete_skill(&path)?;
            done(format, &serde_json::json!({ "deleted": path, "backup": backup.id }), || {
                format!("Deleted {} (backup {})", path.display(), backup.id)
            })?;
        }
        Commands::Rename { path, name } => {
            let skill = hub.rename_skill(&absolute(path)?, &name)?;
            done(format, &skill, || format!("Renamed to {}", skill.folder_path.display()))?;
        }
        Commands::Export { file, out } => {
            let export = hub.export_skill(&absolute(file)?)?;
            match out {
                Some(out) => {
                    let out = if out.is_dir() { out.join(&export.file_name) } else { out };
                    std::fs::write(&out, &export.content)
                        .with_context(|| format!("Failed to write {}", out.display()))?;
                    done(format, &serde_json::json!({ "exported": out }), || {
                        format!("Exported {}", out.display())
                    })?;
                }
                None if matches!(format, OutputFormat::Json) => print_json(&export)?,
                None => print!("{}", export.content),
            }
        }
        Commands::Backups(args) => match args.command {
            None => output::print_backups(&hub.list_backups()?, format)?,
            Some(BackupSubcommand::Restore { id }) => {
                let skill = hub.restore_backup(&id)?;
                done(format, &skill, || format!("Restored {}", skill.folder_path.display()))?;
            }
        },
        Commands::Duplicate { path, name } => {
            let skill = hub.duplicate_skill(&absolute(path)?, &name)?;
            done(format, &skill, || format!("Created {}", skill.folder_path.display()))?;
        }
        Commands::File(args) => run_file(&hub, args, format)?,
        Commands::Agents(args) => run_agents(&hub, args, format)?,
        Commands::Registry(args) => match args.command {
            RegistrySubcommand::List => {
                let urls = hub.registry_urls();
                if let OutputFormat::Json = format {
                    print_json(&urls)?;
                } else if urls.is_empty() {
                    println!("No registries configured.");
                    println!("Add URLs under [registry] urls in {}", ctx.config_store().config_path().display());
                } else {
                    urls.iter().for_each(|url| println!("{}", url));
                }
            }
            RegistrySubcommand::Show { url } => {
                let registry = hub.fetch_registry(&url).await?;
                output::print_registry(&registry, format)?;
            }
        },
        Commands::Install {
            registry,
            skill,
            agent,
        } => {
            let agent = parse_agent(&agent)?;
            let entry = hub.install_remote_skill(&registry, &skill, &agent).await?;
            output::print_installed_one("Installed", &entry, format)?;
        }
        Commands::Uninstall { skill, agent, yes } => {
            let agent = parse_agent(&agent)?;
            if !confirm(yes, &format!("Uninstall {} for {}?", skill, agent))? {
                println!("Cancelled.");
                return Ok(());
            }
            let entry = hub.uninstall_remote_skill(&skill, &agent)?;
            done(format, &entry, || {
                format!("Uninstalled {} ({})", entry.skill_id, entry.agent)
            })?;
        }
        Commands::Installed => {
            output::print_installed(&hub.get_installed_skills(), format)?;
        }
        Commands::Updates { registry } => match registry {
            Some(url) => {
                let updates = hub.check_skill_updates(&url).await?;
                if let OutputFormat::Json = format {
                    print_json(&updates)?;
                } else {
                    output::print_updates(&updates);
                }
            }
            None => {
                let result = hub.check_for_updates().await;
                output::print_check_result(&result, format)?;
            }
        },
        Commands::Update(args) => run_update(&hub, args, format).await?,
        Commands::Skip { skill, version } => {
            hub.skip_skill_version(&skill, &version)?;
            done(format, &serde_json::json!({ "skill_id": skill, "skipped": version }), || {
                format!("Version {} of {} will not be offered again", version, skill)
            })?;
        }
        Commands::Rollback { skill, agent } => {
            let agent = parse_agent(&agent)?;
            let entry = hub.rollback_skill(&skill, &agent)?;
            output::print_installed_one("Rolled back", &entry, format)?;
        }
    }

    Ok(())
}

fn run_file(hub: &SkillHub, args: FileArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        FileSubcommand::Add { folder, name, from } => {
            let content = from.as_deref().map(read_file).transpose()?;
            let skill = hub.create_skill_file(&absolute(folder)?, &name, content.as_deref())?;
            done(format, &skill, || format!("{} now has {} files", skill.name, skill.file_count))
        }
        FileSubcommand::Rm { file } => {
            let skill = hub.delete_skill_file(&absolute(file)?)?;
            done(format, &skill, || format!("{} now has {} files", skill.name, skill.file_count))
        }
        FileSubcommand::Ls { path } => {
            let files = hub.get_skill_files(&absolute(path)?)?;
            if let OutputFormat::Json = format {
                return print_json(&files);
            }
            for file in files {
                println!("{:>8} B  {}", file.size, file.file_path.display());
            }
            Ok(())
        }
    }
}

fn run_agents(hub: &SkillHub, args: AgentArgs, format: OutputFormat) -> Result<()> {
    let (agent, enabled) = match args.command {
        None => return output::print_agents(&hub.get_agent_configs(), format),
        Some(AgentSubcommand::Enable { agent }) => (agent, true),
        Some(AgentSubcommand::Disable { agent }) => (agent, false),
    };
    let agent = parse_agent(&agent)?;
    let mut config = hub
        .get_agent_configs()
        .into_iter()
        .find(|c| c.agent == agent)
        .with_context(|| format!("No configuration for agent {}", agent))?;
    config.enabled = enabled;
    hub.update_agent_config(config)?;
    output::print_agents(&hub.get_agent_configs(), format)
}

async fn run_update(hub: &SkillHub, args: UpdateArgs, format: OutputFormat) -> Result<()> {
    let check = hub.check_for_updates().await;
    output::print_warnings(
        &check
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.registry_url, e.message))
            .collect::<Vec<_>>(),
    );

    if args.all {
        let (selected, held_back): (Vec<_>, Vec<_>) = check
            .available_updates
            .into_iter()
            .partition(|u| args.major || !u.is_major);
        for update in &held_back {
            println!(
                "Skipping major update {} {} -> {} (pass --major to include)",
                update.skill_id, update.current_version, update.new_version
            );
        }
        if selected.is_empty() {
            println!("Nothing to update.");
            return Ok(());
        }
        if !confirm(args.yes, &format!("Apply {} update(s)?", selected.len()))? {
            println!("Cancelled.");
            return Ok(());
        }

        let ids: Vec<String> = selected.iter().map(|u| u.skill_id.clone()).collect();
        let results = hub.apply_all_skill_updates(selected).await;
        let mut failed = 0;
        let mut report = Vec::new();
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(entry) => {
                    if let OutputFormat::Table = format {
                        println!("{} {} -> v{}", style("✓").green(), id, entry.version);
                    }
                    report.push(serde_json::json!({ "skill_id": id, "ok": true, "version": entry.version }));
                }
                Err(err) => {
                    failed += 1;
                    if let OutputFormat::Table = format {
                        println!("{} {} [{}] {}", style("✗").red(), id, err.kind(), err);
                    }
                    report.push(serde_json::json!({ "skill_id": id, "ok": false, "error": err.kind(), "message": err.to_string() }));
                }
            }
        }
        if let OutputFormat::Json = format {
            print_json(&report)?;
        }
        if failed > 0 {
            anyhow::bail!("{} update(s) failed", failed);
        }
        return Ok(());
    }

    let skill = args
        .skill
        .context("Pass a skill id or --all")?;
    let agent = parse_agent(&args.agent)?;
    let update = check
        .available_updates
        .into_iter()
        .find(|u| u.skill_id == skill && u.agent == agent)
        .with_context(|| format!("No update available for {} ({})", skill, agent))?;
    if update.is_major
        && !confirm(
            args.yes,
            &format!(
                "{} {} -> {} is a major update. Continue?",
                update.skill_id, update.current_version, update.new_version
            ),
        )?
    {
        println!("Cancelled.");
        return Ok(());
    }
    let entry = hub.apply_skill_update(&update).await?;
    output::print_installed_one("Updated", &entry, format)
}

fn parse_agent(input: &str) -> Result<AgentType> {
    Ok(input.parse::<AgentType>()?)
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

fn read_file(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_stdin() -> Result<String> {
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read stdin")?;
    Ok(content)
}

fn confirm(yes: bool, prompt: &str) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Print `value` as JSON, or the table-mode success line.
fn done<T: serde::Serialize>(
    format: OutputFormat,
    value: &T,
    message: impl FnOnce() -> String,
) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => {
            println!("{} {}", style("✓").green(), message());
            Ok(())
        }
    }
}
