//! CLI binary for safepass.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use safepass::credentials::CredentialRef;
use safepass::records::parse_date;
use safepass::{
    DailyCheckReport, Employee, EmployeeUpdate, PassService, PassType, PassView, ReportKind,
    SafePassConfig,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// SafePass: safety pass tracking with expiry reminders.
#[derive(Parser)]
#[command(name = "safepass", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the record files (overrides the config).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage employees.
    #[command(subcommand)]
    Employee(EmployeeCommand),

    /// Manage pass types.
    #[command(subcommand)]
    PassType(PassTypeCommand),

    /// Issue, revoke and list passes.
    #[command(subcommand)]
    Pass(PassCommand),

    /// Print a report.
    #[command(subcommand)]
    Report(ReportCommand),

    /// Run the daily check now: expire stale passes and send reminders.
    Check,

    /// Run the daily scheduler until Ctrl+C.
    Schedule {
        /// Also write logs to a daily-rolling file in this directory.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Send a sample reminder to an address.
    TestEmail {
        address: String,
    },

    /// Show or create the configuration file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum EmployeeCommand {
    /// Add an employee.
    Add(EmployeeArgs),
    /// Remove an employee. Their passes are kept.
    Remove { employee_id: String },
    /// Change one or more fields of an employee.
    Update {
        employee_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        manager: Option<String>,
    },
    /// List employees.
    List,
    /// List every pass held by an employee.
    Passes { employee_id: String },
}

#[derive(Args)]
struct EmployeeArgs {
    #[arg(long = "id")]
    employee_id: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long, default_value = "")]
    department: String,
    #[arg(long, default_value = "")]
    manager: String,
}

#[derive(Subcommand)]
enum PassTypeCommand {
    /// Add a pass type.
    Add {
        #[arg(long = "id")]
        pass_type_id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "General")]
        category: String,
        /// Validity period in days.
        #[arg(long = "validity-days")]
        validity_period_days: u32,
    },
    /// Remove a pass type. Issued passes are kept.
    Remove { pass_type_id: String },
    /// List pass types.
    List,
}

#[derive(Subcommand)]
enum PassCommand {
    /// Issue a pass.
    Issue {
        /// Pass id; generated from the current time when omitted.
        #[arg(long = "id")]
        pass_id: Option<String>,
        #[arg(long)]
        employee: String,
        #[arg(long)]
        pass_type: String,
        /// Issue date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        issue_date: Option<String>,
    },
    /// Revoke a pass.
    Revoke { pass_id: String },
    /// List all passes.
    List,
    /// List active passes expiring soon.
    Expiring {
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Subcommand)]
enum ReportCommand {
    /// Passes expiring within the window.
    Expiring {
        #[arg(long)]
        days: Option<u32>,
    },
    /// Expired passes.
    Expired,
    /// Active passes.
    Active,
    /// Employees with their active passes.
    Employees,
    /// Totals and usage.
    Stats,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration.
    Show,
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Read the relay password from stdin and keep it in the platform
    /// credential store.
    SetPassword,
    /// Delete the stored relay password and clear it from the file.
    ClearPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_dir = match &cli.command {
        Command::Schedule { log_dir } => log_dir.as_deref(),
        _ => None,
    };
    let _log_guard = init_tracing(log_dir)?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(SafePassConfig::default_config_path);
    let mut config = load_config(&config_path, cli.config.is_some())?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }

    if let Command::Config(command) = cli.command {
        return run_config(command, &config, &config_path);
    }

    let service = PassService::from_config(&config)?;
    match cli.command {
        Command::Employee(command) => run_employee(&service, command).await,
        Command::PassType(command) => run_pass_type(&service, command).await,
        Command::Pass(command) => run_pass(&service, command, &config).await,
        Command::Report(command) => run_report(&service, command, &config).await,
        Command::Check => {
            let report = service.run_daily_check().await?;
            print_check(&report);
            Ok(())
        }
        Command::Schedule { .. } => run_schedule(&service).await,
        Command::TestEmail { address } => {
            service.send_test_email(&address).await?;
            println!("Test email sent to {address}");
            Ok(())
        }
        Command::Config(_) => Ok(()),
    }
}

/// Install the tracing subscriber. Logs go to stderr, and also to a
/// daily-rolling file when `log_dir` is given.
fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("safepass=info"));

    let Some(dir) = log_dir else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
        dir,
        "safepass.log",
    ));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr.and(writer))
        .init();
    Ok(Some(guard))
}

fn load_config(path: &Path, explicit: bool) -> anyhow::Result<SafePassConfig> {
    if !explicit && !path.exists() {
        return Ok(SafePassConfig::default());
    }
    SafePassConfig::from_file(path)
        .with_context(|| format!("cannot load config from {}", path.display()))
}

fn run_config(command: ConfigCommand, config: &SafePassConfig, path: &Path) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            let mut shown = config.clone();
            if matches!(shown.mail.password, CredentialRef::Plaintext(_)) {
                shown.mail.password = CredentialRef::Plaintext("********".to_owned());
            }
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&shown)?);
            Ok(())
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            SafePassConfig::default().save_to_file(path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
        ConfigCommand::SetPassword => {
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .context("cannot read password from stdin")?;

            // Reload so command-line overrides are not written back.
            let mut stored = load_config(path, false)?;
            let manager = safepass::credentials::create_manager();
            stored
                .mail
                .store_password(manager.as_ref(), line.trim_end_matches(['\r', '\n']))?;
            stored.save_to_file(path)?;
            println!("Stored relay password; {} now references it", path.display());
            Ok(())
        }
        ConfigCommand::ClearPassword => {
            let mut stored = load_config(path, false)?;
            let manager = safepass::credentials::create_manager();
            stored.mail.clear_password(manager.as_ref())?;
            stored.save_to_file(path)?;
            println!("Cleared relay password from {}", path.display());
            Ok(())
        }
    }
}

async fn run_employee(service: &PassService, command: EmployeeCommand) -> anyhow::Result<()> {
    match command {
        EmployeeCommand::Add(args) => {
            let id = args.employee_id.clone();
            service
                .add_employee(Employee {
                    employee_id: args.employee_id,
                    name: args.name,
                    email: args.email,
                    department: args.department,
                    manager: args.manager,
                })
                .await?;
            println!("Added employee {id}");
        }
        EmployeeCommand::Remove { employee_id } => {
            let removed = service.remove_employee(&employee_id).await?;
            println!("Removed employee {} ({})", removed.employee_id, removed.name);
        }
        EmployeeCommand::Update {
            employee_id,
            name,
            email,
            department,
            manager,
        } => {
            let update = EmployeeUpdate {
                name,
                email,
                department,
                manager,
            };
            let updated = service.update_employee(&employee_id, &update).await?;
            println!("Updated employee {} ({})", updated.employee_id, updated.name);
        }
        EmployeeCommand::List => {
            let employees = service.list_employees().await;
            if employees.is_empty() {
                println!("No employees.");
            }
            for e in employees {
                println!(
                    "{:<10} {:<24} {:<32} {:<16} {}",
                    e.employee_id, e.name, e.email, e.department, e.manager
                );
            }
        }
        EmployeeCommand::Passes { employee_id } => {
            let views = service.get_passes_for_employee(&employee_id).await?;
            if views.is_empty() {
                println!("{employee_id} holds no passes.");
            }
            print_pass_views(&views);
        }
    }
    Ok(())
}

async fn run_pass_type(service: &PassService, command: PassTypeCommand) -> anyhow::Result<()> {
    match command {
        PassTypeCommand::Add {
            pass_type_id,
            name,
            description,
            category,
            validity_period_days,
        } => {
            let id = pass_type_id.clone();
            service
                .add_pass_type(PassType {
                    pass_type_id,
                    name,
                    description,
                    category,
                    validity_period_days,
                })
                .await?;
            println!("Added pass type {id}");
        }
        PassTypeCommand::Remove { pass_type_id } => {
            let removed = service.remove_pass_type(&pass_type_id).await?;
            println!("Removed pass type {} ({})", removed.pass_type_id, removed.name);
        }
        PassTypeCommand::List => {
            let pass_types = service.list_pass_types().await;
            if pass_types.is_empty() {
                println!("No pass types.");
            }
            for t in pass_types {
                println!(
                    "{:<12} {:<28} {:<12} {:>5} days  {}",
                    t.pass_type_id, t.name, t.category, t.validity_period_days, t.description
                );
            }
        }
    }
    Ok(())
}

async fn run_pass(
    service: &PassService,
    command: PassCommand,
    config: &SafePassConfig,
) -> anyhow::Result<()> {
    match command {
        PassCommand::Issue {
            pass_id,
            employee,
            pass_type,
            issue_date,
        } => {
            let issue_date = issue_date.as_deref().map(parse_date).transpose()?;
            let pass_id = pass_id.unwrap_or_else(|| {
                format!("PASS_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"))
            });
            let issued = service
                .issue_pass(&pass_id, &employee, &pass_type, issue_date)
                .await?;
            println!(
                "Issued {} to {} ({}), expires {}",
                issued.pass_id, issued.employee_id, issued.pass_type_id, issued.expiry_date
            );
        }
        PassCommand::Revoke { pass_id } => {
            let revoked = service.revoke_pass(&pass_id).await?;
            println!("Pass {} is {}", revoked.pass_id, revoked.status);
        }
        PassCommand::List => print_pass_views(&service.list_passes().await),
        PassCommand::Expiring { days } => {
            let window = days.unwrap_or(config.notifications.window_days);
            let views = service.get_expiring_passes(window).await;
            if views.is_empty() {
                println!("No passes expiring in the next {window} days.");
            }
            print_pass_views(&views);
        }
    }
    Ok(())
}

async fn run_report(
    service: &PassService,
    command: ReportCommand,
    config: &SafePassConfig,
) -> anyhow::Result<()> {
    let kind = match command {
        ReportCommand::Expiring { days } => ReportKind::Expiring {
            window_days: days.unwrap_or(config.notifications.window_days),
        },
        ReportCommand::Expired => ReportKind::Expired,
        ReportCommand::Active => ReportKind::Active,
        ReportCommand::Employees => ReportKind::Employees,
        ReportCommand::Stats => ReportKind::Stats,
    };
    print!("{}", service.report(kind).await);
    Ok(())
}

async fn run_schedule(service: &PassService) -> anyhow::Result<()> {
    println!("SafePass v{}", env!("CARGO_PKG_VERSION"));
    service.start_scheduler()?;
    println!("Scheduler running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for Ctrl+C")?;
    info!("received Ctrl+C, shutting down...");

    service.stop_scheduler().await?;
    Ok(())
}

fn print_pass_views(views: &[PassView]) {
    for view in views {
        println!(
            "{:<20} {:<10} {:<12} {} -> {}  {:<8} {:>5} days",
            view.pass.pass_id,
            view.pass.employee_id,
            view.pass.pass_type_id,
            view.pass.issue_date,
            view.pass.expiry_date,
            view.status,
            view.days_remaining
        );
    }
}

fn print_check(report: &DailyCheckReport) {
    println!("Daily check for {}", report.day);
    println!("  Expired: {}", report.expired.len());
    for pass_id in &report.expired {
        println!("    - {pass_id}");
    }
    println!("  Reminders sent: {}", report.sent.len());
    println!("  Reminders failed: {}", report.failed.len());
    for failed in &report.failed {
        println!(
            "    - {} ({}): {}",
            failed.pass_id, failed.employee_id, failed.error
        );
    }
    println!("  Skipped: {}", report.skipped.len());
    for skipped in &report.skipped {
        println!("    - {}: {}", skipped.pass_id, skipped.reason);
    }
}
