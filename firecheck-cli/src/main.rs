//! Firecheck CLI
//!
//! Runs the inspection submission server and the admin reports
//! (fleet status, submission compliance, low stock, defect resolution).

mod server;

use chrono::{FixedOffset, Local, Offset, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use firecheck::admin::{AdminConsole, AdminGate, AdminSession};
use firecheck::analytics::FleetStatus;
use firecheck::config::FirecheckConfig;
use firecheck::dashboard::FleetPoller;
use firecheck::insights::InsightsClient;
use firecheck::receipt::HttpReceiptStore;
use firecheck::store::{GitHubIssueStore, IssueStore, MemoryIssueStore};
use firecheck::supply::{HttpSupplyApi, SupplyQueue};
use firecheck::SubmissionService;
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "firecheck")]
#[command(about = "Daily apparatus inspection tracker")]
#[command(version = "0.1.0")]
struct Cli {
    /// Admin password for admin-only commands
    #[arg(long, env = "FIRECHECK_ADMIN_PASSWORD", hide_env_values = true, global = true)]
    admin_password: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP submission server
    Serve {
        /// Listen address (default from config)
        #[arg(long)]
        bind: Option<String>,

        /// Keep issues in memory instead of the configured tracker
        #[arg(long)]
        in_memory: bool,
    },

    /// Show open defects per apparatus
    FleetStatus,

    /// Show today's submissions and 30-day totals
    Submissions {
        /// Write CSV to stdout
        #[arg(long)]
        csv: bool,
    },

    /// Show items reported missing repeatedly in the last 30 days
    LowStock,

    /// Close a defect and label it resolved
    Resolve {
        /// Defect issue number
        issue_number: u64,
    },

    /// Poll fleet status on the configured interval
    Watch {
        /// Stop after this many polls (default: run until interrupted)
        #[arg(long)]
        polls: Option<usize>,
    },
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    if cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();
    } else if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let config = match FirecheckConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    let print_success = !cli.quiet && !matches!(cli.command, Commands::Submissions { csv: true });
    let password = cli.admin_password.as_deref();
    let result = match cli.command {
        Commands::Serve { bind, in_memory } => handle_serve(&config, bind, in_memory),
        Commands::FleetStatus => handle_fleet_status(&config, password),
        Commands::Submissions { csv } => handle_submissions(&config, password, csv),
        Commands::LowStock => handle_low_stock(&config, password),
        Commands::Resolve { issue_number } => handle_resolve(&config, password, issue_number),
        Commands::Watch { polls } => handle_watch(&config, password, polls),
    };

    match result {
        Ok(()) => {
            if print_success {
                println!("✅ Success");
            }
            process::exit(0);
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            process::exit(1);
        }
    }
}

fn local_offset() -> FixedOffset {
    Local::now().offset().fix()
}

fn build_store(config: &FirecheckConfig, in_memory: bool) -> anyhow::Result<Arc<dyn IssueStore>> {
    if in_memory {
        log::warn!("using in-memory issue store; nothing will be persisted");
        return Ok(Arc::new(MemoryIssueStore::new()));
    }
    let issues = &config.issues;
    let store = GitHubIssueStore::new(&issues.api_base_url, &issues.owner, &issues.repo, &issues.token)?;
    log::info!("issue store: {}", store.repo_id());
    Ok(Arc::new(store))
}

fn build_console(config: &FirecheckConfig, store: Arc<dyn IssueStore>) -> AdminConsole {
    AdminConsole::new(store, config.apparatus.clone())
        .with_insights(InsightsClient::new(config.insights.enabled_url()))
        .with_utc_offset(local_offset())
        .with_page_size(config.issues.page_size)
}

fn admin_session(config: &FirecheckConfig, password: Option<&str>) -> anyhow::Result<AdminSession> {
    let gate = AdminGate::new(config.admin.password.as_deref());
    let password = password
        .ok_or_else(|| anyhow::anyhow!("admin password required: use --admin-password or FIRECHECK_ADMIN_PASSWORD"))?;
    Ok(gate.authenticate(password)?)
}

fn handle_serve(config: &FirecheckConfig, bind: Option<String>, in_memory: bool) -> anyhow::Result<()> {
    let store = build_store(config, in_memory)?;

    let mut submissions = SubmissionService::new(store.clone()).with_page_size(config.issues.page_size);
    if let Some(url) = config.receipts.enabled_url() {
        submissions = submissions.with_receipts(Arc::new(HttpReceiptStore::new(url)));
    } else {
        log::info!("no receipt store configured; receipts will be embedded in log issues");
    }
    let supply_worker = match config.supply.enabled_url() {
        Some(url) => {
            let (queue, worker) = SupplyQueue::start(Arc::new(HttpSupplyApi::new(url)))?;
            submissions = submissions.with_supply(queue);
            Some(worker)
        }
        None => None,
    };

    let service = server::FirecheckService::new(
        submissions,
        build_console(config, store),
        AdminGate::new(config.admin.password.as_deref()),
    );
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    println!("🚒 Firecheck running at http://{}", bind);
    server::run(service, &bind)?;

    if let Some(worker) = supply_worker {
        let stats = worker.join();
        log::info!(
            "supply worker stopped: {} job(s), {} task(s), {} failure(s)",
            stats.jobs,
            stats.tasks_created,
            stats.failures
        );
    }
    Ok(())
}

fn print_fleet_status(status: &FleetStatus) {
    println!("\n🚒 Fleet Status\n");
    for entry in status.entries() {
        let count = match entry.open_defects {
            0 => "0 open".green(),
            1..=2 => format!("{} open", entry.open_defects).yellow(),
            n => format!("{} open", n).red(),
        };
        println!("  {:<20} {}", entry.apparatus, count);
    }
    println!("\n📈 Summary: {} open defect(s)", status.total());
}

fn handle_fleet_status(config: &FirecheckConfig, password: Option<&str>) -> anyhow::Result<()> {
    let session = admin_session(config, password)?;
    let console = build_console(config, build_store(config, false)?);
    print_fleet_status(&console.fleet_status(&session)?);
    Ok(())
}

fn handle_submissions(config: &FirecheckConfig, password: Option<&str>, csv: bool) -> anyhow::Result<()> {
    let session = admin_session(config, password)?;
    let console = build_console(config, build_store(config, false)?);
    let report = console.submissions_report(&session, Utc::now())?;

    if csv {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        writer.write_record(["apparatus", "submitted_today", "total_submissions", "last_submission"])?;
        for a in &report.apparatus {
            writer.write_record([
                a.apparatus.clone(),
                a.submitted_today.to_string(),
                a.total_submissions.to_string(),
                a.last_submission.map(|d| d.to_string()).unwrap_or_default(),
            ])?;
        }
        writer.flush()?;
        return Ok(());
    }

    println!("\n📋 Submissions for {}\n", report.today);
    for a in &report.apparatus {
        let marker = if a.submitted_today { "✓".green() } else { "✗".red() };
        let last = a
            .last_submission
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  {} {:<20} {} in 30 days, last {}",
            marker, a.apparatus, a.total_submissions, last
        );
    }
    let stale = report.stale();
    if !stale.is_empty() {
        println!("\n⏳ Not yet inspected today: {}", stale.join(", ").yellow());
    }
    Ok(())
}

fn handle_low_stock(config: &FirecheckConfig, password: Option<&str>) -> anyhow::Result<()> {
    let session = admin_session(config, password)?;
    let console = build_console(config, build_store(config, false)?);
    let items = console.low_stock(&session, Utc::now())?;

    println!("\n📦 Low Stock (missing 2+ times in 30 days)\n");
    if items.is_empty() {
        println!("  None");
    }
    for item in &items {
        println!(
            "  {:<32} {}x  ({})",
            item.key.to_string(),
            item.occurrences.to_string().red(),
            item.apparatus.join(", ")
        );
    }
    Ok(())
}

fn handle_resolve(config: &FirecheckConfig, password: Option<&str>, issue_number: u64) -> anyhow::Result<()> {
    let session = admin_session(config, password)?;
    let console = build_console(config, build_store(config, false)?);
    let defect = console.resolve_defect(&session, issue_number)?;
    println!(
        "Resolved #{}: [{}] {} ({})",
        defect.tracking_id,
        defect.apparatus,
        defect.key(),
        defect.status
    );
    Ok(())
}

fn handle_watch(config: &FirecheckConfig, password: Option<&str>, polls: Option<usize>) -> anyhow::Result<()> {
    admin_session(config, password)?;
    let store = build_store(config, false)?;
    let interval = Duration::from_secs(config.server.poll_interval_seconds.max(1));
    let (tx, rx) = crossbeam_channel::unbounded();
    let poller = FleetPoller::start(store, config.apparatus.clone(), interval, move |result| {
        let _ = tx.send(result);
    });

    let mut seen = 0usize;
    while let Ok(result) = rx.recv() {
        match result {
            Ok(snapshot) => {
                println!("\n🕒 {}", snapshot.polled_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"));
                print_fleet_status(&snapshot.status);
            }
            Err(e) => eprintln!("⚠️  poll failed: {}", e),
        }
        seen += 1;
        if polls.is_some_and(|limit| seen >= limit) {
            break;
        }
    }
    let total = poller.stop();
    log::debug!("fleet poller stopped after {total} poll(s)");
    Ok(())
}
