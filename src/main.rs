use anyhow::Context;
use chrono::Local;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use po_upload::audit::AUDIT_TARGET;
use po_upload::config::{Args, CollisionPolicy};
use po_upload::engine::{CancelFlag, UploadSession};
use po_upload::ledger::TransferLedger;
use po_upload::profile::ConnectionProfile;
use po_upload::resolver::{FixedResolver, PromptResolver, Resolution};
use po_upload::scanner::collect_pdfs;
use po_upload::transport::ssh::SftpConnector;
use po_upload::transport::{probe, Connector, SessionGuard};
use std::io::IsTerminal;
use std::path::Path;
use tracing::{error, info, warn, Level};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::prelude::*;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let profile = ConnectionProfile::load(&args.profile)
        .with_context(|| format!("Loading profile {:?}", args.profile))?;
    let log_path = profile.resolved_log_path(Local::now().date_naive());

    init_logging(&args, &log_path)?;

    if args.check {
        return check_connection(&profile);
    }

    let files = collect_pdfs(&args.files)?;
    if files.is_empty() {
        error!("No PDF files selected.");
        std::process::exit(1);
    }

    let cancel = CancelFlag::new();
    let flag = cancel.handle();
    ctrlc::set_handler(move || {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
    })
    .context("Installing Ctrl-C handler")?;

    let mut session = UploadSession::new(profile, files).with_cancel(cancel);

    session = match args.collision_policy(std::io::stdin().is_terminal()) {
        CollisionPolicy::Overwrite => session.with_resolver(FixedResolver(Resolution::Overwrite)),
        CollisionPolicy::Skip => session.with_resolver(FixedResolver(Resolution::Skip)),
        CollisionPolicy::Prompt => session.with_resolver(PromptResolver),
        CollisionPolicy::Refuse => {
            warn!("No collision policy; files already on the server will fail.");
            session
        }
    };

    if args.progress {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?,
        );
        session = session.with_progress(pb);
    }

    let ledger = match session.run(&SftpConnector) {
        Ok(ledger) => ledger,
        Err(e) => {
            error!("Upload aborted: {}", e);
            std::process::exit(1);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ledger)?);
    } else {
        print_ledger(&ledger);
    }

    if ledger.summary().failed > 0 {
        std::process::exit(2);
    }
    Ok(())
}

fn init_logging(args: &Args, log_path: &Path) -> anyhow::Result<()> {
    let console_level = if args.verbose {
        LevelFilter::DEBUG
    } else if args.quiet {
        LevelFilter::ERROR
    } else {
        LevelFilter::INFO
    };

    let dir = log_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).with_context(|| format!("Creating log directory {:?}", dir))?;
    let file_name = log_path
        .file_name()
        .context("Log path has no file name")?;
    let appender = tracing_appender::rolling::never(dir, file_name);

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_level);

    let audit = tracing_subscriber::fmt::layer()
        .with_writer(appender)
        .with_ansi(false)
        .with_target(false)
        .with_filter(Targets::new().with_target(AUDIT_TARGET, Level::INFO));

    tracing_subscriber::registry().with(console).with(audit).init();
    Ok(())
}

fn check_connection(profile: &ConnectionProfile) -> anyhow::Result<()> {
    profile.validate()?;
    info!("Testing connection to {}:{}...", profile.host, profile.port);
    let guard = SessionGuard::new(SftpConnector.open(profile)?);
    let entries = probe(guard.session(), &profile.remote_path)?;
    guard.close()?;
    info!("Connection OK: {} entries in {}", entries, profile.remote_path);
    Ok(())
}

fn print_ledger(ledger: &TransferLedger) {
    let width = ledger.iter().map(|e| e.file_name.len()).max().unwrap_or(4).max(4);
    println!("{:<width$}  {:<8}  Message", "File", "Status");
    for entry in ledger {
        println!(
            "{:<width$}  {:<8}  {}",
            entry.file_name,
            entry.outcome.status().to_string(),
            entry.outcome.message()
        );
    }
    let s = ledger.summary();
    println!(
        "\n{} uploaded, {} skipped, {} failed",
        s.succeeded, s.skipped, s.failed
    );
}
