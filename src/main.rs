use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use claim_sync::{
    sync_abundances, sync_organizations, Credentials, DryRun, Journal, JournaledKnowledgeBase,
    KnowledgeBase, SyncConfig, WikibaseClient,
};

const USAGE: &str = "Usage: claim-sync <abundances|organizations> [config.toml]";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pipeline {
    Abundances,
    Organizations,
}

impl Pipeline {
    fn parse(arg: &str) -> Option<Self> {
        match arg {
            "abundances" => Some(Pipeline::Abundances),
            "organizations" => Some(Pipeline::Organizations),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Pipeline::Abundances => "abundances",
            Pipeline::Organizations => "organizations",
        }
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(pipeline) = args.get(1).and_then(|a| Pipeline::parse(a)) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let config = match args.get(2) {
        Some(path) => SyncConfig::load(&PathBuf::from(path))?,
        None => SyncConfig::default(),
    };

    let (summary, dry_run) = match pipeline {
        Pipeline::Abundances => (&config.abundance.summary, config.abundance.dry_run),
        Pipeline::Organizations => (&config.organization.summary, config.organization.dry_run),
    };

    let mut client = WikibaseClient::new(&config.kb)?.with_summary(summary);
    match Credentials::from_env() {
        Some(credentials) => {
            client
                .login(&credentials)
                .with_context(|| format!("Login failed for {}", credentials.username))?;
            info!("Logged in as {}", credentials.username);
        }
        None if dry_run => {}
        None => warn!(
            "{} / {} not set, editing anonymously",
            Credentials::USERNAME_VAR,
            Credentials::PASSWORD_VAR
        ),
    }

    if dry_run {
        info!("Dry run: no edits will be sent");
        let mut kb = DryRun::new(client);
        run_pipeline(pipeline, &mut kb, &config)?;
        println!("✓ {} edits suppressed", kb.suppressed_writes());
        return Ok(());
    }

    match &config.journal_path {
        Some(path) => {
            let journal = Journal::open(path)?;
            let mut kb = JournaledKnowledgeBase::new(client, journal, pipeline.name());
            run_pipeline(pipeline, &mut kb, &config)?;
            println!(
                "✓ Journal {} holds {} edits",
                path.display(),
                kb.journal().count()?
            );
        }
        None => {
            let mut kb = client;
            run_pipeline(pipeline, &mut kb, &config)?;
        }
    }

    Ok(())
}

fn run_pipeline<K: KnowledgeBase>(
    pipeline: Pipeline,
    kb: &mut K,
    config: &SyncConfig,
) -> Result<()> {
    match pipeline {
        Pipeline::Abundances => {
            println!("🧪 Syncing natural abundances");
            let report = sync_abundances(kb, &config.abundance)?;
            println!("✅ {}", report.summary());
            if report.failed() > 0 {
                bail!("{} of {} rows failed", report.failed(), report.rows());
            }
        }
        Pipeline::Organizations => {
            println!("🏛️  Syncing ROR organizations");
            let report = sync_organizations(kb, &config.organization)?;
            println!("✅ {}", report.summary());
        }
    }
    Ok(())
}
