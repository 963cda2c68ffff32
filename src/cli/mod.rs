//! CLI parser and command dispatch.

mod commands;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "invoicebox")]
#[command(about = "Invoice back-office processing system")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides ./invoicebox.toml discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum DecisionArg {
    Approve,
    Reject,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and run pending migrations
    Init,

    /// Manage tenants
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },

    /// Upload an invoice file for a tenant
    Upload {
        /// Tenant id
        tenant: String,
        /// Path of the file to upload
        file: PathBuf,
        /// Acting user recorded in the audit trail
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Apply extracted field values to an invoice
    Extract {
        invoice_id: String,
        #[arg(long)]
        vendor: Option<String>,
        #[arg(long)]
        number: Option<String>,
        /// Invoice date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long)]
        currency: Option<String>,
        /// Origin of the values: manual, ocr, llm
        #[arg(long, default_value = "manual")]
        source: String,
        /// Extraction confidence 0-1
        #[arg(long)]
        confidence: Option<f64>,
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Run the validation rules against an invoice
    Validate {
        invoice_id: String,
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Record a human approve/reject decision
    Decide {
        invoice_id: String,
        #[arg(value_enum)]
        decision: DecisionArg,
        /// Deciding user
        #[arg(long)]
        by: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Record a payment against an approved invoice
    Pay {
        invoice_id: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        currency: String,
        #[arg(long, default_value = "")]
        method: String,
        #[arg(long, default_value = "")]
        reference: String,
        #[arg(long)]
        by: Option<String>,
    },

    /// Resolve an open validation exception
    Resolve {
        exception_id: String,
        /// Resolving user
        #[arg(long)]
        by: String,
    },

    /// Show an invoice with its exceptions and decisions
    Show { invoice_id: String },

    /// List invoices
    List {
        #[arg(long)]
        tenant: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "50")]
        limit: u32,
    },

    /// Poll the mailbox and ingest invoices from attachments
    Ingest {
        /// Keep polling on the configured interval instead of one cycle
        #[arg(long)]
        watch: bool,
    },

    /// Show the audit trail for an entity
    Audit { entity_id: String },

    /// List recent ingestion runs
    Runs {
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

#[derive(Subcommand)]
enum TenantCommands {
    /// Create a tenant
    Add {
        name: String,
        /// Inbound email alias the tenant receives invoices on
        #[arg(long)]
        alias: String,
        /// Comma-separated currency allow-list override
        #[arg(long)]
        currencies: Option<String>,
    },
    /// List tenants
    List,
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => commands::init(&settings).await,
        Commands::Tenant { command } => match command {
            TenantCommands::Add {
                name,
                alias,
                currencies,
            } => commands::tenant_add(&settings, &name, &alias, currencies).await,
            TenantCommands::List => commands::tenant_list(&settings).await,
        },
        Commands::Upload {
            tenant,
            file,
            actor,
        } => commands::upload(&settings, &tenant, &file, &actor).await,
        Commands::Extract {
            invoice_id,
            vendor,
            number,
            date,
            due,
            amount,
            currency,
            source,
            confidence,
            actor,
        } => {
            commands::extract(
                &settings,
                &invoice_id,
                commands::ExtractArgs {
                    vendor,
                    number,
                    date,
                    due,
                    amount,
                    currency,
                },
                &source,
                confidence,
                &actor,
            )
            .await
        }
        Commands::Validate { invoice_id, actor } => {
            commands::validate(&settings, &invoice_id, &actor).await
        }
        Commands::Decide {
            invoice_id,
            decision,
            by,
            notes,
        } => commands::decide(&settings, &invoice_id, decision, &by, notes).await,
        Commands::Pay {
            invoice_id,
            amount,
            currency,
            method,
            reference,
            by,
        } => commands::pay(&settings, &invoice_id, &amount, currency, method, reference, by).await,
        Commands::Resolve { exception_id, by } => {
            commands::resolve(&settings, &exception_id, &by).await
        }
        Commands::Show { invoice_id } => commands::show(&settings, &invoice_id).await,
        Commands::List {
            tenant,
            status,
            limit,
        } => commands::list(&settings, tenant.as_deref(), status.as_deref(), limit).await,
        Commands::Ingest { watch } => commands::ingest(&settings, watch).await,
        Commands::Audit { entity_id } => commands::audit_trail(&settings, &entity_id).await,
        Commands::Runs { limit } => commands::runs(&settings, limit).await,
    }
}
