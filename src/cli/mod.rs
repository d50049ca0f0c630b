use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use delivery_lifecycle::{DeliveryStatus, Priority, Role};

pub mod commands;

#[derive(Parser)]
#[command(name = "delivery-lifecycle")]
#[command(about = "Governed delivery lifecycle with an append-only audit ledger")]
#[command(long_about = "Moves deliveries through their lifecycle (PENDING, ASSIGNED, IN_PROGRESS, ...) \
                       enforcing the transition graph, role permissions and issue reports, and records \
                       every change in a per-delivery ledger. State lives in a JSON snapshot file.")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct GlobalArgs {
    /// Snapshot file holding deliveries and ledgers
    #[arg(long, global = true, help = "Snapshot file (defaults to store.snapshot_path from configuration)")]
    pub store: Option<PathBuf>,

    /// Identifier of the acting user
    #[arg(long, global = true, help = "Id of the acting user")]
    pub actor: Option<String>,

    /// Role of the acting user
    #[arg(long, global = true, default_value = "admin", help = "Role of the acting user: admin, manager, driver or other")]
    pub role: Role,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the transition graph
    Graph,
    /// List the transitions the actor may request on a delivery
    Actions {
        tracking_code: String,
    },
    /// Register a new PENDING delivery
    Create {
        tracking_code: String,
        #[arg(long, default_value = "normal", help = "Priority: low, normal, high or urgent")]
        priority: Priority,
    },
    /// Set or clear the driver and vehicle of a delivery
    Assign {
        tracking_code: String,
        #[arg(long, conflicts_with = "clear_driver")]
        driver: Option<String>,
        #[arg(long, conflicts_with = "clear_vehicle")]
        vehicle: Option<String>,
        #[arg(long)]
        clear_driver: bool,
        #[arg(long)]
        clear_vehicle: bool,
    },
    /// Move a delivery to another status
    Transition {
        tracking_code: String,
        /// Target status, e.g. IN_PROGRESS or in-progress
        to: DeliveryStatus,
        #[command(flatten)]
        note: NoteArgs,
        #[arg(long, help = "Issue classification, required for FAILED_DELIVERY and DELAYED")]
        issue_type: Option<String>,
        #[arg(long, help = "Issue description, required for FAILED_DELIVERY and DELAYED")]
        issue_description: Option<String>,
    },
    /// Record location or notes without changing the status
    Annotate {
        tracking_code: String,
        #[command(flatten)]
        note: NoteArgs,
    },
    /// Print the ledger of a delivery, oldest entry first
    History {
        tracking_code: String,
    },
    /// Replay the ledger and check it against the stored delivery
    Verify {
        tracking_code: String,
    },
}

#[derive(Args, Clone, Default)]
pub struct NoteArgs {
    #[arg(long, help = "Current location of the delivery")]
    pub location: Option<String>,
    #[arg(long, help = "Free-text notes")]
    pub notes: Option<String>,
}
