use anyhow::{bail, Result};

use delivery_lifecycle::lifecycle::LedgerAudit;
use delivery_lifecycle::{PersistenceStore, StatusUpdate};

use super::{Command, CommandContext};

pub struct HistoryCommand {
    pub tracking_code: String,
}

fn print_entry(entry: &StatusUpdate) {
    let change = if entry.is_annotation() {
        format!("{} (annotation)", entry.to)
    } else {
        format!("{} -> {}", entry.from, entry.to)
    };
    println!(
        "#{:<3} {}  {}  by {} ({})",
        entry.sequence,
        entry.created_at.to_rfc3339(),
        change,
        entry.actor.id,
        entry.actor.role
    );
    if let Some(location) = &entry.location {
        println!("      📍 {}", location);
    }
    if let Some(notes) = &entry.notes {
        println!("      💬 {}", notes);
    }
    if let Some(issue) = &entry.issue {
        println!("      ⚠️  {}: {}", issue.issue_type, issue.description);
    }
}

impl Command for HistoryCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let (tracking_code, entries) = ctx
            .with_reader(|executor| async move {
                executor.store().load(&self.tracking_code).await?;
                let mut history = executor.ledger().history(&self.tracking_code);
                let mut entries = Vec::new();
                while let Some(entry) = history.next().await? {
                    entries.push(entry);
                }
                Ok::<_, anyhow::Error>((history.tracking_code().to_string(), entries))
            })
            .await?;

        ctx.emit(&entries, |entries| {
            println!("📜 Ledger of {} ({} entries)", tracking_code, entries.len());
            for entry in entries.iter() {
                print_entry(entry);
            }
        })
    }
}

pub struct VerifyCommand {
    pub tracking_code: String,
}

impl Command for VerifyCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let audit: LedgerAudit = ctx
            .with_reader(|executor| async move {
                let delivery = executor.store().load(&self.tracking_code).await?;
                Ok::<_, anyhow::Error>(executor.ledger().verify(&delivery).await?)
            })
            .await?;

        ctx.emit(&audit, |audit| {
            if audit.is_consistent() {
                println!(
                    "✅ Ledger of {} is consistent: {} entries, status {}",
                    audit.tracking_code, audit.entries, audit.projected_status
                );
            } else {
                println!("❌ Ledger of {} is inconsistent:", audit.tracking_code);
                for violation in &audit.violations {
                    println!("   {:?}", violation);
                }
            }
        })?;

        if !audit.is_consistent() {
            bail!("ledger of {} failed verification", audit.tracking_code);
        }
        Ok(())
    }
}
