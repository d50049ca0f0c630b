use anyhow::Result;

use delivery_lifecycle::{AnnotateMetadata, DeliveryStatus, StatusUpdate, TransitionMetadata};

use super::{Command, CommandContext};
use crate::cli::NoteArgs;

pub struct TransitionCommand {
    pub tracking_code: String,
    pub to: DeliveryStatus,
    pub note: NoteArgs,
    pub issue_type: Option<String>,
    pub issue_description: Option<String>,
}

impl TransitionCommand {
    fn metadata(&self) -> TransitionMetadata {
        TransitionMetadata {
            location: self.note.location.clone(),
            notes: self.note.notes.clone(),
            issue_type: self.issue_type.clone(),
            issue_description: self.issue_description.clone(),
        }
    }
}

impl Command for TransitionCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let actor = ctx.actor()?;
        let metadata = self.metadata();
        let outcome = ctx
            .with_executor(|executor| async move {
                Ok::<_, anyhow::Error>(executor
                    .request_transition(&self.tracking_code, self.to, &actor, metadata)
                    .await?)
            })
            .await?;

        ctx.emit(&outcome.status_update, |entry| {
            println!(
                "✅ {}: {} -> {} (ledger #{})",
                entry.tracking_code, entry.from, entry.to, entry.sequence
            );
            if let Some(issue) = &entry.issue {
                println!("   ⚠️  {}: {}", issue.issue_type, issue.description);
            }
        })
    }
}

pub struct AnnotateCommand {
    pub tracking_code: String,
    pub note: NoteArgs,
}

impl Command for AnnotateCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let actor = ctx.actor()?;
        let metadata = AnnotateMetadata {
            location: self.note.location.clone(),
            notes: self.note.notes.clone(),
        };
        let entry: StatusUpdate = ctx
            .with_executor(|executor| async move {
                Ok::<_, anyhow::Error>(executor
                    .request_annotate(&self.tracking_code, &actor, metadata)
                    .await?)
            })
            .await?;

        ctx.emit(&entry, |entry| {
            println!(
                "📝 {} annotated at {} (ledger #{})",
                entry.tracking_code, entry.to, entry.sequence
            );
        })
    }
}
