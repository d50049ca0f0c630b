use anyhow::Result;
use serde::Serialize;

use delivery_lifecycle::{AvailableAction, DeliveryStatus, PersistenceStore};

use super::{Command, CommandContext};

pub struct ActionsCommand {
    pub tracking_code: String,
}

#[derive(Serialize)]
struct ActionsView {
    tracking_code: String,
    status: DeliveryStatus,
    actions: Vec<AvailableAction>,
}

impl Command for ActionsCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let actor = ctx.actor()?;
        let view = ctx
            .with_reader(|executor| async move {
                let actions = executor.list_available_actions(&self.tracking_code, &actor).await?;
                let delivery = executor.store().load(&self.tracking_code).await?;
                Ok::<_, anyhow::Error>(ActionsView {
                    actions,
                    tracking_code: delivery.tracking_code,
                    status: delivery.status,
                })
            })
            .await?;

        ctx.emit(&view, |view| {
            println!("🎯 Available actions for {} ({}):", view.tracking_code, view.status);
            if view.actions.is_empty() {
                println!("   none");
            }
            for action in &view.actions {
                if action.requires_issue {
                    println!("   {} (issue report required)", action.target_status);
                } else {
                    println!("   {}", action.target_status);
                }
            }
        })
    }
}
