use anyhow::Result;

use delivery_lifecycle::Priority;

use super::{Command, CommandContext};

pub struct CreateCommand {
    pub tracking_code: String,
    pub priority: Priority,
}

impl Command for CreateCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let actor = ctx.actor()?;
        let delivery = ctx
            .with_executor(|executor| async move {
                Ok::<_, anyhow::Error>(executor
                    .create_delivery(&self.tracking_code, self.priority, &actor)
                    .await?)
            })
            .await?;

        ctx.emit(&delivery, |delivery| {
            println!(
                "📦 Created {} ({}, priority {})",
                delivery.tracking_code, delivery.status, delivery.priority
            );
        })
    }
}
