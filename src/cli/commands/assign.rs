use anyhow::Result;
use serde::Serialize;

use delivery_lifecycle::{AssignmentEdit, Delivery, StatusUpdate};

use super::{Command, CommandContext};

pub struct AssignCommand {
    pub tracking_code: String,
    pub driver: Option<String>,
    pub vehicle: Option<String>,
    pub clear_driver: bool,
    pub clear_vehicle: bool,
}

#[derive(Serialize)]
struct AssignView {
    delivery: Delivery,
    status_update: Option<StatusUpdate>,
}

impl AssignCommand {
    fn edit(&self) -> AssignmentEdit {
        let mut edit = AssignmentEdit::default();
        if let Some(driver) = &self.driver {
            edit = edit.assign_driver(driver.clone());
        } else if self.clear_driver {
            edit = edit.clear_driver();
        }
        if let Some(vehicle) = &self.vehicle {
            edit = edit.assign_vehicle(vehicle.clone());
        } else if self.clear_vehicle {
            edit = edit.clear_vehicle();
        }
        edit
    }
}

impl Command for AssignCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let actor = ctx.actor()?;
        let edit = self.edit();
        let outcome = ctx
            .with_executor(|executor| async move {
                Ok::<_, anyhow::Error>(executor
                    .apply_assignment_edit(&self.tracking_code, &actor, edit)
                    .await?)
            })
            .await?;

        let view = AssignView {
            delivery: outcome.delivery,
            status_update: outcome.status_update,
        };
        ctx.emit(&view, |view| {
            let delivery = &view.delivery;
            println!(
                "🚚 {}: driver {} / vehicle {} ({})",
                delivery.tracking_code,
                delivery.driver_id.as_deref().unwrap_or("-"),
                delivery.vehicle_id.as_deref().unwrap_or("-"),
                delivery.status
            );
            if let Some(entry) = &view.status_update {
                println!("   ledger #{}: {} -> {}", entry.sequence, entry.from, entry.to);
            }
        })
    }
}
