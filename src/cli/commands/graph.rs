use anyhow::Result;

use delivery_lifecycle::{DeliveryStatus, StateGraph};

use super::{Command, CommandContext};

pub struct GraphCommand;

impl Command for GraphCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let graph = StateGraph::canonical();
        ctx.emit(&graph.rules(), |rules| {
            println!("🗺️  DELIVERY LIFECYCLE");
            println!("=====================");
            for rule in rules.iter() {
                let mut flags = Vec::new();
                if rule.driver_performable {
                    flags.push("driver");
                }
                if rule.requires_issue {
                    flags.push("issue report");
                }
                let flags = if flags.is_empty() {
                    "admin only".to_string()
                } else {
                    flags.join(", ")
                };
                println!("   {:<16} -> {:<16} [{}]", rule.from.as_str(), rule.to.as_str(), flags);
            }
            println!();
            let terminal: Vec<&str> = DeliveryStatus::ALL
                .into_iter()
                .filter(|s| graph.is_terminal(*s))
                .map(DeliveryStatus::as_str)
                .collect();
            println!("🏁 Terminal: {}", terminal.join(", "));
        })
    }
}
