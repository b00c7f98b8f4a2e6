use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, BufReader};

use funnel_engine::config::FunnelConfig;
use funnel_engine::error::DeliveryError;
use funnel_engine::funnel::Tier;
use funnel_engine::pipeline::{
    FunnelProcessor, InboundEvent, MessageSink, PaymentConfirmation, ProcessOutcome,
};
use funnel_engine::store::InMemoryProfileRepository;

/// Prints replies to stdout, one line per outbound message.
struct StdoutSink;

#[async_trait]
impl MessageSink for StdoutSink {
    fn name(&self) -> &str {
        "cli"
    }

    async fn deliver(&self, _conversation_id: &str, messages: &[String]) -> Result<(), DeliveryError> {
        println!();
        for message in messages {
            println!("{}", message);
        }
        println!();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = FunnelConfig::from_env()?;
    let conversation_id =
        std::env::var("FUNNEL_CLI_ID").unwrap_or_else(|_| "local-user".to_string());

    eprintln!("💬 Funnel Engine v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Conversation: {}", conversation_id);
    match config.template_seed {
        Some(seed) => eprintln!("   Template seed: {}", seed),
        None => eprintln!("   Template seed: random"),
    }
    eprintln!("   Commands: /stats /profile /pay <tier> <amount> /newcycle /reset /quit\n");

    let repo = Arc::new(InMemoryProfileRepository::new());
    let processor = FunnelProcessor::from_config(&config, repo, Arc::new(StdoutSink));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            eprint!("> ");
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let mut parts = command.split_whitespace();
            match parts.next().unwrap_or_default() {
                "quit" | "exit" => break,
                "stats" => {
                    let snapshot = processor.analytics().await?;
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
                "profile" => match processor.profile(&conversation_id).await? {
                    Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
                    None => eprintln!("No profile yet."),
                },
                "pay" => {
                    let tier = parts.next().map(parse_tier);
                    let amount = parts.next().map(str::parse::<Decimal>);
                    match (tier, amount) {
                        (Some(Some(tier)), Some(Ok(amount))) => {
                            let confirmation = PaymentConfirmation {
                                conversation_id: conversation_id.clone(),
                                tier,
                                amount,
                            };
                            match processor.confirm_payment(confirmation).await {
                                Ok(record) => eprintln!(
                                    "Payment confirmed: {} {}",
                                    record.tier, record.price
                                ),
                                Err(e) => eprintln!("Payment rejected: {}", e),
                            }
                        }
                        _ => eprintln!("Usage: /pay <basic|premium|vip> <amount>"),
                    }
                }
                "newcycle" => match processor.reset_payment_cycle(&conversation_id).await {
                    Ok(Some(record)) => eprintln!("Archived {} intent.", record.tier),
                    Ok(None) => eprintln!("No open payment intent."),
                    Err(e) => eprintln!("Reset failed: {}", e),
                },
                "reset" => {
                    processor.reset_conversation(&conversation_id).await?;
                    eprintln!("Conversation reset.");
                }
                other => eprintln!("Unknown command: /{}", other),
            }
            eprint!("> ");
            continue;
        }

        let event = InboundEvent::new(conversation_id.as_str(), line);
        match processor.process(event).await {
            Ok(ProcessOutcome::Processed { turn, .. }) => {
                if turn.stage_changed() {
                    eprintln!("   [{} → {}]", turn.previous_stage, turn.stage);
                }
            }
            Ok(ProcessOutcome::Duplicate { .. }) => {}
            Err(e) => eprintln!("Error: {}", e),
        }
        eprint!("> ");
    }

    Ok(())
}

fn parse_tier(raw: &str) -> Option<Tier> {
    match raw.to_lowercase().as_str() {
        "basic" => Some(Tier::Basic),
        "premium" => Some(Tier::Premium),
        "vip" => Some(Tier::Vip),
        _ => None,
    }
}
