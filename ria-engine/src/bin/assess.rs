//! Demo CLI: runs a proposal through the full assessment pipeline against
//! the in-memory demo corpus and a scripted model client, auto-approving
//! both review gates so the flow reaches completion end to end.

use clap::Parser;
use ria_contracts::{ContextMetadata, ReviewAction, WorkflowState};
use ria_engine::demo::{build_demo_store, DemoModelClient};
use ria_engine::Engine;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

#[derive(Parser)]
#[command(name = "assess")]
#[command(about = "Run a regulatory proposal through the assessment engine")]
struct Args {
    /// The proposal text to assess. Falls back to a built-in sample if omitted.
    #[arg(long)]
    proposal: Option<String>,

    /// Jurisdiction carried in the assessment's context metadata.
    #[arg(long, default_value = "BE")]
    jurisdiction: String,

    /// Simulate the chairman model being unavailable, to exercise the
    /// fallback path.
    #[arg(long)]
    fail_chairman: bool,
}

const SAMPLE_PROPOSAL: &str = "This proposal establishes a risk-based registration and audit regime for \
    high-risk automated decision-making systems deployed by public administrations and large private \
    operators. Covered entities must register affected systems before deployment, undergo periodic \
    algorithmic audits, and provide a documented human-in-the-loop override mechanism for any \
    individual decision with material legal effect. The proposal introduces phased compliance \
    deadlines over three years, proportionate to operator size, and tasks a new oversight unit with \
    reviewing registration filings and investigating complaints. It further requires an annual public \
    transparency report summarizing audit findings and complaint outcomes.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let proposal = args.proposal.unwrap_or_else(|| SAMPLE_PROPOSAL.to_string());

    let (store, graph) = build_demo_store().await;
    let client: Arc<dyn ria_model_client::ModelClient> = if args.fail_chairman {
        Arc::new(DemoModelClient::with_chairman_failure())
    } else {
        Arc::new(DemoModelClient::new())
    };

    let config = ria_config::ConfigLoader::new().load()?;
    let engine = Engine::new(config, store, graph, client);

    let context_metadata = ContextMetadata { jurisdiction: Some(args.jurisdiction), ..ContextMetadata::default() };
    let assessment_id = engine.create_assessment(proposal, context_metadata).await?;
    println!("assessment created: {assessment_id}");

    let mut events = engine.stream_assessment(assessment_id).await?;
    loop {
        match events.recv().await {
            Ok(event) => {
                println!("event: {event:?}");
                if matches!(event, ria_engine::Event::ReviewRequired { .. } | ria_engine::Event::Report { .. }) {
                    engine
                        .review(assessment_id, ReviewAction::Approve, "auto-approved by demo CLI", "demo-reviewer", None)
                        .await?;
                }
                if matches!(event, ria_engine::Event::WorkflowComplete | ria_engine::Event::Error { .. }) {
                    break;
                }
            }
            Err(_) => break,
        }
    }

    // Give the final retire/extract steps a moment to settle before reading back state.
    sleep(Duration::from_millis(10)).await;

    match engine.get_status(assessment_id).await {
        Some(WorkflowState::Completed) => {
            if let Some(report) = engine.get_report(assessment_id).await {
                println!("--- executive summary ---");
                println!("{}", report.executive_summary.unwrap_or_default());
                println!("themes with missing coverage: {}", report.missing_theme_count);
            }
        }
        Some(state) => println!("assessment ended in state: {}", state.label()),
        None => println!("assessment not found"),
    }

    Ok(())
}
