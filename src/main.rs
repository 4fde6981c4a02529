use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use experiment_core::{ExperimentPipeline, GenerationRecord, ReportWriter, detailed_records};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file, if present.
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,experiment_core=info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(llm_service::telemetry::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .context("usage: rag-lab <experiment-config.yaml>")?;
    tracing::info!("running experiment from {config_path}");

    let cfg = experiment_core::config::load(&config_path)?;
    let out_dir = cfg.output_dir.join(&cfg.experiment_name);
    let experiment_id = cfg.experiment_id();

    let pipeline = ExperimentPipeline::from_config(cfg)?;
    let report = pipeline.run().await?;

    let writer = ReportWriter::new(out_dir, experiment_id)?;
    writer.write_summary(&report.summary)?;
    writer.write_detailed(&detailed_records(
        &report.queries,
        &report.outcomes,
        &report.evaluation,
    ))?;
    if !report.samples.is_empty() {
        let rows: Vec<GenerationRecord> = report
            .samples
            .iter()
            .map(GenerationRecord::from_sample)
            .collect();
        writer.write_generation(&rows)?;
    }

    println!("\n=== {} ===", report.summary.experiment_info.name);
    for (metric, value) in &report.summary.aggregate_metrics {
        println!("{metric}: {value:.4}");
    }
    println!(
        "\nqueries: {} ({} failed), documents: {}, passages: {}, duration: {:.2}s",
        report.summary.query_count,
        report.summary.failed_count,
        report.summary.document_count,
        report.summary.passage_count,
        report.summary.experiment_info.duration_seconds,
    );

    Ok(())
}
