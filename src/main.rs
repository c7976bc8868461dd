mod cli;

use framegrid::{
    config, nodes, processor, properties,
    state::JobRegistry,
    subject::{SubjectJobManager, SubjectJobReport, SubjectJobRequest},
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use fg_core::{Media, SubjectJobId};
use fg_pipeline::{DetectionComponent, SegmentContext, SegmentOutcome, SegmentRunner};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A batch of detection jobs plus the subject job submitted over them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunFile {
    jobs: Vec<JobEntry>,
    subject: SubjectJobRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobEntry {
    pipeline: String,
    media: Vec<Media>,
    #[serde(default)]
    properties: HashMap<String, String>,
}

/// Stand-in detection component for end-to-end runs. Reports a fixed number
/// of detections per segment, overridable through the
/// `DETECTIONS_PER_SEGMENT` job property.
struct SimulatedDetection;

#[async_trait::async_trait]
impl DetectionComponent for SimulatedDetection {
    async fn run_segment(&self, ctx: &SegmentContext) -> fg_core::Result<SegmentOutcome> {
        let detections = ctx
            .properties
            .get("DETECTIONS_PER_SEGMENT")
            .and_then(|value| value.parse().ok())
            .unwrap_or(1);
        Ok(SegmentOutcome { detections })
    }
}

async fn run_jobs(path: &std::path::Path, config_path: Option<&std::path::Path>) -> Result<()> {
    // Load config
    let config = config::load_config_or_default(config_path)?;
    let pipelines = config.build_pipelines()?;

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read run file: {:?}", path))?;
    let run: RunFile =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse run file: {:?}", path))?;
    if run.jobs.is_empty() {
        anyhow::bail!("Run file contains no jobs: {:?}", path);
    }

    // Media restriction and extra job properties come from the environment.
    let restrict = std::env::var(properties::RESTRICT_MEDIA_TYPES).ok();
    let restriction = properties::restricted_media_kinds(restrict.as_deref())?;
    if let Some(ref kinds) = restriction {
        tracing::info!("This process only handles media kinds {:?}", kinds);
    }
    let env_properties = properties::process_job_properties();

    let registry = JobRegistry::new();
    let mut runner = SegmentRunner::new(config.runner.segment_frames);
    let component: Arc<dyn DetectionComponent> = Arc::new(SimulatedDetection);
    for algorithm in config.components.keys() {
        runner.register(algorithm, component.clone());
    }

    // Create shutdown channel for job processor
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    // Start job processor
    let processor = processor::JobProcessor::new(
        registry.clone(),
        Arc::new(runner),
        restriction,
        shutdown_rx,
    );
    let processor_handle = tokio::spawn(processor.run());

    let mut job_ids = Vec::new();
    for entry in run.jobs {
        let pipeline = pipelines
            .get(&entry.pipeline)
            .ok_or_else(|| anyhow::anyhow!("Unknown pipeline '{}'", entry.pipeline))?;
        // Environment-derived properties override the ones in the run file.
        let mut job_properties = entry.properties;
        job_properties.extend(env_properties.clone());
        let job = registry.create_job(pipeline.clone(), entry.media, job_properties);
        job_ids.push(job.id);
    }
    println!("Created {} detection jobs", job_ids.len());

    let manager = SubjectJobManager::new(
        registry.clone(),
        config.results_dir.clone(),
        Duration::from_secs(config.callback.timeout_secs),
    );

    // Job ids are assigned at runtime, so the subject always covers every
    // job created from this run file.
    let mut request = run.subject;
    request.detection_job_ids = job_ids.iter().copied().collect();
    let subject = manager.submit(request)?;
    println!(
        "Submitted subject job {} ({})",
        subject.id, subject.request.component_name
    );

    let finished = tokio::select! {
        job = wait_for_subject(&registry, subject.id) => Some(job),
        _ = tokio::signal::ctrl_c() => {
            let swept = manager.cancel_incomplete_jobs();
            tracing::info!("Interrupted; cancelled {} incomplete subject jobs", swept);
            None
        }
    };

    if let Some(job) = finished {
        println!("\nSubject job {} complete", job.id);
        println!(
            "{}",
            serde_json::to_string_pretty(&SubjectJobReport::from_job(&job))?
        );
    }

    // Cleanup
    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(()).await;
    let _ = processor_handle.await;

    Ok(())
}

async fn wait_for_subject(
    registry: &JobRegistry,
    id: SubjectJobId,
) -> framegrid::state::SubjectJob {
    loop {
        if let Some(job) = registry.subject_job(id) {
            if job.is_complete() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "framegrid=trace,fg_pipeline=trace,fg_core=debug".to_string()
        } else {
            "framegrid=debug,fg_pipeline=info,fg_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Run { jobs } => {
            // Create tokio runtime
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_jobs(&jobs, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Nodes { input, output } => convert_nodes(&input, output.as_deref()),
        Commands::Version => {
            println!("framegrid {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Results dir: {:?}", config.results_dir);
            println!("  Callback timeout: {}s", config.callback.timeout_secs);
            println!("  Segment length: {} frames", config.runner.segment_frames);
            println!("  Components: {}", config.components.len());
            println!("  Pipelines: {}", config.pipelines.len());
            println!(
                "    Actions: {}",
                config
                    .pipelines
                    .iter()
                    .map(|p| p.actions.len())
                    .sum::<usize>()
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Results dir: {:?}", config.results_dir);
            println!("  Segment length: {} frames", config.runner.segment_frames);
        }
    }

    Ok(())
}

fn convert_nodes(input: &std::path::Path, output: Option<&std::path::Path>) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read node configuration: {:?}", input))?;

    let config = match extension(input).as_deref() {
        Some("json") => nodes::json::from_json(&raw)?,
        Some("xml") => nodes::xml::from_xml(&raw)?,
        _ => anyhow::bail!("Unsupported node configuration extension: {:?}", input),
    };

    let services: usize = config.managers.iter().map(|m| m.services.len()).sum();
    println!("✓ Node configuration is valid");
    println!("  Hosts: {}", config.managers.len());
    println!("  Services: {}", services);

    if let Some(out) = output {
        let rendered = match extension(out).as_deref() {
            Some("json") => nodes::json::to_json(&config)?,
            Some("xml") => nodes::xml::to_xml(&config)?,
            _ => anyhow::bail!("Unsupported node configuration extension: {:?}", out),
        };
        std::fs::write(out, rendered)
            .with_context(|| format!("Failed to write node configuration: {:?}", out))?;
        println!("Wrote {:?}", out);
    }

    Ok(())
}

fn extension(path: &std::path::Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}
