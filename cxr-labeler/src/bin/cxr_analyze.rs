//! cxr-analyze - headless labeling from the command line
//!
//! Runs one image through the same core as the service: validation,
//! concurrent prediction and review, optional corrections and retraining.
//! Notices that the service would stream to the browser are printed instead.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cxr_common::events::{EventBus, LabelerEvent};
use cxr_labeler::config::{load_toml, LabelerConfig};
use cxr_labeler::logging::init_tracing;
use cxr_labeler::models::ImageUpload;
use cxr_labeler::services::HttpAnalysisBackend;
use cxr_labeler::Labeler;
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(name = "cxr-analyze")]
#[command(about = "Analyze and label one chest X-ray image")]
#[command(version)]
struct Args {
    /// Image file (.jpg, .jpeg, .png or .dcm)
    file: PathBuf,

    /// Declared content type (e.g. image/png)
    #[arg(long)]
    content_type: Option<String>,

    /// Base URL of the analysis backend
    #[arg(short, long)]
    backend_url: Option<String>,

    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pathology to mark as incorrect before saving (repeatable)
    #[arg(long = "disable", value_name = "PATHOLOGY")]
    disable: Vec<String>,

    /// Save corrections after analysis
    #[arg(long)]
    save: bool,

    /// Trigger retraining at the end
    #[arg(long)]
    train: bool,

    /// Print the final session as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (_, toml_config) = load_toml(args.config.as_deref());
    init_tracing(&toml_config.logging.level);

    let config = LabelerConfig::resolve(&toml_config, args.backend_url.as_deref(), None)
        .context("Invalid configuration")?;
    let backend = HttpAnalysisBackend::new(config.backend_url.clone(), config.request_timeout)
        .context("Failed to create backend client")?;

    let event_bus = EventBus::new(64);
    let mut notices = event_bus.subscribe();
    let labeler = Labeler::new(Arc::new(backend), event_bus);

    let mut upload = ImageUpload::from_path(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    if let Some(content_type) = &args.content_type {
        upload = upload.with_content_type(content_type.clone());
    }

    let ticket = match labeler.select_file(upload).await {
        Ok(ticket) => ticket,
        Err(e) => {
            print_notices(&mut notices);
            bail!(e);
        }
    };
    let summary = labeler.orchestrator.run(ticket).await;
    print_notices(&mut notices);

    for pathology in &args.disable {
        if labeler.session.disable_prediction(pathology).await.is_none() {
            eprintln!("warning: no prediction named '{}'", pathology);
        }
    }

    if !args.json {
        print_results(&labeler).await;
    }

    let mut failed = summary.prediction_count + summary.finding_count == 0;

    if args.save {
        failed |= labeler.submitter.submit().await.is_err();
        print_notices(&mut notices);
    }
    if args.train {
        failed |= labeler.retrain.trigger().await.is_err();
        print_notices(&mut notices);
    }

    if args.json {
        let snapshot = labeler.session.snapshot().await;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    if failed {
        bail!("one or more operations failed");
    }
    Ok(())
}

async fn print_results(labeler: &Labeler) {
    let predictions = labeler.session.predictions().await;
    println!(
        "Predictions ({} of {} enabled):",
        predictions.enabled_count(),
        predictions.len()
    );
    for (index, p) in predictions.predictions().iter().enumerate() {
        println!(
            "  [{}] {} {:<24} {:>5.1}%  {}",
            index,
            if p.enabled { "x" } else { " " },
            p.pathology,
            p.confidence * 100.0,
            p.confidence_band().label()
        );
    }

    let review = labeler.session.review().await;
    println!("PACEMAN review ({}):", review.len());
    for finding in review.findings() {
        println!("  {} [{}]", finding.category, finding.status.label());
        for line in &finding.findings {
            println!("    - {}", line);
        }
    }
}

/// Drain pending notices to stderr
fn print_notices(rx: &mut broadcast::Receiver<LabelerEvent>) {
    loop {
        match rx.try_recv() {
            Ok(LabelerEvent::ConditionRaised { title, message, .. }) => {
                eprintln!("error: {}: {}", title, message);
            }
            Ok(LabelerEvent::AnalysisComplete { title, message, .. })
            | Ok(LabelerEvent::CorrectionsSaved { title, message, .. })
            | Ok(LabelerEvent::TrainingInitiated { title, message, .. }) => {
                eprintln!("{}: {}", title, message);
            }
            Ok(_) => {}
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
}
