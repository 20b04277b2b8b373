use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use charisma_core::{
    ApiClient, Config, PreviewStore, RecordingController, StreamConstraints,
    format_feedback_readable, render,
};
use clap::{Parser, ValueEnum};
use console::style;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    answer::AnswerStage,
    ffmpeg::FfmpegBackend,
    questions::FormArgs,
    ui::Prompt,
};

mod answer;
mod ffmpeg;
mod questions;
mod ui;

/// CLI wrapper for the role presets (needed for clap ValueEnum)
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CliRole {
    SoftwareEngineer,
    BackendEngineer,
    FrontendEngineer,
    FullStackDeveloper,
    DataScientist,
    ProductManager,
    UxDesigner,
    DevopsEngineer,
    Custom,
}

impl CliRole {
    fn preset(self) -> Option<&'static str> {
        match self {
            CliRole::SoftwareEngineer => Some("Software Engineer"),
            CliRole::BackendEngineer => Some("Backend Engineer"),
            CliRole::FrontendEngineer => Some("Frontend Engineer"),
            CliRole::FullStackDeveloper => Some("Full Stack Developer"),
            CliRole::DataScientist => Some("Data Scientist"),
            CliRole::ProductManager => Some("Product Manager"),
            CliRole::UxDesigner => Some("UX Designer"),
            CliRole::DevopsEngineer => Some("DevOps Engineer"),
            CliRole::Custom => None,
        }
    }
}

#[derive(Parser)]
#[command(name = "charisma")]
#[command(
    about = "Practice interviews: get role-specific questions, record your answer and receive AI feedback"
)]
struct Cli {
    /// Target role; anything not given on the command line is asked for interactively
    #[arg(short, long)]
    role: Option<CliRole>,

    /// Free-text role, used instead of --role
    #[arg(long, conflicts_with = "role")]
    custom_role: Option<String>,

    /// PDF résumé used as background
    #[arg(long, conflicts_with = "description")]
    resume: Option<PathBuf>,

    /// Background description, used instead of a résumé
    #[arg(short, long)]
    description: Option<String>,

    /// Upload this answer video instead of recording one
    #[arg(long)]
    video: Option<PathBuf>,

    /// Camera device, e.g. /dev/video0. Defaults to the first one found.
    #[arg(long)]
    device: Option<PathBuf>,

    /// PulseAudio source recorded with the video
    #[arg(long, default_value = "default")]
    audio_source: String,

    /// Record video only
    #[arg(long)]
    no_audio: bool,

    /// Also write the feedback as a standalone HTML report
    #[arg(long)]
    html: Option<PathBuf>,

    /// Backend origin (overrides CHARISMA_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("charisma=debug,charisma_core=debug")
    } else {
        EnvFilter::try_new(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn check_backend(api: &ApiClient) {
    let spinner = ui::create_spinner("Checking backend...");
    match api.health().await {
        Ok(_) => spinner.finish_with_message(format!(
            "{} Backend online {}",
            style("✓").green().bold(),
            style(api.base_url()).dim()
        )),
        Err(e) => {
            spinner.finish_and_clear();
            ui::alert(format!("Backend at {} is not responding: {e}", api.base_url()));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url)?;
    }
    init_tracing(&config, cli.verbose);

    // Dropping `run` on Ctrl-C drops the answer stage, which removes its preview.
    tokio::select! {
        result = run(cli, config) => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("interrupted");
            println!("\n{}", style("Interrupted").dim());
            Ok(())
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    println!(
        "\n{}  {}\n",
        style("charisma").cyan().bold(),
        style("Interview Coach").dim()
    );

    let api = ApiClient::new(&config.api_url);
    check_backend(&api).await;
    ui::rule();

    let mut prompt = Prompt::new();

    // Stage 1: questions
    let args = FormArgs {
        preset: cli.role.and_then(CliRole::preset),
        custom: cli.role == Some(CliRole::Custom),
        custom_role: cli.custom_role.as_deref(),
        resume: cli.resume.as_deref(),
        description: cli.description.as_deref(),
    };
    let mut form = questions::fill_form(args, &mut prompt).await?;
    let session = questions::generate(&mut form, &api, &mut prompt).await?;
    info!(session = %session.id(), "questions ready");
    questions::print_questions(&session);

    // Stage 2: answer
    let backend = FfmpegBackend::detect(cli.device.clone(), Some(cli.audio_source.clone())).await;
    let controller = RecordingController::new(Arc::new(backend)).with_constraints(StreamConstraints {
        audio: !cli.no_audio,
        ..StreamConstraints::default()
    });
    let mut stage = AnswerStage::new(controller, PreviewStore::default());

    match &cli.video {
        Some(path) => stage.start_with_upload(path).await?,
        None => stage.start_camera().await?,
    }

    let feedback = loop {
        if !stage.capture(&mut prompt).await? {
            stage.finish().await;
            println!("{}", style("Bye!").dim());
            return Ok(());
        }
        if let Some(feedback) = stage.analyze(&api, &session, &mut prompt).await? {
            break feedback;
        }
    };
    stage.finish().await;

    ui::rule();
    println!("{}", format_feedback_readable(&feedback));

    if let Some(path) = &cli.html {
        tokio::fs::write(path, render::report_page(&session, &feedback))
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        ui::success(format!("Report saved to {}", style(path.display()).dim()));
    }

    Ok(())
}
