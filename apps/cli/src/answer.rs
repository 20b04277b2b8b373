//! Stage two: record or upload the answer, preview it, send it for analysis.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Result, bail};
use charisma_core::{
    AnalysisController, ApiClient, CameraOutcome, CaptureMode, CoachError, FeedbackResult,
    InterviewSession,
    MAX_RECORDING_SECS, PreviewStore, RecordingController, RecordingError, RecordingState,
    TickOutcome, format_elapsed,
};
use console::style;
use tracing::{debug, warn};

use crate::{
    ffmpeg,
    questions::unquote,
    ui::{self, Prompt},
};

/// What the user picked from the preview menu.
enum PreviewChoice {
    Analyze,
    Quit,
}

/// Owns the recorder and the preview file. Dropping it removes the preview.
pub struct AnswerStage {
    controller: RecordingController,
    analysis: AnalysisController,
    previews: PreviewStore,
    preview: Option<PathBuf>,
}

impl AnswerStage {
    pub fn new(controller: RecordingController, previews: PreviewStore) -> Self {
        Self {
            controller,
            analysis: AnalysisController::new(),
            previews,
            preview: None,
        }
    }

    fn report_camera(outcome: CameraOutcome) {
        match outcome {
            CameraOutcome::Ready { devices } => ui::success(format!(
                "Camera ready {}",
                style(format!("({devices} found)")).dim()
            )),
            CameraOutcome::FellBackToUpload { reason } => {
                ui::alert(reason.remediation());
            }
        }
    }

    pub async fn start_camera(&mut self) -> Result<()> {
        let spinner = ui::create_spinner("Starting camera...");
        let outcome = self.controller.initialize_camera().await;
        spinner.finish_and_clear();
        Self::report_camera(outcome?);
        Ok(())
    }

    /// Skips the camera and loads `path` as the answer.
    pub async fn start_with_upload(&mut self, path: &Path) -> Result<()> {
        self.controller.select_upload()?;
        self.load_upload(path).await;
        Ok(())
    }

    async fn load_upload(&mut self, path: &Path) {
        match self.controller.upload_file(path).await {
            Ok(()) => {
                if let Some(artifact) = self.controller.artifact() {
                    ui::success(format!(
                        "Loaded {} {}",
                        artifact.file_name,
                        style(format!("({:.1} MB)", artifact.len() as f64 / 1_048_576.0)).dim()
                    ));
                }
            }
            Err(e) => ui::error(e),
        }
    }

    async fn record(&mut self, prompt: &mut Prompt) -> Result<(), RecordingError> {
        let mime = self.controller.start_recording().await?;
        debug!(mime, "recording");

        let bar = ui::create_recording_bar();
        let started = Instant::now();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => match self.controller.tick().await {
                    Ok(TickOutcome::Elapsed(secs)) => ui::set_elapsed(&bar, secs),
                    Ok(TickOutcome::AutoStopped(artifact)) => {
                        bar.finish_and_clear();
                        ui::alert(format!(
                            "Reached the {} limit, recording stopped ({} bytes)",
                            format_elapsed(MAX_RECORDING_SECS),
                            artifact.len()
                        ));
                        return Ok(());
                    }
                    Ok(TickOutcome::Interrupted { artifact, reason }) => {
                        bar.finish_and_clear();
                        ui::alert(format!(
                            "Recording stopped early: {} ({} bytes kept)",
                            reason.remediation(),
                            artifact.len()
                        ));
                        return Ok(());
                    }
                    Err(e) => {
                        bar.finish_and_clear();
                        return Err(e);
                    }
                },
                line = prompt.line() => {
                    if let Err(e) = line {
                        warn!(error = %e, "stdin closed while recording");
                    }
                    break;
                }
            }
        }

        bar.finish_and_clear();
        let artifact = self.controller.stop_recording().await?;
        ui::success(format!(
            "Recorded {} {}",
            format_elapsed(started.elapsed().as_secs() as u32),
            style(format!("({} bytes)", artifact.len())).dim()
        ));
        Ok(())
    }

    async fn publish_preview(&mut self) {
        let Some(artifact) = self.controller.artifact() else {
            return;
        };
        match self.previews.publish(artifact).await {
            Ok(path) => {
                println!(
                    "{} Preview: {}",
                    style("▶").cyan().bold(),
                    style(path.display()).dim()
                );
                self.preview = Some(path);
            }
            Err(e) => warn!(error = %e, "could not write preview"),
        }
    }

    async fn revoke_preview(&mut self) {
        if let Some(path) = self.preview.take() {
            if let Err(e) = self.previews.revoke(&path).await {
                warn!(error = %e, "could not remove preview");
            }
        }
    }

    async fn preview_menu(&mut self, prompt: &mut Prompt) -> Result<Option<PreviewChoice>> {
        if self.preview.is_none() {
            self.publish_preview().await;
        }

        let choice = prompt
            .choose(
                "[a]nalyze, [p]lay, [r]etake, [u]pload instead, [w]ebcam instead, [q]uit?",
                &['a', 'p', 'r', 'u', 'w', 'q'],
            )
            .await?;

        match choice {
            'a' => return Ok(Some(PreviewChoice::Analyze)),
            'q' => return Ok(Some(PreviewChoice::Quit)),
            'p' => match &self.preview {
                Some(path) => {
                    if let Err(e) = ffmpeg::open_in_player(path).await {
                        ui::alert(format!("Could not open a player: {e}"));
                    }
                }
                None => ui::alert("No preview file available"),
            },
            'r' => {
                self.controller.retake()?;
                self.revoke_preview().await;
            }
            'u' => {
                self.controller.select_upload()?;
                self.revoke_preview().await;
            }
            _ => {
                self.revoke_preview().await;
                let spinner = ui::create_spinner("Starting camera...");
                let outcome = self.controller.select_webcam().await;
                spinner.finish_and_clear();
                Self::report_camera(outcome?);
            }
        }
        Ok(None)
    }

    /// Drives the controller until an answer is ready. `false` means the user quit.
    pub async fn capture(&mut self, prompt: &mut Prompt) -> Result<bool> {
        loop {
            match (self.controller.state(), self.controller.mode()) {
                (RecordingState::CameraReady, _) => {
                    let answer = prompt
                        .ask("Press Enter to start recording ([u] to upload a file, [q] to quit):")
                        .await?;
                    match ReadyKey::parse(&answer) {
                        Some(ReadyKey::Record) => {
                            if let Err(e) = self.record(prompt).await {
                                ui::error(e);
                            }
                        }
                        Some(ReadyKey::Upload) => self.controller.select_upload()?,
                        Some(ReadyKey::Quit) => return Ok(false),
                        None => ui::alert("Press Enter on an empty line, or type u or q"),
                    }
                }
                (RecordingState::Idle, CaptureMode::Upload) => {
                    let answer = prompt
                        .ask("Path to your answer video (or [w] to retry the webcam, [q] to quit):")
                        .await?;
                    match unquote(&answer) {
                        "" => {}
                        "q" | "Q" => return Ok(false),
                        "w" | "W" => {
                            let spinner = ui::create_spinner("Starting camera...");
                            let outcome = self.controller.select_webcam().await;
                            spinner.finish_and_clear();
                            Self::report_camera(outcome?);
                        }
                        path => self.load_upload(Path::new(path)).await,
                    }
                }
                (RecordingState::Idle, CaptureMode::Webcam) => self.start_camera().await?,
                (RecordingState::StoppedPreview | RecordingState::UploadPreview, _) => {
                    match self.preview_menu(prompt).await? {
                        Some(PreviewChoice::Analyze) => return Ok(true),
                        Some(PreviewChoice::Quit) => return Ok(false),
                        None => {}
                    }
                }
                (state @ (RecordingState::CameraInitializing | RecordingState::Recording), _) => {
                    bail!("unexpected recorder state: {state}")
                }
            }
        }
    }

    /// Sends the answer, offering a retry on failure. `None` returns to the preview menu.
    pub async fn analyze(
        &mut self,
        api: &ApiClient,
        session: &InterviewSession,
        prompt: &mut Prompt,
    ) -> Result<Option<FeedbackResult>> {
        if !self.analysis.can_submit() {
            bail!("this answer has already been analyzed");
        }
        loop {
            let step_start = Instant::now();
            let spinner = ui::create_spinner("Analyzing your answer...");
            match self
                .analysis
                .submit(api, Some(session), self.controller.artifact())
                .await
                .map_err(CoachError::from)
            {
                Ok(feedback) => {
                    spinner.finish_with_message(format!(
                        "{} Analysis complete {}",
                        style("✓").green().bold(),
                        style(format!("[{}]", ui::format_duration(step_start.elapsed()))).dim()
                    ));
                    return Ok(Some(feedback));
                }
                Err(e) => {
                    spinner.finish_and_clear();
                    ui::error(&e);
                    // Retrying cannot fix a missing video or context.
                    if e.is_validation() || !prompt.confirm("Try again?").await? {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Removes the preview file and releases the camera.
    pub async fn finish(mut self) {
        self.revoke_preview().await;
        self.controller.shutdown();
    }
}

impl Drop for AnswerStage {
    fn drop(&mut self) {
        if let Some(path) = self.preview.take() {
            if let Err(e) = self.previews.revoke_now(&path) {
                warn!(error = %e, "could not remove preview");
            }
        }
    }
}

/// Answers accepted while the camera is ready.
#[derive(Debug, PartialEq, Eq)]
enum ReadyKey {
    Record,
    Upload,
    Quit,
}

impl ReadyKey {
    fn parse(answer: &str) -> Option<Self> {
        match answer.trim().to_lowercase().as_str() {
            "" => Some(ReadyKey::Record),
            "u" => Some(ReadyKey::Upload),
            "q" => Some(ReadyKey::Quit),
            _ => None,
        }
    }
}
