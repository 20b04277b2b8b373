//! Webcam capture through ffmpeg (`v4l2` video, `pulse` audio).

use std::{
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use charisma_core::{
    CaptureBackend, CaptureError, CaptureStream, StreamConstraints, StreamRecorder,
    capture::{PREFERRED_MIME, VideoInput},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStderr, ChildStdin, Command},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

const STOP_GRACE: Duration = Duration::from_secs(5);
/// How long a fresh recorder must survive before it counts as started.
const STARTUP_GRACE: Duration = Duration::from_millis(500);
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(10);
const READ_BUFFER: usize = 64 * 1024;

/// Maps ffmpeg's stderr onto the capture error taxonomy.
pub fn classify_ffmpeg_error(stderr: &str) -> CaptureError {
    let lower = stderr.to_lowercase();
    if lower.contains("permission denied") {
        CaptureError::PermissionDenied
    } else if lower.contains("device or resource busy") {
        CaptureError::DeviceBusy
    } else if lower.contains("no such file or directory") || lower.contains("no such device") {
        CaptureError::NoDevice
    } else if lower.contains("operation not permitted") {
        CaptureError::SecurityRestricted
    } else {
        let last = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("ffmpeg exited without output");
        CaptureError::Other(last.trim().to_string())
    }
}

/// Error for an ffmpeg that exited without being asked to.
fn unexpected_exit(status: ExitStatus, stderr: &str) -> CaptureError {
    if status.success() {
        CaptureError::Other("ffmpeg stopped recording on its own".into())
    } else {
        classify_ffmpeg_error(stderr)
    }
}

/// Maps errors from opening the device node.
pub fn classify_io_error(err: &std::io::Error) -> CaptureError {
    match (err.kind(), err.raw_os_error()) {
        (std::io::ErrorKind::PermissionDenied, _) => CaptureError::PermissionDenied,
        (std::io::ErrorKind::NotFound, _) => CaptureError::NoDevice,
        (_, Some(16)) => CaptureError::DeviceBusy,
        (_, Some(1)) => CaptureError::SecurityRestricted,
        _ => CaptureError::Other(err.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    device: Option<PathBuf>,
    audio_source: Option<String>,
    available: bool,
    encoders: String,
}

impl FfmpegBackend {
    /// Checks that ffmpeg runs and records which encoders it ships.
    pub async fn detect(device: Option<PathBuf>, audio_source: Option<String>) -> Self {
        let ffmpeg = PathBuf::from("ffmpeg");
        let output = Command::new(&ffmpeg)
            .arg("-hide_banner")
            .arg("-encoders")
            .stdin(Stdio::null())
            .output()
            .await;

        let (available, encoders) = match output {
            Ok(out) if out.status.success() => {
                (true, String::from_utf8_lossy(&out.stdout).into_owned())
            }
            Ok(out) => {
                warn!(status = %out.status, "ffmpeg -encoders failed");
                (false, String::new())
            }
            Err(e) => {
                warn!(error = %e, "ffmpeg not found");
                (false, String::new())
            }
        };

        Self {
            ffmpeg,
            device,
            audio_source,
            available: available && cfg!(target_os = "linux"),
            encoders,
        }
    }

    /// A backend that reports no camera support.
    #[cfg(test)]
    pub(crate) fn offline() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            device: None,
            audio_source: None,
            available: false,
            encoders: String::new(),
        }
    }

    fn has_encoder(&self, name: &str) -> bool {
        self.encoders
            .lines()
            .any(|line| line.split_whitespace().nth(1) == Some(name))
    }

    async fn scan_devices() -> Result<Vec<VideoInput>, CaptureError> {
        let mut entries = match tokio::fs::read_dir("/dev").await {
            Ok(entries) => entries,
            Err(e) => return Err(classify_io_error(&e)),
        };

        let mut devices = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with("video") {
                continue;
            }
            let label = tokio::fs::read_to_string(format!("/sys/class/video4linux/{name}/name"))
                .await
                .map(|label| label.trim().to_string())
                .unwrap_or_else(|_| name.clone());
            devices.push(VideoInput {
                id: entry.path().display().to_string(),
                label,
            });
        }
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }
}

#[async_trait]
impl CaptureBackend for FfmpegBackend {
    fn is_supported(&self) -> bool {
        self.available
    }

    async fn video_inputs(&self) -> Result<Vec<VideoInput>, CaptureError> {
        if let Some(device) = &self.device {
            return Ok(match tokio::fs::metadata(device).await {
                Ok(_) => vec![VideoInput {
                    id: device.display().to_string(),
                    label: device.display().to_string(),
                }],
                Err(_) => Vec::new(),
            });
        }
        Self::scan_devices().await
    }

    async fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let device = match &self.device {
            Some(device) => device.clone(),
            None => Self::scan_devices()
                .await?
                .into_iter()
                .next()
                .map(|input| PathBuf::from(input.id))
                .ok_or(CaptureError::NoDevice)?,
        };

        tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&device)
            .await
            .map_err(|e| classify_io_error(&e))?;

        info!(device = %device.display(), "camera opened");
        Ok(Box::new(FfmpegStream {
            ffmpeg: self.ffmpeg.clone(),
            device,
            audio_source: constraints
                .audio
                .then(|| self.audio_source.clone().unwrap_or_else(|| "default".to_string())),
            video_size: format!("{}x{}", constraints.ideal_width, constraints.ideal_height),
            live: true,
        }))
    }

    fn supports_mime(&self, mime: &str) -> bool {
        if mime == PREFERRED_MIME {
            self.has_encoder("libvpx-vp9")
        } else {
            mime.starts_with("video/webm") && self.has_encoder("libvpx")
        }
    }
}

struct FfmpegStream {
    ffmpeg: PathBuf,
    device: PathBuf,
    audio_source: Option<String>,
    video_size: String,
    live: bool,
}

impl FfmpegStream {
    fn input_args(&self, cmd: &mut Command) {
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-f")
            .arg("v4l2")
            .arg("-video_size")
            .arg(&self.video_size)
            .arg("-i")
            .arg(&self.device);
        if let Some(source) = &self.audio_source {
            cmd.arg("-f").arg("pulse").arg("-i").arg(source);
        }
    }
}

#[async_trait]
impl CaptureStream for FfmpegStream {
    async fn first_frame(&mut self) -> Result<(), CaptureError> {
        let mut cmd = Command::new(&self.ffmpeg);
        self.input_args(&mut cmd);
        // The pulse input never ends on its own, hence the duration cap.
        cmd.arg("-frames:v")
            .arg("1")
            .arg("-t")
            .arg("1")
            .arg("-f")
            .arg("null")
            .arg("-")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(FIRST_FRAME_TIMEOUT, cmd.output()).await {
            Ok(output) => output.map_err(|e| classify_io_error(&e))?,
            Err(_) => {
                return Err(CaptureError::Other(
                    "timed out waiting for the first camera frame".into(),
                ));
            }
        };
        if !output.status.success() {
            return Err(classify_ffmpeg_error(&String::from_utf8_lossy(
                &output.stderr,
            )));
        }
        debug!(device = %self.device.display(), "first frame captured");
        Ok(())
    }

    async fn start_recorder(
        &mut self,
        mime: &str,
        timeslice: Duration,
    ) -> Result<Box<dyn StreamRecorder>, CaptureError> {
        if !self.live {
            return Err(CaptureError::Other("capture stream already stopped".into()));
        }

        let codec = if mime.contains("vp9") { "libvpx-vp9" } else { "libvpx" };
        let mut cmd = Command::new(&self.ffmpeg);
        self.input_args(&mut cmd);
        cmd.arg("-c:v")
            .arg(codec)
            .arg("-deadline")
            .arg("realtime")
            .arg("-b:v")
            .arg("1M");
        if self.audio_source.is_some() {
            cmd.arg("-c:a").arg("libopus");
        }
        cmd.arg("-f")
            .arg("webm")
            .arg("pipe:1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| classify_io_error(&e))?;
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Other("ffmpeg stdout unavailable".into()))?;

        let stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| CaptureError::Other("ffmpeg stderr unavailable".into()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_chunks(stdout, tx, timeslice));
        let stderr = Arc::new(Mutex::new(String::new()));
        let stderr_task = tokio::spawn(collect_stderr(stderr_pipe, Arc::clone(&stderr)));

        if let Ok(status) = tokio::time::timeout(STARTUP_GRACE, child.wait()).await {
            let status = status.map_err(|e| CaptureError::Other(e.to_string()))?;
            let _ = stderr_task.await;
            let err = unexpected_exit(status, &lock_text(&stderr));
            warn!(error = %err, %status, "ffmpeg exited during startup");
            return Err(err);
        }

        info!(codec, device = %self.device.display(), "ffmpeg recorder started");
        Ok(Box::new(FfmpegRecorder {
            child,
            stdin,
            rx,
            reader,
            stderr,
            stderr_task,
            received: 0,
        }))
    }

    fn stop_tracks(&mut self) {
        if self.live {
            debug!(device = %self.device.display(), "camera released");
        }
        self.live = false;
    }

    fn live_tracks(&self) -> usize {
        match (self.live, self.audio_source.is_some()) {
            (false, _) => 0,
            (true, true) => 2,
            (true, false) => 1,
        }
    }
}

/// Forwards ffmpeg output as one chunk per `timeslice`.
async fn read_chunks(
    mut stdout: tokio::process::ChildStdout,
    tx: mpsc::UnboundedSender<Bytes>,
    timeslice: Duration,
) {
    let mut ticker = tokio::time::interval(timeslice);
    let mut pending = BytesMut::new();
    let mut buf = vec![0u8; READ_BUFFER];

    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(e) => {
                    warn!(error = %e, "ffmpeg output read failed");
                    break;
                }
            },
            _ = ticker.tick() => {
                if !pending.is_empty() && tx.send(pending.split().freeze()).is_err() {
                    return;
                }
            }
        }
    }

    if !pending.is_empty() {
        let _ = tx.send(pending.freeze());
    }
}

/// Keeps everything ffmpeg writes to stderr for error classification.
async fn collect_stderr(mut pipe: ChildStderr, sink: Arc<Mutex<String>>) {
    let mut buf = vec![0u8; 4096];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => lock_text(&sink).push_str(&String::from_utf8_lossy(&buf[..n])),
            Err(e) => {
                debug!(error = %e, "ffmpeg stderr read failed");
                break;
            }
        }
    }
}

fn lock_text(text: &Mutex<String>) -> MutexGuard<'_, String> {
    text.lock().unwrap_or_else(PoisonError::into_inner)
}

struct FfmpegRecorder {
    child: Child,
    stdin: Option<ChildStdin>,
    rx: mpsc::UnboundedReceiver<Bytes>,
    reader: JoinHandle<()>,
    stderr: Arc<Mutex<String>>,
    stderr_task: JoinHandle<()>,
    /// Chunks handed out by `drain` so far.
    received: usize,
}

#[async_trait]
impl StreamRecorder for FfmpegRecorder {
    fn drain(&mut self) -> Vec<Bytes> {
        let mut chunks = Vec::new();
        while let Ok(chunk) = self.rx.try_recv() {
            if !chunk.is_empty() {
                chunks.push(chunk);
            }
        }
        self.received += chunks.len();
        chunks
    }

    fn check(&mut self) -> Result<(), CaptureError> {
        let status = match self.child.try_wait() {
            Ok(Some(status)) => status,
            Ok(None) => return Ok(()),
            Err(e) => return Err(CaptureError::Other(e.to_string())),
        };
        // Report only once every byte of output and stderr has been collected.
        if !self.reader.is_finished() || !self.stderr_task.is_finished() || !self.rx.is_empty() {
            return Ok(());
        }
        Err(unexpected_exit(status, &lock_text(&self.stderr)))
    }

    async fn stop(mut self: Box<Self>) -> Result<Vec<Bytes>, CaptureError> {
        // `q` on stdin makes ffmpeg finalize the webm before exiting.
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.write_all(b"q").await;
        }

        let status = match tokio::time::timeout(STOP_GRACE, self.child.wait()).await {
            Ok(status) => status.map_err(|e| CaptureError::Other(e.to_string()))?,
            Err(_) => {
                warn!("ffmpeg did not exit in time, killing it");
                let _ = self.child.kill().await;
                self.child
                    .wait()
                    .await
                    .map_err(|e| CaptureError::Other(e.to_string()))?
            }
        };

        let _ = (&mut self.reader).await;
        let mut chunks = self.drain();
        while let Some(chunk) = self.rx.recv().await {
            chunks.push(chunk);
        }

        if !status.success() && self.received == 0 && chunks.is_empty() {
            let _ = (&mut self.stderr_task).await;
            return Err(classify_ffmpeg_error(&lock_text(&self.stderr)));
        }

        debug!(chunks = chunks.len(), %status, "ffmpeg recorder stopped");
        Ok(chunks)
    }
}

/// Opens a published preview with the desktop's default player.
pub async fn open_in_player(path: &Path) -> std::io::Result<()> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    Command::new(opener)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}
