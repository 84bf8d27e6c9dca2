// printflow/src/document/grayscale.rs

//! Grayscale rendering through external tools, run as bounded subprocesses.

use crate::error::FlowError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// External converters and how long each may run.
#[derive(Debug, Clone)]
pub struct ConversionTools {
  pub ghostscript: PathBuf,
  pub imagemagick: PathBuf,
  pub pdf_timeout: Duration,
  pub image_timeout: Duration,
}

impl Default for ConversionTools {
  fn default() -> Self {
    Self {
      ghostscript: PathBuf::from("gs"),
      imagemagick: PathBuf::from("convert"),
      pdf_timeout: Duration::from_secs(60),
      image_timeout: Duration::from_secs(30),
    }
  }
}

impl ConversionTools {
  pub fn pdf_command(&self, input: &Path, output: &Path) -> Command {
    let mut cmd = Command::new(&self.ghostscript);
    cmd
      .arg("-q")
      .arg("-sDEVICE=pdfwrite")
      .arg("-dColorConversionStrategy=/Gray")
      .arg("-dProcessColorModel=/DeviceGray")
      .arg("-o")
      .arg(output)
      .arg(input);
    cmd
  }

  pub fn image_command(&self, input: &Path, output: &Path) -> Command {
    let mut cmd = Command::new(&self.imagemagick);
    cmd.arg(input).arg("-colorspace").arg("Gray").arg(output);
    cmd
  }
}

/// Bytes kept from each output stream of a tool. The rest is read and dropped.
pub const OUTPUT_CAPTURE_LIMIT: u64 = 64 * 1024;
const LOGGED_OUTPUT_CHARS: usize = 2048;

#[derive(Debug, Default)]
struct CapturedOutput {
  text: String,
  discarded: u64,
}

fn drain<R>(reader: Option<R>) -> JoinHandle<CapturedOutput>
where
  R: AsyncRead + Unpin + Send + 'static,
{
  tokio::spawn(async move {
    let mut buf = Vec::new();
    let mut discarded = 0;
    if let Some(mut reader) = reader {
      if let Err(e) = (&mut reader).take(OUTPUT_CAPTURE_LIMIT).read_to_end(&mut buf).await {
        debug!(error = %e, "Subprocess output reader stopped early.");
      }
      match tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
        Ok(n) => discarded = n,
        Err(e) => debug!(error = %e, "Subprocess output reader stopped early."),
      }
    }
    CapturedOutput {
      text: String::from_utf8_lossy(&buf).into_owned(),
      discarded,
    }
  })
}

/// At most `max` characters of `text`, marked when cut.
fn clip(text: &str, max: usize) -> String {
  match text.char_indices().nth(max) {
    Some((idx, _)) => format!("{}... [truncated]", &text[..idx]),
    None => text.to_string(),
  }
}

/// Runs `cmd` to completion within `limit`.
///
/// stdout and stderr are each drained by their own task so a chatty tool
/// cannot stall on a full pipe. On timeout the child is killed. A nonzero
/// exit, a spawn failure, or a timeout is a `FlowError::Conversion`.
pub async fn run_bounded(mut cmd: Command, label: &str, limit: Duration) -> Result<(), FlowError> {
  cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

  let mut child = cmd
    .spawn()
    .map_err(|e| FlowError::Conversion(format!("{}: failed to start: {}", label, e)))?;
  let stdout = drain(child.stdout.take());
  let stderr = drain(child.stderr.take());

  let status = match tokio::time::timeout(limit, child.wait()).await {
    Ok(Ok(status)) => status,
    Ok(Err(e)) => return Err(FlowError::Conversion(format!("{}: wait failed: {}", label, e))),
    Err(_) => {
      if let Err(e) = child.kill().await {
        warn!(tool = label, error = %e, "Failed to kill timed out subprocess.");
      }
      return Err(FlowError::Conversion(format!("{}: timed out after {:?}", label, limit)));
    }
  };

  let stdout = stdout.await.unwrap_or_default();
  let stderr = stderr.await.unwrap_or_default();
  if !stdout.text.trim().is_empty() {
    debug!(
      tool = label,
      output = %clip(stdout.text.trim(), LOGGED_OUTPUT_CHARS),
      discarded_bytes = stdout.discarded,
      "Subprocess stdout."
    );
  }

  if status.success() {
    Ok(())
  } else {
    Err(FlowError::Conversion(format!(
      "{}: exited with {}: {}",
      label,
      status,
      clip(stderr.text.trim(), LOGGED_OUTPUT_CHARS)
    )))
  }
}
