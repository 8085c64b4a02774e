//! Still-image capture through an external camera tool
//!
//! Shells out to `rpicam-still` (falling back to `libcamera-still` on
//! older OS images), writing a JPEG to a temp file and reading it back.
//! A missing binary moves on to the next candidate; a hung capture is
//! killed after the configured timeout.

use std::process::Stdio;
use std::time::Duration;

use crate::config::CameraConfig;
use crate::{Error, Result};

/// Camera capture handle
pub struct Camera {
    config: CameraConfig,
}

impl Camera {
    #[must_use]
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    /// Capture one still image, returned as JPEG bytes
    ///
    /// # Errors
    ///
    /// Returns error when no capture command is installed, the capture
    /// times out, or the tool exits non-zero
    pub async fn capture(&self) -> Result<Vec<u8>> {
        let file = tempfile::Builder::new()
            .suffix(".jpg")
            .tempfile()
            .map_err(|e| Error::Camera(format!("temp file: {e}")))?;
        let path = file.path().to_path_buf();

        let mut missing = Vec::new();
        for command in &self.config.commands {
            let mut child = match tokio::process::Command::new(command)
                .arg("-o")
                .arg(&path)
                .args(["--width", &self.config.width.to_string()])
                .args(["--height", &self.config.height.to_string()])
                .args(["-n", "-t", "1000"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
            {
                Ok(child) => child,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    missing.push(command.as_str());
                    continue;
                }
                Err(e) => return Err(Error::Camera(format!("{command}: {e}"))),
            };

            let timeout = Duration::from_secs(self.config.timeout_secs);
            let status = match tokio::time::timeout(timeout, child.wait()).await {
                Ok(status) => status.map_err(|e| Error::Camera(format!("{command}: {e}")))?,
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(Error::Camera(format!(
                        "{command} timed out after {}s",
                        self.config.timeout_secs
                    )));
                }
            };

            if !status.success() {
                return Err(Error::Camera(format!("{command} exited with {status}")));
            }

            let bytes = std::fs::read(&path)?;
            tracing::debug!(command, bytes = bytes.len(), "photo captured");
            return Ok(bytes);
        }

        Err(Error::Camera(format!(
            "no capture command found (tried {})",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_commands_report_what_was_tried() {
        let camera = Camera::new(CameraConfig {
            commands: vec!["definitely-not-a-camera-tool".to_string()],
            timeout_secs: 1,
            width: 640,
            height: 480,
        });

        let err = camera.capture().await.unwrap_err();
        assert!(err.to_string().contains("definitely-not-a-camera-tool"));
    }
}
