//! Running ffmpeg with output captured to the run log.

use std::process::Command;

use crate::logging::RunLogger;

use super::types::{RenderError, RenderResult, RenderStage};

/// Runs ffmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    ffmpeg: String,
    show_pretty: bool,
}

impl FfmpegRunner {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            show_pretty: false,
        }
    }

    /// Also log arguments one per line.
    pub fn with_pretty_args(mut self, enabled: bool) -> Self {
        self.show_pretty = enabled;
        self
    }

    /// Run ffmpeg with `args`.
    ///
    /// Every stdout/stderr line goes to the run log. On a non-zero exit the
    /// log tail is shown and a `RenderFailure` carrying `stage` and `index`
    /// is returned.
    pub fn run(
        &self,
        logger: &RunLogger,
        stage: RenderStage,
        index: Option<usize>,
        args: &[String],
    ) -> RenderResult<()> {
        logger.command(&format!("{} {}", self.ffmpeg, args.join(" ")));
        if self.show_pretty {
            logger.log_args_pretty(&self.ffmpeg, args);
        }
        tracing::debug!("Running FFmpeg ({}): {:?}", stage, args);

        let result = Command::new(&self.ffmpeg)
            .args(args)
            .output()
            .map_err(|e| RenderError::io(format!("executing {}", self.ffmpeg), e))?;

        if !result.stdout.is_empty() {
            let stdout = String::from_utf8_lossy(&result.stdout);
            for line in stdout.lines() {
                logger.output_line(line, false);
            }
        }
        if !result.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            for line in stderr.lines() {
                logger.output_line(line, true);
            }
        }

        if !result.status.success() {
            let exit_code = result.status.code().unwrap_or(-1);
            logger.show_tail("ffmpeg output");
            return Err(RenderError::failure(
                stage,
                index,
                exit_code,
                last_lines(&String::from_utf8_lossy(&result.stderr), 5),
            ));
        }

        logger.clear_tail();
        Ok(())
    }
}

/// Last `n` non-empty lines, joined.
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::RunLoggerBuilder;
    use tempfile::tempdir;

    #[test]
    fn last_lines_keeps_tail() {
        let text = "a\n\nb\nc\nd\n";
        assert_eq!(last_lines(text, 2), "c\nd");
        assert_eq!(last_lines("", 3), "");
    }

    #[test]
    fn missing_binary_is_io_error() {
        let dir = tempdir().unwrap();
        let logger = RunLoggerBuilder::new("render", dir.path()).build().unwrap();
        let runner = FfmpegRunner::new("/nonexistent/ffmpeg");
        let err = runner
            .run(&logger, RenderStage::Trim, Some(0), &["-version".to_string()])
            .unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_reports_stage_and_index() {
        let dir = tempdir().unwrap();
        let logger = RunLoggerBuilder::new("render", dir.path()).build().unwrap();
        let runner = FfmpegRunner::new("sh");
        let args = vec!["-c".to_string(), "echo boom >&2; exit 3".to_string()];
        let err = runner
            .run(&logger, RenderStage::Join, Some(2), &args)
            .unwrap_err();
        match err {
            RenderError::RenderFailure {
                stage,
                index,
                exit_code,
                message,
            } => {
                assert_eq!(stage, RenderStage::Join);
                assert_eq!(index, Some(2));
                assert_eq!(exit_code, 3);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
