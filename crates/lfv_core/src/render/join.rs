//! Joining trimmed clips into one base video.
//!
//! Strategies are tried in order. The first builds the full transition
//! graph with `xfade`; the fallback joins with hard cuts through the concat
//! demuxer, cutting each clip where its transition would have started so
//! the joined length matches the timeline either way.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::RenderSettings;
use crate::logging::RunLogger;

use super::commands::RenderCommandBuilder;
use super::runner::FfmpegRunner;
use super::types::{EditDecisionList, RenderError, RenderResult, RenderStage};

/// Shared inputs for a join attempt.
pub struct JoinRequest<'a> {
    pub edl: &'a EditDecisionList,
    pub settings: &'a RenderSettings,
    pub runner: &'a FfmpegRunner,
    pub logger: &'a RunLogger,
    /// Trimmed clips in timeline order.
    pub inputs: &'a [PathBuf],
    pub work_dir: &'a Path,
}

/// One way to join clips.
pub trait JoinStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Join the inputs and return the joined file.
    fn join(&self, request: &JoinRequest<'_>) -> RenderResult<PathBuf>;
}

/// Transition graph with `xfade` (and `concat` at cut boundaries).
#[derive(Debug, Clone, Copy, Default)]
pub struct XfadeJoin;

impl JoinStrategy for XfadeJoin {
    fn name(&self) -> &str {
        "xfade"
    }

    fn join(&self, request: &JoinRequest<'_>) -> RenderResult<PathBuf> {
        let output = request.work_dir.join("joined_xfade.mp4");
        let args = RenderCommandBuilder::new(request.edl, request.settings)
            .xfade_join(request.inputs, &output);
        request
            .runner
            .run(request.logger, RenderStage::Join, None, &args)?;
        Ok(output)
    }
}

/// Hard cuts through the concat demuxer, re-encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatDemuxerJoin;

impl JoinStrategy for ConcatDemuxerJoin {
    fn name(&self) -> &str {
        "concat"
    }

    fn join(&self, request: &JoinRequest<'_>) -> RenderResult<PathBuf> {
        let builder = RenderCommandBuilder::new(request.edl, request.settings);
        let list_file = request.work_dir.join("concat_list.txt");
        fs::write(&list_file, builder.concat_list(request.inputs))
            .map_err(|e| RenderError::io("writing concat list", e))?;

        let output = request.work_dir.join("joined_concat.mp4");
        let args = builder.concat_join(&list_file, &output);
        request
            .runner
            .run(request.logger, RenderStage::Join, None, &args)?;
        Ok(output)
    }
}

/// Default order: transitions first, hard cuts second.
pub fn default_join_chain() -> Vec<Box<dyn JoinStrategy>> {
    vec![Box::new(XfadeJoin), Box::new(ConcatDemuxerJoin)]
}

/// Try each strategy until one succeeds.
///
/// Returns the joined file and the name of the strategy that made it.
pub fn join_with_fallback(
    chain: &[Box<dyn JoinStrategy>],
    request: &JoinRequest<'_>,
) -> RenderResult<(PathBuf, String)> {
    let mut failures = Vec::new();

    for strategy in chain {
        match strategy.join(request) {
            Ok(path) => {
                if !failures.is_empty() {
                    request.logger.warn(&format!(
                        "Joined with '{}' after {} failed attempt(s)",
                        strategy.name(),
                        failures.len()
                    ));
                }
                return Ok((path, strategy.name().to_string()));
            }
            Err(e) => {
                request
                    .logger
                    .warn(&format!("Join strategy '{}' failed: {}", strategy.name(), e));
                failures.push(format!("{}: {}", strategy.name(), e));
            }
        }
    }

    Err(RenderError::JoinExhausted(failures.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::RunLoggerBuilder;
    use crate::render::edl::tests::sample_edl;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct Scripted {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, fail: bool) -> Self {
            Self {
                name,
                fail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl JoinStrategy for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn join(&self, request: &JoinRequest<'_>) -> RenderResult<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(RenderError::failure(RenderStage::Join, None, 1, "scripted"))
            } else {
                Ok(request.work_dir.join(format!("{}.mp4", self.name)))
            }
        }
    }

    fn with_request<F: FnOnce(&JoinRequest<'_>)>(f: F) {
        let dir = tempdir().unwrap();
        let logger = RunLoggerBuilder::new("join", dir.path()).build().unwrap();
        let edl = sample_edl();
        let settings = RenderSettings::default();
        let runner = FfmpegRunner::new("ffmpeg");
        let inputs = vec![PathBuf::from("a.mp4")];
        let request = JoinRequest {
            edl: &edl,
            settings: &settings,
            runner: &runner,
            logger: &logger,
            inputs: &inputs,
            work_dir: dir.path(),
        };
        f(&request);
    }

    #[test]
    fn falls_back_to_next_strategy() {
        with_request(|request| {
            let chain: Vec<Box<dyn JoinStrategy>> = vec![
                Box::new(Scripted::new("first", true)),
                Box::new(Scripted::new("second", false)),
            ];
            let (path, name) = join_with_fallback(&chain, request).unwrap();
            assert_eq!(name, "second");
            assert!(path.ends_with("second.mp4"));
            assert_eq!(request.logger.warnings().len(), 2);
        });
    }

    #[test]
    fn first_success_stops_chain() {
        with_request(|request| {
            let second = Scripted::new("second", false);
            let chain: Vec<Box<dyn JoinStrategy>> =
                vec![Box::new(Scripted::new("first", false)), Box::new(second)];
            let (_, name) = join_with_fallback(&chain, request).unwrap();
            assert_eq!(name, "first");
        });
    }

    #[test]
    fn all_failures_are_reported() {
        with_request(|request| {
            let chain: Vec<Box<dyn JoinStrategy>> = vec![
                Box::new(Scripted::new("first", true)),
                Box::new(Scripted::new("second", true)),
            ];
            let err = join_with_fallback(&chain, request).unwrap_err();
            match err {
                RenderError::JoinExhausted(msg) => {
                    assert!(msg.contains("first"));
                    assert!(msg.contains("second"));
                }
                other => panic!("unexpected error: {other}"),
            }
        });
    }

    #[test]
    fn default_chain_order() {
        let names: Vec<_> = default_join_chain()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["xfade", "concat"]);
    }
}
