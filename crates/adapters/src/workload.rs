// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Launch script for one trial.
//!
//! A trial with `N` streams runs `N` copies of the pipeline inside one
//! boundary. The first `N - 1` copies are background load whose output is
//! discarded; the last copy is the instrumented instance. It runs in the
//! foreground so the script's exit status is the instrumented pipeline's.
//!
//! ```text
//! gst-launch-1.0 <pipeline> ! fakesink ... > /dev/null 2>&1 &
//! gst-launch-1.0 -v <pipeline> ! gvafpscounter ! fpsdisplaysink ...
//! ```

use crate::acquisition::ModelLayout;
use std::path::{Path, PathBuf};
use streambench_core::config::WorkloadConfig;
use streambench_core::TrialSpec;

/// Quote `value` for a POSIX shell when it contains anything unusual.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+=:,@%".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

fn quoted_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

/// Renders workload templates against the paths a sandbox exposes.
#[derive(Debug, Clone)]
pub struct Workload {
    templates: WorkloadConfig,
    models: ModelLayout,
    video: PathBuf,
}

impl Workload {
    /// Create a workload; `models` and `video` are as seen inside the sandbox.
    pub fn new(templates: WorkloadConfig, models: ModelLayout, video: impl Into<PathBuf>) -> Self {
        Self {
            templates,
            models,
            video: video.into(),
        }
    }

    /// Pipeline description for one instance ending in `sink`.
    pub fn pipeline(&self, spec: &TrialSpec, sink: &str) -> String {
        let classification = match &spec.classification_model {
            Some(model) => self
                .templates
                .classification_stage
                .replace("{classification_model}", &quoted_path(&self.models.xml(model))),
            None => String::new(),
        };

        self.templates
            .pipeline
            .replace("{classification}", &classification)
            .replace("{sink}", sink)
            .replace("{video}", &quoted_path(&self.video))
            .replace(
                "{detection_model}",
                &quoted_path(&self.models.xml(&spec.detection_model)),
            )
            .replace("{device}", spec.device.as_str())
            .replace("{interval}", &spec.inference_interval.to_string())
    }

    /// Shell script starting every instance of the trial.
    pub fn script(&self, spec: &TrialSpec) -> String {
        let launcher = self.templates.launcher.trim();
        let mut lines = Vec::new();

        let background = self.pipeline(spec, &self.templates.background_sink);
        for _ in 1..spec.num_streams.get() {
            lines.push(format!("{launcher} {background} > /dev/null 2>&1 &"));
        }

        let measured = self.pipeline(spec, &self.templates.measured_sink);
        let flags = self.templates.measured_flags.trim();
        if flags.is_empty() {
            lines.push(format!("{launcher} {measured}"));
        } else {
            lines.push(format!("{launcher} {flags} {measured}"));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;
    use streambench_core::{DeviceTag, ModelId};

    fn spec(cls: Option<&str>, streams: u32) -> TrialSpec {
        TrialSpec {
            detection_model: ModelId::parse("det").unwrap(),
            classification_model: cls.map(|c| ModelId::parse(c).unwrap()),
            inference_interval: NonZeroU32::new(3).unwrap(),
            num_streams: NonZeroU32::new(streams).unwrap(),
            device: DeviceTag::parse("CPU").unwrap(),
        }
    }

    fn workload() -> Workload {
        Workload::new(
            WorkloadConfig::default(),
            ModelLayout::new("/home/dlstreamer/models", "FP16"),
            "/home/dlstreamer/videos/sample.mp4",
        )
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/a/b.xml"), "/a/b.xml");
        assert_eq!(shell_quote("/my videos/a.mp4"), "'/my videos/a.mp4'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_pipeline_without_classification() {
        let pipeline = workload().pipeline(&spec(None, 1), "fakesink");
        assert!(pipeline.contains("location=/home/dlstreamer/videos/sample.mp4"));
        assert!(pipeline.contains("model=/home/dlstreamer/models/intel/det/FP16/det.xml"));
        assert!(pipeline.contains("inference-interval=3"));
        assert!(!pipeline.contains("gvaclassify"));
        assert!(pipeline.ends_with("queue ! fakesink"));
        assert!(!pipeline.contains('{'));
    }

    #[test]
    fn test_pipeline_with_classification() {
        let pipeline = workload().pipeline(&spec(Some("cls"), 1), "fakesink");
        assert!(pipeline.contains("gvaclassify model=/home/dlstreamer/models/intel/cls/FP16/cls.xml device=CPU"));
        assert!(!pipeline.contains('{'));
    }

    #[test]
    fn test_script_backgrounds_all_but_one_instance() {
        let script = workload().script(&spec(None, 4));
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines.len(), 4);
        for line in &lines[..3] {
            assert!(line.starts_with("gst-launch-1.0 filesrc"));
            assert!(line.ends_with("fakesink sync=false > /dev/null 2>&1 &"));
        }
        let last = lines[3];
        assert!(last.starts_with("gst-launch-1.0 -v filesrc"));
        assert!(last.contains("fpsdisplaysink"));
        assert!(!last.ends_with('&'));
        assert!(!script.contains("exec "));
    }

    #[test]
    fn test_single_stream_has_no_background() {
        let script = workload().script(&spec(None, 1));
        assert_eq!(script.lines().count(), 1);
        assert!(!script.contains("/dev/null"));
    }
}
