// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Trial identity types.
//!
//! A [`TrialSpec`] fully identifies one benchmark execution. Its
//! [`TrialKey`] is the canonical string used to name the trial's result
//! record and raw log:
//!
//! ```text
//! <detection_model>_<classification_model>_<interval>_<streams>_<device>
//! ```
//!
//! The classification segment is empty when no classification model is
//! used. Identifiers are restricted to `[A-Za-z0-9.-]`, so the five
//! segments can always be recovered by splitting on `_` and two distinct
//! specs never share a key.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

fn validate_ident(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::configuration(format!("{kind} must not be empty")));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
    {
        return Err(Error::configuration(format!(
            "{kind} '{value}' contains invalid character '{bad}' (allowed: A-Z a-z 0-9 . -)"
        )));
    }
    Ok(())
}

/// Model identifier, e.g. `person-vehicle-bike-detection-2004`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId(String);

impl ModelId {
    /// Parse and validate a model identifier.
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_ident("model id", &id)?;
        Ok(Self(id))
    }

    /// Get the ID as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModelId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<ModelId> for String {
    fn from(id: ModelId) -> Self {
        id.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inference device tag passed to the workload, e.g. `CPU`, `GPU`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceTag(String);

impl DeviceTag {
    /// Parse and validate a device tag.
    pub fn parse(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        validate_ident("device tag", &tag)?;
        Ok(Self(tag))
    }

    /// Get the tag as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the workload needs GPU render nodes passed through.
    pub fn wants_gpu(&self) -> bool {
        self.0.to_ascii_uppercase().contains("GPU")
    }
}

impl TryFrom<String> for DeviceTag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<DeviceTag> for String {
    fn from(tag: DeviceTag) -> Self {
        tag.0
    }
}

impl fmt::Display for DeviceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serializes `None` as `""` and reads `""` back as `None`.
mod empty_as_none {
    use super::ModelId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<ModelId>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_ref().map(ModelId::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ModelId>, D::Error> {
        let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
        if raw.is_empty() {
            return Ok(None);
        }
        ModelId::parse(raw)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// One configured execution of the workload under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialSpec {
    /// Detection model.
    #[serde(rename = "model")]
    pub detection_model: ModelId,
    /// Classification model; `None` runs detection only.
    #[serde(with = "empty_as_none", default)]
    pub classification_model: Option<ModelId>,
    /// Run inference on every n-th frame.
    pub inference_interval: NonZeroU32,
    /// Number of concurrent workload instances.
    pub num_streams: NonZeroU32,
    /// Inference device.
    pub device: DeviceTag,
}

impl TrialSpec {
    /// Canonical identity used for result and log file names.
    pub fn key(&self) -> TrialKey {
        TrialKey(format!(
            "{}_{}_{}_{}_{}",
            self.detection_model,
            self.classification_model
                .as_ref()
                .map(ModelId::as_str)
                .unwrap_or(""),
            self.inference_interval,
            self.num_streams,
            self.device
        ))
    }

    /// Label of the classification stage, `none` when absent.
    pub fn classification_label(&self) -> &str {
        self.classification_model
            .as_ref()
            .map(ModelId::as_str)
            .unwrap_or("none")
    }

    /// Whether `model` takes part in this trial.
    pub fn uses_model(&self, model: &ModelId) -> bool {
        &self.detection_model == model || self.classification_model.as_ref() == Some(model)
    }
}

impl fmt::Display for TrialSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} + {} @ interval {} x{} on {}",
            self.detection_model,
            self.classification_label(),
            self.inference_interval,
            self.num_streams,
            self.device
        )
    }
}

/// Canonical trial key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrialKey(String);

impl TrialKey {
    /// Get the key as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the trial's JSON record.
    pub fn record_file_name(&self) -> String {
        format!("{}.json", self.0)
    }

    /// File name of the trial's raw log capture.
    pub fn log_file_name(&self) -> String {
        format!("{}.log", self.0)
    }

    /// Name for the isolation boundary (container name) of this trial.
    ///
    /// Segments are joined with `-` so a missing classification model leaves
    /// no empty `__` run. Case is kept: container names accept
    /// `[A-Za-z0-9_.-]`, and ids differing only in case are distinct trials.
    pub fn boundary_name(&self, run_id: &str) -> String {
        let segments: Vec<&str> = self.0.split('_').filter(|s| !s.is_empty()).collect();
        format!("streambench-{}-{}", run_id, segments.join("-"))
    }
}

impl fmt::Display for TrialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
