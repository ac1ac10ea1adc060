//! Error types used by the pipevisor runtime and plugins.
//!
//! This module defines the status value that flows through every lifecycle call plus
//! two typed error enums:
//!
//! - [`Outcome`]: success-or-failure value that accumulates human-readable failure text.
//! - [`NetworkError`]: topology and push failures raised by the data network.
//! - [`PipelineError`]: errors raised by the lifecycle manager itself.
//!
//! The enums provide helper methods (`as_label`) for logging/metrics, in the same way
//! [`Outcome`] provides [`Outcome::message`] for humans.

use std::fmt;

use thiserror::Error;

use crate::types::TypeTag;

/// # Accumulating success/failure value.
///
/// Starts out as a success. Every call to [`Outcome::fail`] turns it into a failure and
/// appends one line of text; nothing ever turns a failure back into a success.
///
/// Cloning deep-copies the accumulated text, so outcomes can be passed by value through
/// nested plugin calls without aliasing.
///
/// # Example
/// ```
/// use pipevisor::Outcome;
///
/// let mut out = Outcome::success();
/// out.context("ignored while successful");
/// assert!(out.is_success());
///
/// out.fail("dependency missing");
/// out.context("plugin reporter failed to initialize");
/// assert!(out.is_failure());
/// assert_eq!(out.lines().count(), 2);
/// ```
#[must_use]
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    failures: Option<Vec<String>>,
}

impl Outcome {
    /// Returns a successful outcome.
    #[inline]
    pub fn success() -> Self {
        Self { failures: None }
    }

    /// Returns a failed outcome carrying `text`.
    pub fn failure(text: impl Into<String>) -> Self {
        let mut out = Self::success();
        out.fail(text);
        out
    }

    /// Marks this outcome as failed and appends `text`.
    pub fn fail(&mut self, text: impl Into<String>) -> &mut Self {
        self.failures.get_or_insert_with(Vec::new).push(text.into());
        self
    }

    /// Appends `text` only if this outcome has already failed.
    ///
    /// Used by callers to add their own context on the way up.
    pub fn context(&mut self, text: impl Into<String>) -> &mut Self {
        if let Some(lines) = self.failures.as_mut() {
            lines.push(text.into());
        }
        self
    }

    /// Owned variant of [`Outcome::context`].
    pub fn with_context(mut self, text: impl Into<String>) -> Self {
        self.context(text);
        self
    }

    /// Merges `other` into `self`. A failure in either side makes `self` a failure and
    /// the text of `other` is appended after the text already held.
    pub fn merge(&mut self, other: Outcome) -> &mut Self {
        if let Some(lines) = other.failures {
            self.failures.get_or_insert_with(Vec::new).extend(lines);
        }
        self
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.failures.is_none()
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        self.failures.is_some()
    }

    /// Iterates over the accumulated failure lines (empty on success).
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().flatten().map(String::as_str)
    }

    /// Returns all failure lines joined by newlines; empty string on success.
    pub fn message(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }

    /// Converts into a `Result`, wrapping failures into [`PipelineError::Failed`].
    pub fn into_result(self) -> Result<(), PipelineError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(PipelineError::Failed(self))
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failures {
            None => f.write_str("Outcome::Success"),
            Some(lines) => f.debug_tuple("Outcome::Failure").field(lines).finish(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failures {
            None => f.write_str("success"),
            Some(lines) => f.write_str(&lines.join("; ")),
        }
    }
}

impl From<NetworkError> for Outcome {
    fn from(err: NetworkError) -> Self {
        Outcome::failure(err.to_string())
    }
}

impl From<PipelineError> for Outcome {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Failed(out) => out,
            other => Outcome::failure(other.to_string()),
        }
    }
}

impl<E: fmt::Display> From<Result<(), E>> for Outcome {
    fn from(res: Result<(), E>) -> Self {
        match res {
            Ok(()) => Outcome::success(),
            Err(e) => Outcome::failure(e.to_string()),
        }
    }
}

/// # Errors produced by the data network.
///
/// These are local and recoverable: the network is left exactly as it was.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// A node was added after [`DataNetwork::finalize`](crate::DataNetwork::finalize).
    #[error("attempted to add {role} node when network is already finalized")]
    Finalized {
        /// `"source"`, `"sink"` or `"multi-source"`.
        role: &'static str,
    },

    /// A push targeted a payload type that has no channel in this network.
    #[error("no network channel exists for payload type {type_name} (tag {tag})")]
    MissingChannel {
        tag: TypeTag,
        type_name: &'static str,
    },

    /// The channel refused the value (network canceled or shutting down).
    #[error("channel for payload type {type_name} (tag {tag}) rejected push attempt")]
    Rejected {
        tag: TypeTag,
        type_name: &'static str,
    },
}

impl NetworkError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use pipevisor::NetworkError;
    ///
    /// let err = NetworkError::Finalized { role: "sink" };
    /// assert_eq!(err.as_label(), "network_finalized");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            NetworkError::Finalized { .. } => "network_finalized",
            NetworkError::MissingChannel { .. } => "network_missing_channel",
            NetworkError::Rejected { .. } => "network_push_rejected",
        }
    }
}

/// # Errors produced by the pipeline lifecycle manager.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// `start()` was called without any plugin.
    #[error("could not start pipeline because no plugins were specified")]
    NoPlugins,

    /// `start()` was called while the pipeline is running.
    #[error("pipeline could not be started because it is already running")]
    AlreadyRunning,

    /// A lifecycle phase failed; carries the accumulated failure text.
    #[error("{0}")]
    Failed(Outcome),
}

impl PipelineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PipelineError::NoPlugins => "pipeline_no_plugins",
            PipelineError::AlreadyRunning => "pipeline_already_running",
            PipelineError::Failed(_) => "pipeline_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_success() {
        let out = Outcome::default();
        assert!(out.is_success());
        assert!(!out.is_failure());
        assert_eq!(out.message(), "");
        assert_eq!(out.to_string(), "success");
    }

    #[test]
    fn test_failures_accumulate_and_never_revert() {
        let mut out = Outcome::success();
        out.fail("first");
        out.fail("second");
        out.merge(Outcome::success());
        assert!(out.is_failure());
        assert_eq!(out.lines().collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn test_context_only_applies_to_failures() {
        let ok = Outcome::success().with_context("plugin x failed");
        assert!(ok.is_success());

        let failed = Outcome::failure("boom").with_context("plugin x failed");
        assert_eq!(failed.message(), "boom\nplugin x failed");
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Outcome::failure("one");
        let mut copy = original.clone();
        copy.fail("two");
        assert_eq!(original.lines().count(), 1);
        assert_eq!(copy.lines().count(), 2);
    }

    #[test]
    fn test_merge_appends_other_text() {
        let mut out = Outcome::failure("a");
        out.merge(Outcome::failure("b"));
        assert_eq!(out.message(), "a\nb");

        let mut fresh = Outcome::success();
        fresh.merge(Outcome::failure("c"));
        assert!(fresh.is_failure());
    }

    #[test]
    fn test_conversions() {
        let out: Outcome = NetworkError::Finalized { role: "source" }.into();
        assert!(out.message().contains("finalized"));

        let out: Outcome = Result::<(), String>::Ok(()).into();
        assert!(out.is_success());

        let err = Outcome::failure("x").into_result().unwrap_err();
        assert_eq!(err.as_label(), "pipeline_failed");
        assert_eq!(Outcome::from(err).message(), "x");
    }
}
