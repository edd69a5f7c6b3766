// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use thiserror::Error;

use crate::SinkKind;

/// Conditions the arbiter reports to callers.
///
/// Everything else the arbiter cannot do is logged and ignored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArbiterError {
    /// Transport control without any content being current.
    #[error("there is no current pipeline with content")]
    NoCurrentPipeline,

    /// At least one shared sink rejected a seek.
    #[error("seeking to {position} failed on the {} sink(s)", display_kinds(.sinks))]
    SeekFailed {
        position: gst::ClockTime,
        sinks: Vec<SinkKind>,
    },
}

fn display_kinds(kinds: &[SinkKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" and ")
}
