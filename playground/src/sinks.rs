// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Shared output sinks.

use anyhow::{Context, Result};
use gst::prelude::*;
use serde::Deserialize;
use std::sync::Arc;

use crate::{debug, OutputSink, PlaybackState, SinkKind};

/// Elements which finally render a sink's input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkBackend {
    /// Screen and sound card of the system.
    #[default]
    System,
    /// Discards everything, for headless use.
    Fake,
}

#[derive(Debug)]
struct SinkInner {
    kind: SinkKind,
    bin: gst::Bin,
}

impl Drop for SinkInner {
    fn drop(&mut self) {
        debug!("Dropping {} sink...", self.kind);
        if let Err(error) = self.bin.set_state(gst::State::Null) {
            error!("Unable to set the {} sink to `Null`, error: {error}", self.kind);
        }
    }
}

/// Audio or video sink bin which can be lent to one pipeline at a time.
///
/// Clones refer to the same bin.
#[derive(Debug, Clone)]
pub struct SinkThread {
    inner: Arc<SinkInner>,
}

impl PartialEq for SinkThread {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl SinkThread {
    /// Create a new sink bin with a ghost `sink` pad.
    ///
    /// # Errors
    ///
    /// This can fail if the elements of the chosen backend are not available in `GStreamer`.
    pub fn create(kind: SinkKind, backend: SinkBackend) -> Result<Self> {
        trace!("create( {kind}, {backend:?} )");

        let description = match (kind, backend) {
            (SinkKind::Video, SinkBackend::System) => {
                r#"
                    queue
                        name=input
                    ! videoconvert
                    ! videoscale
                    ! autovideosink
                        name=output
                "#
            }
            (SinkKind::Video, SinkBackend::Fake) => {
                r#"
                    queue
                        name=input
                    ! fakevideosink
                        name=output
                "#
            }
            (SinkKind::Audio, SinkBackend::System) => {
                r#"
                    queue
                        name=input
                    ! audioconvert
                    ! audioresample
                    ! autoaudiosink
                        name=output
                "#
            }
            (SinkKind::Audio, SinkBackend::Fake) => {
                r#"
                    queue
                        name=input
                    ! fakeaudiosink
                        name=output
                "#
            }
        };

        let bin = gst::parse_bin_from_description(description, false)
            .with_context(|| format!("could not parse {kind} sink bin"))?;
        bin.set_property("name", format!("{kind}-sink"));

        add_ghost_pad(&bin, "input", "sink")
            .with_context(|| format!("unable to add GhostPad to {kind} sink"))?;

        Ok(Self {
            inner: Arc::new(SinkInner { kind, bin }),
        })
    }

    #[must_use]
    pub fn bin(&self) -> &gst::Bin {
        &self.inner.bin
    }
}

impl OutputSink for SinkThread {
    fn set_state(&self, state: PlaybackState) -> Result<()> {
        trace!("set_state( {}, {state} )", debug::name(self.bin()));

        self.bin()
            .set_state(state.into())
            .with_context(|| format!("unable to set {} sink to {state}", self.inner.kind))?;
        Ok(())
    }

    fn seek(&self, position: gst::ClockTime) -> Result<()> {
        trace!("seek( {}, {position} )", debug::name(self.bin()));

        self.bin()
            .seek_simple(gst::SeekFlags::FLUSH, position)
            .with_context(|| format!("unable to seek {} sink to {position}", self.inner.kind))
    }
}

/// Adds a `GhostPad` named like `pad` to the given `Bin`, targeting `pad` of element `name`.
///
/// # Errors
///
/// There are three reasons why this could fail:
/// - The element name cannot be found in the bin.
/// - The pad cannot be found in the element.
/// - The `GhostPad` cannot be added to the bin.
pub(crate) fn add_ghost_pad(bin: &gst::Bin, name: &str, pad: &str) -> Result<gst::GhostPad> {
    trace!("add_ghost_pad( {}, {name}, {pad} )", debug::name(bin));

    let target = bin
        .by_name(name)
        .with_context(|| format!("unable to find element '{name}'"))?
        .static_pad(pad)
        .with_context(|| format!("unable to find pad '{pad}' for element '{name}'"))?;
    let ghost_pad = gst::GhostPad::with_target(Some(pad), &target)
        .context("failed to create ghost pad for pad")?;
    bin.add_pad(&ghost_pad)
        .context("unable to add GhostPad to bin")?;

    Ok(ghost_pad)
}
