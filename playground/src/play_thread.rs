// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Top-level `GStreamer` pipeline the current [`SmartBin`] plays in.

use anyhow::{Context, Result};
use gst::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::{debug, PlayThread, PlaybackState, SmartBin};

/// Wraps a `gst::Pipeline` and forwards state changes reported on its bus to the
/// [`SmartBin`] they belong to.
#[derive(Debug)]
pub struct GstPlayThread {
    pipeline: gst::Pipeline,
    /// Bins currently inside the pipeline.
    members: Arc<Mutex<Vec<SmartBin>>>,
}

impl GstPlayThread {
    /// Create an empty play thread.
    ///
    /// # Errors
    ///
    /// This can fail if the bus of the new pipeline cannot be watched.
    pub fn create(name: &str) -> Result<Self> {
        trace!("create( '{name}' )");

        let play_thread = Self {
            pipeline: gst::Pipeline::new(Some(name)),
            members: Arc::new(Mutex::new(Vec::new())),
        };
        play_thread.read_bus()?;

        Ok(play_thread)
    }

    fn read_bus(&self) -> Result<()> {
        let bus = self
            .pipeline
            .bus()
            .context("failed to get bus of play thread")?;

        let pipeline_weak = self.pipeline.downgrade();
        let members = Arc::clone(&self.members);
        bus.add_watch(move |_, msg| {
            use gst::MessageView;
            match (msg.view(), &pipeline_weak.upgrade()) {
                (MessageView::StateChanged(changed), _) => {
                    if let Some(src) = msg.src() {
                        forward_state_changed(&members, src, changed.old(), changed.current());
                    }
                }
                (MessageView::Error(err), Some(pipeline)) => {
                    let source = err.src().map(GstObjectExt::path_string);
                    error!("Play thread error from {source:?}: {}", err.error());
                    if let Some(details) = err.debug() {
                        debug!("Error details: {details}");
                    }
                    debug::dot(pipeline, "play-thread-error");
                }
                (MessageView::Warning(warn), Some(pipeline)) => {
                    let source = warn.src().map(GstObjectExt::path_string);
                    warn!("Play thread warning from {source:?}: {}", warn.error());
                    debug::debug_dot(pipeline, "play-thread-warning");
                }
                (MessageView::Eos(_), _) => {
                    info!("End of stream in play thread");
                }
                _ => (),
            }
            glib::Continue(true)
        })?;

        Ok(())
    }
}

/// Hand a state change of one of the `members` to its callbacks.
fn forward_state_changed(
    members: &Mutex<Vec<SmartBin>>,
    src: &gst::Object,
    old: gst::State,
    current: gst::State,
) {
    let member = members
        .lock()
        .iter()
        .find(|member| member.bin().upcast_ref::<gst::Object>() == src)
        .cloned();
    let Some(member) = member else {
        return;
    };

    match (PlaybackState::try_from(old), PlaybackState::try_from(current)) {
        (Ok(previous), Ok(new)) => member.notify_state_changed(previous, new),
        _ => trace!("ignoring state change {old:?} -> {current:?} of {}", debug::name(src)),
    }
}

impl PlayThread for GstPlayThread {
    type Pipeline = SmartBin;

    fn add(&self, pipeline: &SmartBin) -> Result<()> {
        trace!("add( {} )", debug::name(pipeline.bin()));

        self.pipeline
            .add(pipeline.bin())
            .with_context(|| format!("unable to add '{}' to play thread", pipeline.bin().name()))?;
        self.members.lock().push(pipeline.clone());
        debug::debug_dot(&self.pipeline, "play-thread-add");

        Ok(())
    }

    fn remove(&self, pipeline: &SmartBin) -> Result<()> {
        trace!("remove( {} )", debug::name(pipeline.bin()));

        self.members.lock().retain(|member| member != pipeline);
        self.pipeline.remove(pipeline.bin()).with_context(|| {
            format!(
                "unable to remove '{}' from play thread",
                pipeline.bin().name()
            )
        })
    }

    fn set_state(&self, state: PlaybackState) -> Result<()> {
        trace!("set_state( {state} )");

        self.pipeline
            .set_state(state.into())
            .with_context(|| format!("unable to set play thread to {state}"))?;
        Ok(())
    }
}

impl Drop for GstPlayThread {
    fn drop(&mut self) {
        debug!("Dropping play thread...");
        if let Err(err) = self.pipeline.set_state(gst::State::Null) {
            error!("Unable to stop play thread: {err}");
        }
        if let Some(bus) = self.pipeline.bus() {
            if let Err(err) = bus.remove_watch() {
                warn!("Unable to remove bus watch of play thread: {err}");
            }
        }
    }
}
