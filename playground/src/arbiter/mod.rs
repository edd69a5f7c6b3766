// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Arbitration of the shared sinks between pipelines.

use parking_lot::Mutex;
use std::{
    fmt::Display,
    sync::{Arc, Weak},
};

mod error;
mod events;

pub use error::*;
pub use events::*;

use crate::{
    MediaPipeline, OutputSink, PlayThread, PlaybackState, SignalHandlerId, SinkKind, SinkOf,
};

/// State shared with the state-change callback of the current pipeline.
#[derive(Debug)]
struct Shared<P> {
    /// Global transport state.
    state: Mutex<PlaybackState>,
    events: EventDispatcher<P>,
}

impl<P> Shared<P> {
    fn on_current_state_changed(&self, name: &str, previous: PlaybackState, new: PlaybackState) {
        debug!("'{name}' changed state from {previous} to {new}");

        if !matches!(new, PlaybackState::Paused | PlaybackState::Playing) {
            return;
        }
        *self.state.lock() = new;
        self.events.emit(&ArbiterEvent::CurrentState(new));
    }
}

/// Holds all pipelines of the application and lends them the shared sinks.
///
/// Only one pipeline (the *current* one) is connected to the audio and video sinks
/// at any given time and receives the transport commands. When nothing else is
/// selected the *default* pipeline is current.
///
/// # Types
///
/// - `T`: Play thread the current pipeline is put into. Its pipeline type is the
///   pipeline type of the arbiter.
///
#[derive(Debug)]
pub struct PipelineArbiter<T: PlayThread> {
    play_thread: T,
    /// Placeholder which is current if nothing else is.
    default: T::Pipeline,
    /// Registered pipelines in registration order.
    pipelines: Vec<T::Pipeline>,
    current: Option<T::Pipeline>,
    /// Pipeline which plays a one-off preview.
    transient: Option<T::Pipeline>,
    audio_sink: Option<SinkOf<T>>,
    video_sink: Option<SinkOf<T>>,
    /// State-change callback connected to the current pipeline.
    state_handler: Option<SignalHandlerId>,
    shared: Arc<Shared<T::Pipeline>>,
}

impl<T: PlayThread> PipelineArbiter<T> {
    /// Create a new arbiter with `default` as current pipeline.
    ///
    /// The transport state starts as `Ready` and turns `Paused` as soon as the
    /// default pipeline confirms its state.
    pub fn new(play_thread: T, default: T::Pipeline) -> Self {
        info!("Starting up playground");

        let mut arbiter = Self {
            play_thread,
            default,
            pipelines: Vec::new(),
            current: None,
            transient: None,
            audio_sink: None,
            video_sink: None,
            state_handler: None,
            shared: Arc::new(Shared {
                state: Mutex::new(PlaybackState::Ready),
                events: EventDispatcher::default(),
            }),
        };

        best_effort(
            arbiter.play_thread.set_state(PlaybackState::Ready),
            "set the play thread to ready",
        );
        arbiter.switch_to_default();

        arbiter
    }

    /// Add a pipeline to the registry.
    ///
    /// Already registered pipelines and the default pipeline are ignored.
    pub fn register(&mut self, pipeline: T::Pipeline) {
        trace!("register( '{}' )", pipeline.name());

        if pipeline == self.default {
            debug!("The default pipeline is always available, not registering it");
            return;
        }
        if self.pipelines.contains(&pipeline) {
            debug!("Pipeline '{}' is already registered", pipeline.name());
            return;
        }

        self.pipelines.push(pipeline.clone());
        self.shared.events.emit(&ArbiterEvent::PipelineAdded(pipeline));
    }

    /// Remove a pipeline from the registry.
    ///
    /// If the pipeline is current the arbiter switches to the default pipeline
    /// first. The removed pipeline is lowered to `Ready`.
    pub fn unregister(&mut self, pipeline: &T::Pipeline) {
        trace!("unregister( '{}' )", pipeline.name());

        if !self.pipelines.contains(pipeline) {
            debug!("Pipeline '{}' is not registered", pipeline.name());
            return;
        }

        if self.current.as_ref() == Some(pipeline) {
            self.switch_to_default();
        }

        // switching away from a transient pipeline already unregistered it
        let Some(index) = self.pipelines.iter().position(|p| p == pipeline) else {
            return;
        };

        best_effort(
            pipeline.set_state(PlaybackState::Ready),
            format_args!("set '{}' to ready", pipeline.name()),
        );
        let pipeline = self.pipelines.remove(index);
        if self.transient.as_ref() == Some(&pipeline) {
            self.transient = None;
        }

        self.shared
            .events
            .emit(&ArbiterEvent::PipelineRemoved(pipeline));
    }

    /// Make `pipeline` the current one and lend it the shared sinks.
    ///
    /// Only the default pipeline or a registered one can become current. Switching
    /// to the current pipeline does nothing. The new pipeline is left `Paused` and so
    /// is a transport which was playing.
    pub fn switch_to(&mut self, pipeline: &T::Pipeline) {
        trace!("switch_to( '{}' )", pipeline.name());

        if self.current.as_ref() == Some(pipeline) {
            debug!("Pipeline '{}' is already current", pipeline.name());
            return;
        }
        if *pipeline != self.default && !self.pipelines.contains(pipeline) {
            debug!(
                "Pipeline '{}' is not registered, not switching",
                pipeline.name()
            );
            return;
        }

        let superseded = self
            .current
            .take()
            .and_then(|outgoing| self.release(outgoing));

        best_effort(
            self.play_thread.add(pipeline),
            format_args!("add '{}' to the play thread", pipeline.name()),
        );
        best_effort(
            pipeline.set_state(PlaybackState::Paused),
            format_args!("pause '{}'", pipeline.name()),
        );

        for kind in [SinkKind::Video, SinkKind::Audio] {
            let Some(sink) = self.sink(kind) else {
                continue;
            };
            if !declares(pipeline, kind) {
                continue;
            }
            best_effort(
                sink.set_state(PlaybackState::Ready),
                format_args!("reset the {kind} sink"),
            );
            best_effort(
                attach(pipeline, kind, sink),
                format_args!("attach the {kind} sink to '{}'", pipeline.name()),
            );
        }

        self.current = Some(pipeline.clone());
        self.shared
            .events
            .emit(&ArbiterEvent::CurrentChanged(pipeline.clone()));

        let shared = Arc::downgrade(&self.shared);
        let name = pipeline.name();
        self.state_handler = Some(pipeline.connect_state_changed(Arc::new(
            move |previous: PlaybackState, new: PlaybackState| {
                if let Some(shared) = Weak::upgrade(&shared) {
                    shared.on_current_state_changed(&name, previous, new);
                }
            },
        )));

        // attaching sinks may have disturbed the state
        best_effort(
            pipeline.set_state(PlaybackState::Paused),
            format_args!("pause '{}'", pipeline.name()),
        );
        self.stop_playing();

        if let Some(superseded) = superseded {
            debug!("Releasing superseded transient pipeline '{}'", superseded.name());
            self.unregister(&superseded);
        }
    }

    /// Make the default pipeline the current one.
    pub fn switch_to_default(&mut self) {
        trace!("switch_to_default()");

        let default = self.default.clone();
        self.switch_to(&default);
    }

    /// Take the shared sinks away from `outgoing`.
    ///
    /// Returns `outgoing` if it was the transient pipeline, which then has to be
    /// released by the caller.
    fn release(&mut self, outgoing: T::Pipeline) -> Option<T::Pipeline> {
        debug!("Releasing '{}'", outgoing.name());

        best_effort(
            outgoing.set_state(PlaybackState::Paused),
            format_args!("pause '{}'", outgoing.name()),
        );
        for kind in [SinkKind::Video, SinkKind::Audio] {
            if let Some(sink) = self.sink(kind) {
                best_effort(
                    sink.set_state(PlaybackState::Ready),
                    format_args!("reset the {kind} sink"),
                );
            }
        }
        for kind in [SinkKind::Audio, SinkKind::Video] {
            best_effort(
                detach(&outgoing, kind),
                format_args!("remove the {kind} sink from '{}'", outgoing.name()),
            );
        }
        if let Some(id) = self.state_handler.take() {
            outgoing.disconnect(id);
        }
        best_effort(
            self.play_thread.remove(&outgoing),
            format_args!("remove '{}' from the play thread", outgoing.name()),
        );

        if self.transient.as_ref() == Some(&outgoing) {
            self.transient = None;
            return Some(outgoing);
        }
        None
    }

    /// Replace the shared audio sink.
    pub fn set_audio_sink(&mut self, sink: SinkOf<T>) {
        trace!("set_audio_sink( {sink:?} )");
        self.replace_sink(SinkKind::Audio, sink);
    }

    /// Replace the shared video sink.
    pub fn set_video_sink(&mut self, sink: SinkOf<T>) {
        trace!("set_video_sink( {sink:?} )");
        self.replace_sink(SinkKind::Video, sink);
    }

    fn replace_sink(&mut self, kind: SinkKind, sink: SinkOf<T>) {
        if let (Some(_), Some(current)) = (self.sink(kind), &self.current) {
            best_effort(
                current.set_state(PlaybackState::Paused),
                format_args!("pause '{}'", current.name()),
            );
            best_effort(
                detach(current, kind),
                format_args!("remove the {kind} sink from '{}'", current.name()),
            );
        }

        match kind {
            SinkKind::Audio => self.audio_sink = Some(sink),
            SinkKind::Video => self.video_sink = Some(sink),
        }

        let (Some(current), Some(sink)) = (&self.current, self.sink(kind)) else {
            return;
        };
        if declares(current, kind) {
            best_effort(
                attach(current, kind, sink),
                format_args!("attach the {kind} sink to '{}'", current.name()),
            );
        }
        best_effort(
            current.set_state(PlaybackState::Paused),
            format_args!("pause '{}'", current.name()),
        );
    }

    /// Play `pipeline` as a one-off preview.
    ///
    /// The pipeline gets registered, becomes current and starts playing. A previous
    /// preview pipeline is unregistered.
    pub fn preview_transient(&mut self, pipeline: T::Pipeline) {
        trace!("preview_transient( '{}' )", pipeline.name());

        if pipeline == self.default {
            debug!("The default pipeline cannot be previewed");
            return;
        }

        self.pause();

        let previous = self.transient.take();
        self.register(pipeline.clone());
        self.switch_to(&pipeline);
        if let Some(previous) = previous.filter(|previous| *previous != pipeline) {
            self.unregister(&previous);
        }
        self.transient = Some(pipeline);

        self.play();
    }

    /// Seek both shared sinks to `position`.
    ///
    /// A playing transport is paused for the seek and resumed afterwards, even if
    /// the seek failed.
    ///
    /// # Errors
    ///
    /// - [`ArbiterError::NoCurrentPipeline`] if only the default pipeline is current.
    /// - [`ArbiterError::SeekFailed`] if any of the sinks rejected the seek.
    pub fn seek_current(&mut self, position: gst::ClockTime) -> Result<(), ArbiterError> {
        trace!("seek_current( {position} )");

        if !self.has_content() {
            warn!("Not seeking to {position}: {}", ArbiterError::NoCurrentPipeline);
            return Err(ArbiterError::NoCurrentPipeline);
        }

        let previous = self.state();
        if previous != PlaybackState::Paused {
            self.pause();
        }

        let mut failed = Vec::new();
        for kind in [SinkKind::Video, SinkKind::Audio] {
            let Some(sink) = self.sink(kind) else {
                debug!("No {kind} sink to seek");
                continue;
            };
            if let Err(error) = sink.seek(position) {
                error!("Couldn't seek the {kind} sink to {position}, error: {error:#}");
                failed.push(kind);
            }
        }

        if previous == PlaybackState::Playing {
            self.play();
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ArbiterError::SeekFailed {
                position,
                sinks: failed,
            })
        }
    }

    /// Start playing the current pipeline.
    ///
    /// Does nothing while there is no current pipeline or a shared sink is missing.
    pub fn play(&mut self) {
        trace!("play()");

        if self.current.is_none() {
            warn!("Not playing: {}", ArbiterError::NoCurrentPipeline);
            return;
        }
        if self.audio_sink.is_none() || self.video_sink.is_none() {
            warn!("Not playing: the audio and video sinks have to be set");
            return;
        }

        {
            let mut state = self.shared.state.lock();
            if *state == PlaybackState::Playing {
                return;
            }
            *state = PlaybackState::Playing;
        }

        debug!("Setting play thread to playing");
        best_effort(
            self.play_thread.set_state(PlaybackState::Playing),
            "set the play thread to playing",
        );
    }

    /// Pause the current pipeline.
    ///
    /// The default pipeline is never paused.
    pub fn pause(&mut self) {
        trace!("pause()");

        if !self.has_content() {
            debug!("Not pausing, there is no current pipeline with content");
            return;
        }

        {
            let mut state = self.shared.state.lock();
            if *state == PlaybackState::Paused {
                return;
            }
            *state = PlaybackState::Paused;
        }

        debug!("Setting play thread to paused");
        best_effort(
            self.play_thread.set_state(PlaybackState::Paused),
            "set the play thread to paused",
        );
    }

    /// Lower a playing transport to `Paused` without any further checks.
    fn stop_playing(&mut self) {
        {
            let mut state = self.shared.state.lock();
            if *state != PlaybackState::Playing {
                return;
            }
            *state = PlaybackState::Paused;
        }

        debug!("Setting play thread to paused");
        best_effort(
            self.play_thread.set_state(PlaybackState::Paused),
            "set the play thread to paused",
        );
    }

    /// Subscribe to notifications of the given kind.
    ///
    /// Callbacks are called synchronously in subscription order.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&ArbiterEvent<T::Pipeline>) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(kind, Arc::new(callback))
    }

    /// Cancel a subscription. Returns false if it was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    /// Global transport state.
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        *self.shared.state.lock()
    }

    #[must_use]
    pub fn current(&self) -> Option<&T::Pipeline> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn default_pipeline(&self) -> &T::Pipeline {
        &self.default
    }

    #[must_use]
    pub fn transient(&self) -> Option<&T::Pipeline> {
        self.transient.as_ref()
    }

    /// Registered pipelines in registration order, without the default pipeline.
    #[must_use]
    pub fn pipelines(&self) -> &[T::Pipeline] {
        &self.pipelines
    }

    #[must_use]
    pub fn is_registered(&self, pipeline: &T::Pipeline) -> bool {
        self.pipelines.contains(pipeline)
    }

    #[must_use]
    pub fn audio_sink(&self) -> Option<&SinkOf<T>> {
        self.audio_sink.as_ref()
    }

    #[must_use]
    pub fn video_sink(&self) -> Option<&SinkOf<T>> {
        self.video_sink.as_ref()
    }

    #[must_use]
    pub fn play_thread(&self) -> &T {
        &self.play_thread
    }

    fn sink(&self, kind: SinkKind) -> Option<&SinkOf<T>> {
        match kind {
            SinkKind::Audio => self.audio_sink.as_ref(),
            SinkKind::Video => self.video_sink.as_ref(),
        }
    }

    /// true if the current pipeline is something other than the default.
    fn has_content(&self) -> bool {
        self.current
            .as_ref()
            .map_or(false, |current| *current != self.default)
    }
}

impl<T: PlayThread> Drop for PipelineArbiter<T> {
    fn drop(&mut self) {
        debug!("Dropping playground...");
        if let (Some(current), Some(id)) = (&self.current, self.state_handler.take()) {
            current.disconnect(id);
        }
    }
}

fn declares<P: MediaPipeline>(pipeline: &P, kind: SinkKind) -> bool {
    match kind {
        SinkKind::Audio => pipeline.has_audio(),
        SinkKind::Video => pipeline.has_video(),
    }
}

fn attach<P: MediaPipeline>(pipeline: &P, kind: SinkKind, sink: &P::Sink) -> anyhow::Result<()> {
    match kind {
        SinkKind::Audio => pipeline.attach_audio_sink(sink),
        SinkKind::Video => pipeline.attach_video_sink(sink),
    }
}

fn detach<P: MediaPipeline>(pipeline: &P, kind: SinkKind) -> anyhow::Result<()> {
    match kind {
        SinkKind::Audio => pipeline.remove_audio_sink(),
        SinkKind::Video => pipeline.remove_video_sink(),
    }
}

/// Log a failed backend request instead of propagating it.
fn best_effort(result: anyhow::Result<()>, action: impl Display) {
    if let Err(error) = result {
        warn!("Unable to {action}, error: {error:#}");
    }
}
