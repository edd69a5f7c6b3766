// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Capability traits the arbiter expects from pipelines, sinks and the play thread.

use anyhow::Result;
use std::{
    fmt::{Debug, Display},
    sync::Arc,
};

/// Playback state of a pipeline, a sink or the whole playground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    Null,
    Ready,
    Paused,
    Playing,
}

impl PlaybackState {
    fn as_str(self) -> &'static str {
        match self {
            PlaybackState::Null => "null",
            PlaybackState::Ready => "ready",
            PlaybackState::Paused => "paused",
            PlaybackState::Playing => "playing",
        }
    }
}

impl Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<PlaybackState> for gst::State {
    fn from(state: PlaybackState) -> gst::State {
        match state {
            PlaybackState::Null => gst::State::Null,
            PlaybackState::Ready => gst::State::Ready,
            PlaybackState::Paused => gst::State::Paused,
            PlaybackState::Playing => gst::State::Playing,
        }
    }
}

impl TryFrom<gst::State> for PlaybackState {
    type Error = anyhow::Error;

    fn try_from(state: gst::State) -> Result<Self, Self::Error> {
        match state {
            gst::State::Null => Ok(PlaybackState::Null),
            gst::State::Ready => Ok(PlaybackState::Ready),
            gst::State::Paused => Ok(PlaybackState::Paused),
            gst::State::Playing => Ok(PlaybackState::Playing),
            other => Err(anyhow::anyhow!("no playback state for {other:?}")),
        }
    }
}

/// Kind of a shared output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Audio,
    Video,
}

impl Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::Audio => write!(f, "audio"),
            SinkKind::Video => write!(f, "video"),
        }
    }
}

/// Identifies a connected state-change callback so it can be disconnected again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalHandlerId(pub u64);

/// Callback invoked with `(previous, new)` when a pipeline reports a state change.
pub type StateChangedCallback = Arc<dyn Fn(PlaybackState, PlaybackState) + Send + Sync>;

/// Shared output sink as the arbiter sees it.
///
/// Handles are cheap clones of the same sink, equality is identity.
pub trait OutputSink: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Request a state change.
    ///
    /// # Errors
    ///
    /// This can fail if the sink refuses the state change.
    fn set_state(&self, state: PlaybackState) -> Result<()>;

    /// Flushing seek to `position` (time format, absolute).
    ///
    /// # Errors
    ///
    /// This can fail if the sink rejects the seek.
    fn seek(&self, position: gst::ClockTime) -> Result<()>;
}

/// Media pipeline which can be lent the shared sinks.
///
/// Handles are cheap clones of the same pipeline, equality is identity.
pub trait MediaPipeline: Clone + PartialEq + Debug + Send + Sync + 'static {
    type Sink: OutputSink;

    /// Name used in logs.
    fn name(&self) -> String;

    fn has_audio(&self) -> bool;
    fn has_video(&self) -> bool;

    /// Request a state change. Completion is reported through the state-change callbacks.
    ///
    /// # Errors
    ///
    /// This can fail if the pipeline refuses the state change.
    fn set_state(&self, state: PlaybackState) -> Result<()>;

    /// Lend the audio sink to this pipeline.
    ///
    /// # Errors
    ///
    /// This can fail if the sink cannot be linked into the pipeline.
    fn attach_audio_sink(&self, sink: &Self::Sink) -> Result<()>;

    /// Give back the audio sink. Does nothing if none is attached.
    ///
    /// # Errors
    ///
    /// This can fail if the sink cannot be unlinked from the pipeline.
    fn remove_audio_sink(&self) -> Result<()>;

    /// Lend the video sink to this pipeline.
    ///
    /// # Errors
    ///
    /// This can fail if the sink cannot be linked into the pipeline.
    fn attach_video_sink(&self, sink: &Self::Sink) -> Result<()>;

    /// Give back the video sink. Does nothing if none is attached.
    ///
    /// # Errors
    ///
    /// This can fail if the sink cannot be unlinked from the pipeline.
    fn remove_video_sink(&self) -> Result<()>;

    /// Connect a callback which is called whenever the pipeline reports a new state.
    fn connect_state_changed(&self, callback: StateChangedCallback) -> SignalHandlerId;

    /// Disconnect a callback connected with [`MediaPipeline::connect_state_changed`].
    fn disconnect(&self, id: SignalHandlerId);
}

/// Container in which the current pipeline plays.
///
/// Setting its state cascades to the pipeline inside and the sinks attached to it.
pub trait PlayThread: Debug {
    type Pipeline: MediaPipeline;

    /// # Errors
    ///
    /// This can fail if the pipeline cannot be added to the container.
    fn add(&self, pipeline: &Self::Pipeline) -> Result<()>;

    /// # Errors
    ///
    /// This can fail if the pipeline cannot be removed from the container.
    fn remove(&self, pipeline: &Self::Pipeline) -> Result<()>;

    /// # Errors
    ///
    /// This can fail if the container refuses the state change.
    fn set_state(&self, state: PlaybackState) -> Result<()>;
}

/// Sink type of a play thread's pipelines.
pub type SinkOf<T> = <<T as PlayThread>::Pipeline as MediaPipeline>::Sink;
