// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! `GStreamer` pipelines which can be played through the shared sinks.

use anyhow::{bail, Context, Result};
use gst::prelude::*;
use parking_lot::Mutex;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use crate::{
    debug, MediaPipeline, PlaybackState, SignalHandlerId, SinkKind, SinkThread,
    StateChangedCallback, TitleStyle,
};

/// Titles are rendered in steps of 100ms.
pub const TITLE_FRAMERATE: u32 = 10;

/// Seconds probing media for its streams may take.
const DISCOVER_TIMEOUT_SECS: u64 = 5;

/// Raw video format of generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
}

impl Default for VideoFormat {
    /// PAL
    fn default() -> Self {
        Self {
            width: 720,
            height: 576,
            framerate: 25,
        }
    }
}

impl VideoFormat {
    fn caps(&self, framerate: u32) -> String {
        format!(
            "video/x-raw,width={width},height={height},framerate={framerate}/1",
            width = self.width,
            height = self.height,
        )
    }
}

/// What a [`SmartBin`] plays.
#[derive(Debug, Clone, PartialEq)]
pub enum SmartBinKind {
    /// Black picture and silence, shown if nothing else is selected.
    Default,
    Uri(String),
    File(PathBuf),
    Title(TitleStyle),
}

impl SmartBinKind {
    fn label(&self) -> &'static str {
        match self {
            SmartBinKind::Default => "default",
            SmartBinKind::Uri(_) => "uri",
            SmartBinKind::File(_) => "file",
            SmartBinKind::Title(_) => "title",
        }
    }
}

/// End of an audio or video chain within a [`SmartBin`].
#[derive(Debug)]
struct Output {
    /// Last content element, a shared sink gets linked to it.
    tail: gst::Element,
    /// Drains the output while no sink is attached.
    placeholder: gst::Element,
    sink: Mutex<Option<SinkThread>>,
}

impl Output {
    fn find(bin: &gst::Bin, kind: SinkKind) -> Result<Self> {
        let tail = bin
            .by_name(&format!("{kind}_out"))
            .with_context(|| format!("unable to find {kind} output"))?;
        let placeholder = bin
            .by_name(&format!("{kind}_placeholder"))
            .with_context(|| format!("unable to find {kind} placeholder"))?;

        Ok(Self {
            tail,
            placeholder,
            sink: Mutex::new(None),
        })
    }
}

struct Inner {
    kind: SmartBinKind,
    bin: gst::Bin,
    audio: Option<Output>,
    video: Option<Output>,
    handlers: Mutex<Vec<(SignalHandlerId, StateChangedCallback)>>,
    next_handler: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        debug!("Dropping smart bin '{}'...", self.bin.name());
        if let Err(error) = self.bin.set_state(gst::State::Null) {
            error!(
                "Unable to set '{}' to `Null`, error: {error}",
                self.bin.name()
            );
        }
    }
}

/// A `GStreamer` bin with fixed audio and/or video outputs the shared sinks can be
/// attached to.
///
/// Clones refer to the same bin.
#[derive(Clone)]
pub struct SmartBin {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SmartBin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartBin")
            .field("name", &self.inner.bin.name())
            .field("kind", &self.inner.kind)
            .finish_non_exhaustive()
    }
}

impl PartialEq for SmartBin {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn video_output() -> &'static str {
    r#"
        ! queue
            name=video_out
        ! fakesink
            name=video_placeholder
            sync=false
            async=false
    "#
}

fn audio_output() -> &'static str {
    r#"
        ! queue
            name=audio_out
        ! fakesink
            name=audio_placeholder
            sync=false
            async=false
    "#
}

impl SmartBin {
    /// Create the placeholder pipeline showing black and playing silence.
    ///
    /// # Errors
    ///
    /// This can fail if the test sources are not available in `GStreamer`.
    pub fn placeholder(format: &VideoFormat) -> Result<Self> {
        trace!("placeholder( {format:?} )");

        let description = format!(
            r#"
                videotestsrc
                    name=video_src
                    pattern=black
                ! {caps}
                {video}
                audiotestsrc
                    name=audio_src
                    wave=silence
                {audio}
            "#,
            caps = format.caps(format.framerate),
            video = video_output(),
            audio = audio_output(),
        );

        Self::create(SmartBinKind::Default, &description)
    }

    /// Create a pipeline decoding the given URI.
    ///
    /// # Errors
    ///
    /// This can fail if `uridecodebin` or the converters are not available in `GStreamer`.
    pub fn uri(uri: &str) -> Result<Self> {
        trace!("uri( '{uri}' )");

        Self::decoding(SmartBinKind::Uri(uri.to_owned()), uri)
    }

    /// Create a pipeline decoding the given file.
    ///
    /// # Errors
    ///
    /// This can fail if the path cannot be turned into a URI or the elements are not
    /// available in `GStreamer`.
    pub fn file(path: &Path) -> Result<Self> {
        trace!("file( {path:?} )");

        let path = path
            .canonicalize()
            .with_context(|| format!("unable to resolve {path:?}"))?;
        let uri = glib::filename_to_uri(&path, None)
            .with_context(|| format!("unable to build URI for {path:?}"))?;

        Self::decoding(SmartBinKind::File(path), uri.as_str())
    }

    /// Only the outputs for streams the media actually contains are created, a shared
    /// sink linked to an output nothing feeds would never preroll.
    fn decoding(kind: SmartBinKind, uri: &str) -> Result<Self> {
        let streams = Streams::discover(uri)?;
        debug!("Found {streams:?} in '{uri}'");

        let mut description = String::from("uridecodebin name=decoder");
        if streams.video {
            description.push_str(" videoconvert name=video_in ! videoscale");
            description.push_str(video_output());
        }
        if streams.audio {
            description.push_str(" audioconvert name=audio_in ! audioresample");
            description.push_str(audio_output());
        }

        let smart_bin = Self::create(kind, &description)?;

        let decoder = smart_bin
            .inner
            .bin
            .by_name("decoder")
            .context("unable to find decoder")?;
        decoder.set_property("uri", uri);

        let bin_weak = smart_bin.inner.bin.downgrade();
        decoder.connect_pad_added(move |_, pad| {
            let Some(bin) = bin_weak.upgrade() else {
                return;
            };
            link_decoded_pad(&bin, pad);
        });

        Ok(smart_bin)
    }

    /// Create a pipeline rendering a title on a solid background.
    ///
    /// # Errors
    ///
    /// This can fail if `textoverlay` or the test source are not available in `GStreamer`.
    pub fn title(style: &TitleStyle, format: &VideoFormat) -> Result<Self> {
        trace!("title( {style} )");

        let description = format!(
            r#"
                videotestsrc
                    name=background
                    pattern=solid-color
                ! {caps}
                ! textoverlay
                    name=title
                    halignment=position
                    valignment=position
                    auto-resize=false
                ! videoconvert
                {video}
            "#,
            caps = format.caps(TITLE_FRAMERATE),
            video = video_output(),
        );

        let smart_bin = Self::create(SmartBinKind::Title(style.clone()), &description)?;
        let bin = &smart_bin.inner.bin;

        bin.by_name("background")
            .context("unable to find title background")?
            .set_property("foreground-color", style.bg_color.argb());

        let title = bin.by_name("title").context("unable to find title overlay")?;
        title.set_property("text", style.text.as_str());
        title.set_property("font-desc", style.font.to_string());
        title.set_property("xpos", style.alignment.x);
        title.set_property("ypos", style.alignment.y);
        title.set_property("color", style.fg_color.argb());
        title.set_property_from_str("line-alignment", style.justification.into());

        Ok(smart_bin)
    }

    fn create(kind: SmartBinKind, description: &str) -> Result<Self> {
        static COUNT: AtomicUsize = AtomicUsize::new(0);

        let bin = gst::parse_bin_from_description(description, false)
            .with_context(|| format!("could not parse {} bin", kind.label()))?;
        bin.set_property(
            "name",
            format!(
                "{}-{}",
                kind.label(),
                COUNT.fetch_add(1, Ordering::Relaxed)
            ),
        );

        let audio = if bin.by_name("audio_out").is_some() {
            Some(Output::find(&bin, SinkKind::Audio)?)
        } else {
            None
        };
        let video = if bin.by_name("video_out").is_some() {
            Some(Output::find(&bin, SinkKind::Video)?)
        } else {
            None
        };

        debug!("Created smart bin '{}'", bin.name());

        Ok(Self {
            inner: Arc::new(Inner {
                kind,
                bin,
                audio,
                video,
                handlers: Mutex::new(Vec::new()),
                next_handler: AtomicU64::new(0),
            }),
        })
    }

    #[must_use]
    pub fn kind(&self) -> &SmartBinKind {
        &self.inner.kind
    }

    #[must_use]
    pub fn bin(&self) -> &gst::Bin {
        &self.inner.bin
    }

    /// Sink currently attached to the given output.
    #[must_use]
    pub fn sink(&self, kind: SinkKind) -> Option<SinkThread> {
        self.output(kind)
            .and_then(|output| output.sink.lock().clone())
    }

    /// Call the connected state-change callbacks.
    pub(crate) fn notify_state_changed(&self, previous: PlaybackState, new: PlaybackState) {
        let callbacks: Vec<_> = self
            .inner
            .handlers
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(previous, new);
        }
    }

    fn output(&self, kind: SinkKind) -> Option<&Output> {
        match kind {
            SinkKind::Audio => self.inner.audio.as_ref(),
            SinkKind::Video => self.inner.video.as_ref(),
        }
    }

    fn attach(&self, kind: SinkKind, sink: &SinkThread) -> Result<()> {
        trace!("attach( {}, {kind} )", self.name());

        let Some(output) = self.output(kind) else {
            bail!("'{}' has no {kind} output", self.name());
        };

        let mut attached = output.sink.lock();
        match attached.as_ref() {
            Some(current) if current == sink => return Ok(()),
            Some(_) => bail!("'{}' already has a {kind} sink", self.name()),
            None => {}
        }

        self.inner
            .bin
            .add(sink.bin())
            .with_context(|| format!("unable to add {kind} sink to '{}'", self.name()))?;
        output.tail.unlink(&output.placeholder);

        let linked = output
            .tail
            .link(sink.bin())
            .with_context(|| format!("unable to link {kind} sink in '{}'", self.name()))
            .and_then(|()| {
                sink.bin()
                    .sync_state_with_parent()
                    .context("unable to sync sink state with parent")
            });
        if let Err(error) = linked {
            self.restore_placeholder(output, sink);
            return Err(error);
        }

        *attached = Some(sink.clone());
        debug::debug_dot(&self.inner.bin, &format!("attach-{kind}-sink"));

        Ok(())
    }

    /// Take back a sink which could not be attached, the placeholder drains the output again.
    fn restore_placeholder(&self, output: &Output, sink: &SinkThread) {
        output.tail.unlink(sink.bin());
        if let Err(error) = self.inner.bin.remove(sink.bin()) {
            error!("Unable to remove sink from '{}': {error}", self.name());
        }
        if let Err(error) = sink.bin().set_state(gst::State::Null) {
            warn!("Unable to reset sink state: {error}");
        }
        if let Err(error) = output.tail.link(&output.placeholder) {
            error!("Unable to relink placeholder in '{}': {error}", self.name());
        }
        debug::debug_dot(&self.inner.bin, "restore-placeholder");
    }

    fn detach(&self, kind: SinkKind) -> Result<()> {
        trace!("detach( {}, {kind} )", self.name());

        let Some(output) = self.output(kind) else {
            return Ok(());
        };
        let Some(sink) = output.sink.lock().take() else {
            return Ok(());
        };

        output.tail.unlink(sink.bin());
        self.inner
            .bin
            .remove(sink.bin())
            .with_context(|| format!("unable to remove {kind} sink from '{}'", self.name()))?;
        output
            .tail
            .link(&output.placeholder)
            .with_context(|| format!("unable to relink {kind} placeholder in '{}'", self.name()))?;

        Ok(())
    }
}

impl MediaPipeline for SmartBin {
    type Sink = SinkThread;

    fn name(&self) -> String {
        self.inner.bin.name().to_string()
    }

    fn has_audio(&self) -> bool {
        self.inner.audio.is_some()
    }

    fn has_video(&self) -> bool {
        self.inner.video.is_some()
    }

    fn set_state(&self, state: PlaybackState) -> Result<()> {
        trace!("set_state( {}, {state} )", self.name());

        self.inner
            .bin
            .set_state(state.into())
            .with_context(|| format!("unable to set '{}' to {state}", self.name()))?;
        Ok(())
    }

    fn attach_audio_sink(&self, sink: &SinkThread) -> Result<()> {
        self.attach(SinkKind::Audio, sink)
    }

    fn remove_audio_sink(&self) -> Result<()> {
        self.detach(SinkKind::Audio)
    }

    fn attach_video_sink(&self, sink: &SinkThread) -> Result<()> {
        self.attach(SinkKind::Video, sink)
    }

    fn remove_video_sink(&self) -> Result<()> {
        self.detach(SinkKind::Video)
    }

    fn connect_state_changed(&self, callback: StateChangedCallback) -> SignalHandlerId {
        let id = SignalHandlerId(self.inner.next_handler.fetch_add(1, Ordering::Relaxed));
        self.inner.handlers.lock().push((id, callback));
        id
    }

    fn disconnect(&self, id: SignalHandlerId) {
        self.inner.handlers.lock().retain(|(handler, _)| *handler != id);
    }
}

/// Kinds of streams found in a piece of media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Streams {
    audio: bool,
    video: bool,
}

impl Streams {
    fn discover(uri: &str) -> Result<Self> {
        trace!("discover( '{uri}' )");

        let discoverer =
            gst_pbutils::Discoverer::new(gst::ClockTime::from_seconds(DISCOVER_TIMEOUT_SECS))
                .context("unable to create discoverer")?;
        let info = discoverer
            .discover_uri(uri)
            .with_context(|| format!("unable to discover streams of '{uri}'"))?;

        let streams = Self {
            audio: !info.audio_streams().is_empty(),
            video: !info.video_streams().is_empty(),
        };
        if !streams.audio && !streams.video {
            bail!("'{uri}' has neither audio nor video");
        }

        Ok(streams)
    }
}

/// Link a pad the decoder exposed to the matching converter.
fn link_decoded_pad(bin: &gst::Bin, pad: &gst::Pad) {
    let caps = pad.current_caps().unwrap_or_else(|| pad.query_caps(None));
    let Some(media) = caps.structure(0).map(|s| s.name().to_string()) else {
        warn!("Decoded pad {} has no caps", debug::name(pad));
        return;
    };

    let target = if media.starts_with("video/") {
        "video_in"
    } else if media.starts_with("audio/") {
        "audio_in"
    } else {
        debug!("Ignoring decoded {media} stream");
        return;
    };

    let Some(converter) = bin.by_name(target) else {
        debug!("No output for decoded {media} stream in {}", debug::name(bin));
        return;
    };
    let Some(sink_pad) = converter.static_pad("sink") else {
        error!("Unable to find sink pad of '{target}' in {}", debug::name(bin));
        return;
    };
    if sink_pad.is_linked() {
        debug!("'{target}' is already linked, ignoring another {media} stream");
        return;
    }

    if let Err(error) = pad.link(&sink_pad) {
        error!("Unable to link decoded {media} stream: {error:?}");
    }
}
