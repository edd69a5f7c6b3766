// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use anyhow::{Context, Result};
use std::path::Path;

use crate::{
    GstPlayThread, MediaPipeline, PipelineArbiter, SinkBackend, SinkKind, SinkThread, SmartBin,
    SmartBinKind, TitleStyle, VideoFormat,
};

/// Arbiter playing [`SmartBin`]s through `GStreamer`.
pub type Playground = PipelineArbiter<GstPlayThread>;

impl Playground {
    /// Create a playground with a black and silent default pipeline of the given format.
    ///
    /// # Errors
    ///
    /// This can fail if the play thread or the default pipeline cannot be created.
    pub fn create(format: &VideoFormat) -> Result<Self> {
        let play_thread = GstPlayThread::create("playground-thread")?;
        let default = SmartBin::placeholder(format).context("unable to create default pipeline")?;

        Ok(Self::new(play_thread, default))
    }

    /// Create and set both shared sinks.
    ///
    /// # Errors
    ///
    /// This can fail if the elements of a backend are not available in `GStreamer`.
    pub fn create_sinks(&mut self, audio: SinkBackend, video: SinkBackend) -> Result<()> {
        self.set_audio_sink(SinkThread::create(SinkKind::Audio, audio)?);
        self.set_video_sink(SinkThread::create(SinkKind::Video, video)?);
        Ok(())
    }

    /// Preview the media behind `uri`.
    ///
    /// # Errors
    ///
    /// This can fail if the decoding pipeline cannot be created.
    pub fn preview_uri(&mut self, uri: &str) -> Result<()> {
        let pipeline = SmartBin::uri(uri)?;
        self.preview_transient(pipeline);
        Ok(())
    }

    /// Preview a local media file.
    ///
    /// Previewing the file which is already current does nothing.
    ///
    /// # Errors
    ///
    /// This can fail if the file does not exist or the decoding pipeline cannot be created.
    pub fn preview_file(&mut self, path: &Path) -> Result<()> {
        let path = path
            .canonicalize()
            .with_context(|| format!("unable to resolve {path:?}"))?;

        if let Some(current) = self.current() {
            if matches!(current.kind(), SmartBinKind::File(current_path) if *current_path == path) {
                debug!("{path:?} is already previewed in '{}'", current.name());
                return Ok(());
            }
        }

        let pipeline = SmartBin::file(&path)?;
        self.preview_transient(pipeline);
        Ok(())
    }

    /// Preview a title.
    ///
    /// # Errors
    ///
    /// This can fail if the title pipeline cannot be created.
    pub fn preview_title(&mut self, style: &TitleStyle, format: &VideoFormat) -> Result<()> {
        let pipeline = SmartBin::title(style, format)?;
        self.preview_transient(pipeline);
        Ok(())
    }
}
