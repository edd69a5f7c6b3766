// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use anyhow::{bail, Context, Result};
use playground::{ArbiterEvent, EventKind, MediaPipeline, PlaybackState, Playground, TitleStyle};
use std::path::PathBuf;
use tokio::sync::watch;

use crate::settings::Settings;

/// What to show in a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    /// Only the black placeholder.
    Idle,
    Uri(String),
    File(PathBuf),
    Title(TitleStyle),
}

/// A playground previewing one thing until it is stopped.
pub struct Session {
    playground: Playground,
    state_rx: watch::Receiver<PlaybackState>,
}

impl Session {
    /// Create the playground with the configured sinks and start the preview.
    pub fn start(settings: &Settings, preview: Preview) -> Result<Self> {
        let mut playground =
            Playground::create(&settings.project).context("Failed to create playground")?;

        let (state_tx, state_rx) = watch::channel(playground.state());
        playground.subscribe(EventKind::CurrentState, move |event| {
            if let ArbiterEvent::CurrentState(state) = event {
                log::info!("Playground is {state}");
                state_tx.send_replace(*state);
            }
        });
        playground.subscribe(EventKind::CurrentChanged, |event| {
            if let ArbiterEvent::CurrentChanged(pipeline) = event {
                log::info!("Now showing '{}'", pipeline.name());
            }
        });

        playground
            .create_sinks(settings.output.audio, settings.output.video)
            .context("Failed to create sinks")?;

        match preview {
            Preview::Idle => playground.play(),
            Preview::Uri(uri) => playground.preview_uri(&uri)?,
            Preview::File(path) => playground.preview_file(&path)?,
            Preview::Title(style) => playground.preview_title(&style, &settings.project)?,
        }

        Ok(Self {
            playground,
            state_rx,
        })
    }

    /// Wait until the current pipeline confirmed it is playing.
    pub async fn playing(&mut self) -> Result<()> {
        self.state_rx
            .wait_for(|state| *state == PlaybackState::Playing)
            .await
            .context("Playground went away")?;
        Ok(())
    }

    /// Seek the preview to `seconds` from its start.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            bail!("Cannot seek to {seconds}s");
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let position = gst::ClockTime::from_nseconds((seconds * 1e9).round() as u64);

        self.playground.seek_current(position)?;
        Ok(())
    }

    /// Show the placeholder again.
    pub fn stop(&mut self) {
        self.playground.switch_to_default();
    }
}
