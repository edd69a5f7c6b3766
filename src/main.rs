// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

#![allow(clippy::module_name_repetitions)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gst::glib;
use log::{info, warn};
use pitivi_playground::{
    session::{Preview, Session},
    settings::Settings,
};
use playground::{Color, Font, SinkBackend};
use std::path::PathBuf;
use tokio::{
    select,
    signal::{
        ctrl_c,
        unix::{signal, SignalKind},
    },
    time::{timeout, Duration},
};

/// How long to wait for a preview to start playing before seeking anyway.
const PREROLL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(author, version, about = env!("CARGO_PKG_DESCRIPTION"), long_about = None)]
struct Args {
    /// Configuration file, missing files are ignored
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Seek to this position (in seconds) once the preview plays
    #[arg(long)]
    seek: Option<f64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show black and play silence
    Idle,
    /// Preview media behind a URI
    Uri { uri: String },
    /// Preview a local media file
    File { path: PathBuf },
    /// Preview a title, the configured title style is used for everything not given
    Title {
        /// Text to show
        text: Option<String>,
        /// Font description like "Sans Bold 24"
        #[arg(long)]
        font: Option<Font>,
        /// Text color like "#ffffff"
        #[arg(long)]
        fg: Option<Color>,
        /// Background color like "#000000"
        #[arg(long)]
        bg: Option<Color>,
    },
}

impl Commands {
    fn into_preview(self, settings: &Settings) -> Preview {
        match self {
            Commands::Idle => Preview::Idle,
            Commands::Uri { uri } => Preview::Uri(uri),
            Commands::File { path } => Preview::File(path),
            Commands::Title { text, font, fg, bg } => {
                let mut style = settings.title.clone();
                style.text = text.unwrap_or(style.text);
                style.font = font.unwrap_or(style.font);
                style.fg_color = fg.unwrap_or(style.fg_color);
                style.bg_color = bg.unwrap_or(style.bg_color);
                Preview::Title(style)
            }
        }
    }
}

fn check_elements(settings: &Settings) -> Result<()> {
    let registry = gst::Registry::get();

    let mut required = vec![
        "queue",
        "fakesink",
        "videotestsrc",
        "audiotestsrc",
        "uridecodebin",
        "videoconvert",
        "videoscale",
        "audioconvert",
        "audioresample",
        "textoverlay",
    ];
    required.push(match settings.output.video {
        SinkBackend::System => "autovideosink",
        SinkBackend::Fake => "fakevideosink",
    });
    required.push(match settings.output.audio {
        SinkBackend::System => "autoaudiosink",
        SinkBackend::Fake => "fakeaudiosink",
    });

    let missing: Vec<_> = required
        .into_iter()
        .filter(|element| registry.lookup_feature(element).is_none())
        .collect();

    if !missing.is_empty() {
        anyhow::bail!(
            "The following elements could not be loaded: {}",
            missing.join(", ")
        );
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    gst::init()?;

    let settings = Settings::load(&args.config).context("Failed to read config")?;
    check_elements(&settings)?;

    // Run a MainLoop on a separate thread so gstreamer bus watches work
    let main_loop = glib::MainLoop::new(None, false);
    std::thread::spawn({
        let main_loop = main_loop.clone();

        move || {
            main_loop.run();
        }
    });

    let preview = args
        .command
        .map_or(Preview::Idle, |command| command.into_preview(&settings));
    let session = Session::start(&settings, preview)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio async runtime")?;

    if let Err(e) = runtime.block_on(run(session, args.seek)) {
        eprintln!("Exit on failure: {e:?}");
        std::process::exit(-1);
    }

    main_loop.quit();

    Ok(())
}

async fn run(mut session: Session, seek: Option<f64>) -> Result<()> {
    if let Some(seconds) = seek {
        if timeout(PREROLL_TIMEOUT, session.playing()).await.is_err() {
            warn!("Preview did not start playing within {PREROLL_TIMEOUT:?}");
        }
        if let Err(e) = session.seek(seconds) {
            warn!("Seeking failed: {e:#}");
        }
    }

    let mut sig_term = signal(SignalKind::terminate()).context("can not setup SIGTERM handler")?;
    select! {
        _ = ctrl_c() => { info!("received Ctrl-C"); }
        _ = sig_term.recv() => { info!("received SIGTERM"); }
    }

    session.stop();

    Ok(())
}
