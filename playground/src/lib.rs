// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

/*!
    # Purpose
    The *playground* crate previews media through a single pair of shared audio and video sinks
    using [GStreamer](https://gstreamer.freedesktop.org/).

    Many pipelines may exist at the same time but only one of them
    (the so-called *current* pipeline) is connected to the sinks and receives play, pause and
    seek commands.
    The [PipelineArbiter] decides which one that is.

    - [PipelineArbiter]
      registers pipelines, switches the shared sinks between them and drives the transport.
    - [Playground]
      the arbiter playing [SmartBin]s inside a [GstPlayThread].

    # Pipelines & Sinks

    - [SmartBin]
      is a bin with fixed audio and/or video outputs. It can play a URI, a file, a title or the
      black and silent placeholder which is shown when nothing else is selected.
    - [SinkThread]
      is one of the shared sinks which is lent to the current pipeline.
    - [GstPlayThread]
      is the top-level pipeline the current [SmartBin] plays in.

    # Generic traits for extending capabilities

    - [MediaPipeline]
      is a trait which the arbiter is assuming for a pipeline.
    - [OutputSink]
      is a trait which the arbiter is assuming for a shared sink.
    - [PlayThread]
      is a trait which the arbiter is assuming for the container of the current pipeline.

    # Titles

    - [TitleStyle]
      text, font, colors and alignment of a rendered title.
*/

#![allow(clippy::module_name_repetitions)]

#[macro_use]
extern crate log;

mod arbiter;
mod bins;
pub mod debug;
mod gst_arbiter;
mod pipeline;
mod play_thread;
mod sinks;
mod title;

#[cfg(test)]
mod tests;

pub use arbiter::*;
pub use bins::*;
pub use gst_arbiter::*;
pub use pipeline::*;
pub use play_thread::*;
pub use sinks::*;
pub use title::*;

#[cfg(test)]
pub use tests::testing;
