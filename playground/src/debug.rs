// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Debugging helpers for the play thread.

use gst::{prelude::*, DebugGraphDetails};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Write a DOT file of the top-level bin containing `element`, if log level is `debug`.
pub fn debug_dot(element: &impl IsA<gst::Element>, label: &str) {
    if log::max_level() >= log::Level::Debug {
        dot(element, label);
    }
}

/// Write a DOT file of the top-level bin containing `element`.
///
/// Does nothing unless `GST_DEBUG_DUMP_DOT_DIR` is set. Files are prefixed with a
/// running number so that successive dumps keep their order.
pub fn dot(element: &impl IsA<gst::Element>, label: &str) {
    static COUNT: AtomicUsize = AtomicUsize::new(0);

    let Ok(path) = std::env::var("GST_DEBUG_DUMP_DOT_DIR") else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(&path) {
        error!("Unable to create DOT output directory '{path}': {e:?}");
        return;
    }

    let mut top: gst::Element = element.clone().upcast();
    while let Some(parent) = top.parent().and_then(|p| p.downcast::<gst::Element>().ok()) {
        top = parent;
    }
    let Ok(bin) = top.downcast::<gst::Bin>() else {
        error!("Unable to write DOT file '{label}': top-level element is not a bin");
        return;
    };

    let name = format!("{n}-{label}", n = COUNT.fetch_add(1, Ordering::SeqCst));
    info!("Writing DOT file '{path}/{name}.dot'");
    gst::debug_bin_to_dot_file(&bin, DebugGraphDetails::ALL, name);
}

/// Name of `object` prefixed with the names of all its parents, e.g. `thread.title.video_out`.
pub fn name(object: &impl IsA<gst::Object>) -> String {
    match object.parent() {
        Some(parent) => format!("{}.{}", name(&parent), object.name()),
        None => object.name().to_string(),
    }
}
