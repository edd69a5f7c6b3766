// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2


pub mod testing {

    use crate::*;
    use anyhow::{bail, Result};
    use parking_lot::Mutex;
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicU64, Ordering},
            Arc, Once,
        },
        time::{Duration, Instant},
    };

    static INIT: Once = Once::new();

    /// initialize for testing
    pub fn init() {
        INIT.call_once(init_function);
    }

    fn init_function() {
        // init logger
        env_logger::try_init().ok();
        // initialize gstreamer
        gst::init().unwrap();
    }

    /// true if all the given elements can be created, e.g. to skip tests on systems without plugins
    pub fn has_elements(names: &[&str]) -> bool {
        let registry = gst::Registry::get();
        let missing: Vec<_> = names
            .iter()
            .filter(|name| registry.lookup_feature(name).is_none())
            .collect();
        if !missing.is_empty() {
            warn!("Skipping test, missing GStreamer elements: {missing:?}");
        }
        missing.is_empty()
    }

    /// Dispatch `context` until `done` holds, false if it does not within ten seconds.
    pub fn iterate_until(context: &glib::MainContext, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done() {
            if Instant::now() > deadline {
                return false;
            }
            if !context.iteration(false) {
                std::thread::sleep(Duration::from_millis(10));
            }
        }
        true
    }

    /// Ordered record of everything the mocks were asked to do.
    #[derive(Debug, Clone, Default)]
    pub struct CallLog(Arc<Mutex<Vec<String>>>);

    impl CallLog {
        pub fn record(&self, entry: impl Into<String>) {
            self.0.lock().push(entry.into());
        }

        /// all entries recorded so far
        pub fn entries(&self) -> Vec<String> {
            self.0.lock().clone()
        }

        /// all entries recorded so far, the log is empty afterwards
        pub fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock())
        }

        /// entries starting with `prefix`
        pub fn filtered(&self, prefix: &str) -> Vec<String> {
            self.0
                .lock()
                .iter()
                .filter(|entry| entry.starts_with(prefix))
                .cloned()
                .collect()
        }

        /// index of the first entry equal to `entry`
        pub fn position(&self, entry: &str) -> Option<usize> {
            self.0.lock().iter().position(|e| e == entry)
        }

        /// index of the last entry equal to `entry`
        pub fn rposition(&self, entry: &str) -> Option<usize> {
            self.0.lock().iter().rposition(|e| e == entry)
        }
    }

    /// Record all notifications of `arbiter` into `log` as `event: <kind> <detail>`.
    pub fn record_events<T>(arbiter: &PipelineArbiter<T>, log: &CallLog)
    where
        T: PlayThread,
    {
        for kind in [
            EventKind::CurrentChanged,
            EventKind::CurrentState,
            EventKind::PipelineAdded,
            EventKind::PipelineRemoved,
        ] {
            let log = log.clone();
            arbiter.subscribe(kind, move |event| {
                let detail = match event {
                    ArbiterEvent::CurrentChanged(p)
                    | ArbiterEvent::PipelineAdded(p)
                    | ArbiterEvent::PipelineRemoved(p) => p.name(),
                    ArbiterEvent::CurrentState(state) => state.to_string(),
                };
                log.record(format!("event: {} {detail}", event.kind()));
            });
        }
    }

    #[derive(Debug)]
    struct SinkInner {
        kind: SinkKind,
        state: Mutex<PlaybackState>,
        /// name of the pipeline the sink is attached to
        holder: Mutex<Option<String>>,
        seeks: Mutex<Vec<gst::ClockTime>>,
        fail_seeks: AtomicBool,
        log: CallLog,
    }

    /// Sink recording its calls as `<kind>-sink: <call>`.
    #[derive(Debug, Clone)]
    pub struct MockSink {
        inner: Arc<SinkInner>,
    }

    impl PartialEq for MockSink {
        fn eq(&self, other: &Self) -> bool {
            Arc::ptr_eq(&self.inner, &other.inner)
        }
    }

    impl MockSink {
        pub fn new(kind: SinkKind, log: &CallLog) -> Self {
            Self {
                inner: Arc::new(SinkInner {
                    kind,
                    state: Mutex::new(PlaybackState::Null),
                    holder: Mutex::new(None),
                    seeks: Mutex::new(Vec::new()),
                    fail_seeks: AtomicBool::new(false),
                    log: log.clone(),
                }),
            }
        }

        pub fn state(&self) -> PlaybackState {
            *self.inner.state.lock()
        }

        pub fn holder(&self) -> Option<String> {
            self.inner.holder.lock().clone()
        }

        pub fn seeks(&self) -> Vec<gst::ClockTime> {
            self.inner.seeks.lock().clone()
        }

        /// let all following seeks fail
        pub fn fail_seeks(&self) {
            self.inner.fail_seeks.store(true, Ordering::SeqCst);
        }

        fn prefix(&self) -> String {
            format!("{}-sink", self.inner.kind)
        }
    }

    impl OutputSink for MockSink {
        fn set_state(&self, state: PlaybackState) -> Result<()> {
            self.inner.log.record(format!("{}: {state}", self.prefix()));
            *self.inner.state.lock() = state;
            Ok(())
        }

        fn seek(&self, position: gst::ClockTime) -> Result<()> {
            self.inner
                .log
                .record(format!("{}: seek {}", self.prefix(), position.mseconds()));
            self.inner.seeks.lock().push(position);
            if self.inner.fail_seeks.load(Ordering::SeqCst) {
                bail!("{} refuses to seek", self.prefix());
            }
            Ok(())
        }
    }

    struct PipelineInner {
        name: String,
        has_audio: bool,
        has_video: bool,
        state: Mutex<PlaybackState>,
        audio: Mutex<Option<MockSink>>,
        video: Mutex<Option<MockSink>>,
        handlers: Mutex<Vec<(SignalHandlerId, StateChangedCallback)>>,
        next_handler: AtomicU64,
        log: CallLog,
    }

    /// Pipeline recording its calls as `<name>: <call>`.
    ///
    /// State changes cascade to the attached sinks but are only reported to the
    /// callbacks when [`MockPipeline::confirm_state`] is called.
    #[derive(Clone)]
    pub struct MockPipeline {
        inner: Arc<PipelineInner>,
    }

    impl std::fmt::Debug for MockPipeline {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_tuple("MockPipeline")
                .field(&self.inner.name)
                .finish()
        }
    }

    impl PartialEq for MockPipeline {
        fn eq(&self, other: &Self) -> bool {
            Arc::ptr_eq(&self.inner, &other.inner)
        }
    }

    impl MockPipeline {
        pub fn new(name: &str, has_audio: bool, has_video: bool, log: &CallLog) -> Self {
            Self {
                inner: Arc::new(PipelineInner {
                    name: name.to_owned(),
                    has_audio,
                    has_video,
                    state: Mutex::new(PlaybackState::Null),
                    audio: Mutex::new(None),
                    video: Mutex::new(None),
                    handlers: Mutex::new(Vec::new()),
                    next_handler: AtomicU64::new(0),
                    log: log.clone(),
                }),
            }
        }

        /// pipeline with audio and video
        pub fn media(name: &str, log: &CallLog) -> Self {
            Self::new(name, true, true, log)
        }

        /// pipeline with video only
        pub fn video(name: &str, log: &CallLog) -> Self {
            Self::new(name, false, true, log)
        }

        pub fn state(&self) -> PlaybackState {
            *self.inner.state.lock()
        }

        pub fn audio(&self) -> Option<MockSink> {
            self.inner.audio.lock().clone()
        }

        pub fn video_sink(&self) -> Option<MockSink> {
            self.inner.video.lock().clone()
        }

        pub fn handler_count(&self) -> usize {
            self.inner.handlers.lock().len()
        }

        /// Report a state change to the connected callbacks.
        pub fn confirm_state(&self, previous: PlaybackState, new: PlaybackState) {
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

        fn slot(&self, kind: SinkKind) -> &Mutex<Option<MockSink>> {
            match kind {
                SinkKind::Audio => &self.inner.audio,
                SinkKind::Video => &self.inner.video,
            }
        }

        fn attach(&self, kind: SinkKind, sink: &MockSink) -> Result<()> {
            self.inner
                .log
                .record(format!("{}: attach {kind}", self.inner.name));
            let mut holder = sink.inner.holder.lock();
            if let Some(holder) = holder.as_ref() {
                bail!("{kind} sink is still attached to {holder}");
            }
            *holder = Some(self.inner.name.clone());
            *self.slot(kind).lock() = Some(sink.clone());
            Ok(())
        }

        fn detach(&self, kind: SinkKind) -> Result<()> {
            if let Some(sink) = self.slot(kind).lock().take() {
                self.inner
                    .log
                    .record(format!("{}: remove {kind}", self.inner.name));
                *sink.inner.holder.lock() = None;
            }
            Ok(())
        }
    }

    impl MediaPipeline for MockPipeline {
        type Sink = MockSink;

        fn name(&self) -> String {
            self.inner.name.clone()
        }

        fn has_audio(&self) -> bool {
            self.inner.has_audio
        }

        fn has_video(&self) -> bool {
            self.inner.has_video
        }

        fn set_state(&self, state: PlaybackState) -> Result<()> {
            self.inner.log.record(format!("{}: {state}", self.inner.name));
            *self.inner.state.lock() = state;
            for sink in [self.audio(), self.video_sink()].into_iter().flatten() {
                sink.set_state(state)?;
            }
            Ok(())
        }

        fn attach_audio_sink(&self, sink: &MockSink) -> Result<()> {
            self.attach(SinkKind::Audio, sink)
        }

        fn remove_audio_sink(&self) -> Result<()> {
            self.detach(SinkKind::Audio)
        }

        fn attach_video_sink(&self, sink: &MockSink) -> Result<()> {
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

    /// Play thread recording its calls as `thread: <call>`, state changes cascade to its members.
    #[derive(Debug, Default)]
    pub struct MockPlayThread {
        members: Mutex<Vec<MockPipeline>>,
        log: CallLog,
    }

    impl MockPlayThread {
        pub fn new(log: &CallLog) -> Self {
            Self {
                members: Mutex::new(Vec::new()),
                log: log.clone(),
            }
        }

        pub fn members(&self) -> Vec<MockPipeline> {
            self.members.lock().clone()
        }
    }

    impl PlayThread for MockPlayThread {
        type Pipeline = MockPipeline;

        fn add(&self, pipeline: &MockPipeline) -> Result<()> {
            self.log.record(format!("thread: add {}", pipeline.name()));
            let mut members = self.members.lock();
            if members.contains(pipeline) {
                bail!("{} is already in the play thread", pipeline.name());
            }
            members.push(pipeline.clone());
            Ok(())
        }

        fn remove(&self, pipeline: &MockPipeline) -> Result<()> {
            self.log.record(format!("thread: remove {}", pipeline.name()));
            let mut members = self.members.lock();
            let Some(index) = members.iter().position(|p| p == pipeline) else {
                bail!("{} is not in the play thread", pipeline.name());
            };
            members.remove(index);
            Ok(())
        }

        fn set_state(&self, state: PlaybackState) -> Result<()> {
            self.log.record(format!("thread: {state}"));
            for member in self.members() {
                member.set_state(state)?;
            }
            Ok(())
        }
    }

    pub type MockArbiter = PipelineArbiter<MockPlayThread>;

    /// Arbiter with mocks whose calls all go into one log.
    pub struct Fixture {
        pub log: CallLog,
        pub default: MockPipeline,
        pub audio: MockSink,
        pub video: MockSink,
        pub arbiter: MockArbiter,
    }

    impl Fixture {
        /// arbiter without any sinks set
        pub fn new() -> Self {
            init();
            let log = CallLog::default();
            let default = MockPipeline::media("default", &log);
            let arbiter = MockArbiter::new(MockPlayThread::new(&log), default.clone());
            Self {
                audio: MockSink::new(SinkKind::Audio, &log),
                video: MockSink::new(SinkKind::Video, &log),
                log,
                default,
                arbiter,
            }
        }

        /// arbiter with both sinks set and the default pipeline confirmed as paused
        pub fn with_sinks() -> Self {
            let mut fixture = Self::new();
            fixture.arbiter.set_audio_sink(fixture.audio.clone());
            fixture.arbiter.set_video_sink(fixture.video.clone());
            fixture
                .default
                .confirm_state(PlaybackState::Ready, PlaybackState::Paused);
            fixture.log.take();
            fixture
        }

        /// register a new pipeline with audio and video
        pub fn media(&mut self, name: &str) -> MockPipeline {
            let pipeline = MockPipeline::media(name, &self.log);
            self.arbiter.register(pipeline.clone());
            pipeline
        }
    }
}
