//! Media capability - transport control and excerpt playback with chaining.
//!
//! `media.play(from, to, then)` establishes the single *global* excerpt
//! cuepoint over `[from, to]` (either bound open), seeks to `from` if
//! given, and starts playback. The chaining rule:
//!
//! - `on_start` of the (possibly new) excerpt window first fires a pending
//!   `then` left over from an earlier excerpt, then stores the newly
//!   supplied `then` as the pending one,
//! - `on_stop` (the window's end reached during forward playback) pauses
//!   the media and leaves the pending `then` for a later excerpt start,
//! - `on_seekout` (the window abandoned by a seek) destroys the cuepoint
//!   and fires the pending `then` immediately.
//!
//! So "excerpt finished naturally" defers the continuation until the next
//! excerpt begins, while "excerpt abandoned by seeking" runs it right away.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rhai::{Dynamic, Engine};

use crate::host::{CuepointHandler, CuepointScheduler, CuepointSpec, Transport};
use crate::types::CuepointId;

use super::{Capability, ScriptCallback, ScriptEnv, opt_seconds};

/// Neutral playback rate restored on reset.
const NEUTRAL_RATE: f64 = 1.0;

/// Continuation run when an excerpt window is exited or superseded.
pub type ThenCallback = Rc<dyn Fn()>;

#[derive(Default)]
struct MediaState {
    /// The live global excerpt cuepoint, if any.
    global: Option<CuepointId>,
    /// At most one pending continuation exists at a time.
    pending_then: Option<ThenCallback>,
}

pub struct MediaCapability {
    transport: Rc<dyn Transport>,
    scheduler: Rc<dyn CuepointScheduler>,
    env: Rc<ScriptEnv>,
    state: Rc<RefCell<MediaState>>,
}

impl MediaCapability {
    pub fn new(
        transport: Rc<dyn Transport>,
        scheduler: Rc<dyn CuepointScheduler>,
        env: Rc<ScriptEnv>,
    ) -> Self {
        Self {
            transport,
            scheduler,
            env,
            state: Rc::new(RefCell::new(MediaState::default())),
        }
    }

    /// Start playback, optionally as an excerpt with a chained continuation.
    pub fn play(&self, from: Option<f64>, to: Option<f64>, then: Option<ThenCallback>) {
        if from.is_none() && to.is_none() && then.is_none() {
            self.transport.play();
            return;
        }

        // Supersede the previous excerpt before moving the position. Its
        // window may still be registered (a naturally finished excerpt
        // keeps its cuepoint), and seeking back into it would re-fire the
        // stale hooks. A pending continuation survives the removal and
        // fires at the new window's start.
        let previous = self.state.borrow_mut().global.take();
        if let Some(previous) = previous {
            self.scheduler.remove(previous);
        }

        if let Some(from) = from {
            self.transport.seek_to(from);
        }

        let slot = Rc::new(Cell::new(None));
        let hooks = ExcerptHooks {
            state: Rc::clone(&self.state),
            transport: Rc::clone(&self.transport),
            scheduler: Rc::clone(&self.scheduler),
            then,
            slot: Rc::clone(&slot),
        };
        let id = self
            .scheduler
            .set_global_cuepoint(CuepointSpec::new(from, to, Rc::new(hooks)));
        slot.set(Some(id));
        self.state.borrow_mut().global = Some(id);

        self.transport.play();
    }

    /// Cancel the active excerpt without running its continuation.
    pub fn exit_excerpt(&self) {
        let id = self.state.borrow_mut().global.take();
        if let Some(id) = id {
            self.scheduler.remove(id);
        }
        self.state.borrow_mut().pending_then = None;
    }

    /// True when an excerpt window is currently registered.
    pub fn has_excerpt(&self) -> bool {
        self.state.borrow().global.is_some()
    }
}

struct ExcerptHooks {
    state: Rc<RefCell<MediaState>>,
    transport: Rc<dyn Transport>,
    scheduler: Rc<dyn CuepointScheduler>,
    then: Option<ThenCallback>,
    /// Own cuepoint id, filled in right after registration.
    slot: Rc<Cell<Option<CuepointId>>>,
}

impl CuepointHandler for ExcerptHooks {
    fn on_start(&self) {
        let previous = self.state.borrow_mut().pending_then.take();
        if let Some(previous) = previous {
            previous();
        }
        self.state.borrow_mut().pending_then = self.then.clone();
    }

    fn on_stop(&self) {
        // Natural end of the window: stay paused, keep the continuation
        // pending for the next excerpt start.
        self.transport.pause();
    }

    fn on_seekout(&self) {
        let Some(id) = self.slot.get() else { return };
        self.scheduler.remove(id);
        let pending = {
            let mut state = self.state.borrow_mut();
            if state.global == Some(id) {
                state.global = None;
            }
            state.pending_then.take()
        };
        if let Some(pending) = pending {
            pending();
        }
    }
}

impl Capability for MediaCapability {
    fn name(&self) -> &'static str {
        "media"
    }

    fn install(&self, engine: &mut Engine) {
        let transport = Rc::clone(&self.transport);
        engine.register_fn("media_get_duration", move || -> f64 {
            transport.duration().get()
        });

        let transport = Rc::clone(&self.transport);
        engine.register_fn("media_get_time", move || -> f64 {
            transport.time().get()
        });

        let transport = Rc::clone(&self.transport);
        engine.register_fn("media_set_time", move |time: Dynamic| {
            if let Some(time) = opt_seconds(&time) {
                transport.seek_to(time);
            }
        });

        let transport = Rc::clone(&self.transport);
        engine.register_fn("media_is_playing", move || -> bool {
            transport.playing().get()
        });

        let media = self.handle();
        let env = Rc::clone(&self.env);
        engine.register_fn(
            "media_play",
            move |from: Dynamic, to: Dynamic, then: Dynamic| {
                let then = ScriptCallback::from_dynamic(&env, then)
                    .map(|callback| Rc::new(move || callback.call(())) as ThenCallback);
                media.play(opt_seconds(&from), opt_seconds(&to), then);
            },
        );

        let media = self.handle();
        engine.register_fn("media_exit_excerpt", move || {
            media.exit_excerpt();
        });

        let transport = Rc::clone(&self.transport);
        engine.register_fn("media_pause", move || {
            transport.pause();
        });

        let transport = Rc::clone(&self.transport);
        engine.register_fn("media_stop", move || {
            transport.stop();
        });

        let transport = Rc::clone(&self.transport);
        engine.register_fn("media_get_playback_rate", move || -> f64 {
            transport.playback_rate().get()
        });

        let transport = Rc::clone(&self.transport);
        engine.register_fn("media_set_playback_rate", move |rate: Dynamic| {
            if let Some(rate) = opt_seconds(&rate) {
                transport.set_playback_rate(rate);
            }
        });
    }

    fn namespace(&self) -> String {
        r#"#{
    getDuration: || media_get_duration(),
    getTime: || media_get_time(),
    setTime: |time| media_set_time(time),
    isPlaying: || media_is_playing(),
    play: |from, to, then| media_play(from, to, then),
    exitExcerpt: || media_exit_excerpt(),
    pause: || media_pause(),
    stop: || media_stop(),
    getPlaybackRate: || media_get_playback_rate(),
    setPlaybackRate: |rate| media_set_playback_rate(rate)
}"#
        .to_string()
    }

    fn reset(&self) {
        self.exit_excerpt();
        self.transport.pause();
        self.transport.set_playback_rate(NEUTRAL_RATE);
    }
}

impl MediaCapability {
    /// A cheap clone sharing the same state, for moving into engine closures.
    fn handle(&self) -> MediaCapability {
        MediaCapability {
            transport: Rc::clone(&self.transport),
            scheduler: Rc::clone(&self.scheduler),
            env: Rc::clone(&self.env),
            state: Rc::clone(&self.state),
        }
    }
}
