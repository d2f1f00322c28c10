use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::*;
use crate::foundation::core::PixelFormat;
use crate::processor::backend::FrameProcessor;
use crate::producer::frame_producer::FrameProducer;

#[derive(Clone, Copy, Debug)]
enum Step {
    Frame,
    Eos,
    Fault,
    Panic,
}

/// Producer following a fixed script; the last step repeats forever.
struct Scripted {
    tag: u8,
    steps: Vec<Step>,
    calls: Arc<AtomicUsize>,
    following: Option<BoxedProducer>,
    leading_seen: Arc<Mutex<Option<LeadingProducer>>>,
}

impl Scripted {
    fn new(tag: u8, steps: &[Step]) -> Self {
        Self {
            tag,
            steps: steps.to_vec(),
            calls: Arc::new(AtomicUsize::new(0)),
            following: None,
            leading_seen: Arc::new(Mutex::new(None)),
        }
    }

    fn then(mut self, following: Scripted) -> Self {
        self.following = Some(Box::new(following));
        self
    }
}

impl FrameProducer for Scripted {
    fn initialize(&mut self, _processor: &dyn FrameProcessor) -> PlayoutResult<()> {
        Ok(())
    }

    fn get_frame(&mut self) -> PlayoutResult<Option<Frame>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps[n.min(self.steps.len() - 1)];
        match step {
            Step::Frame => Ok(Some(
                Frame::from_parts(1, 1, PixelFormat::Bgra, vec![self.tag, n as u8, 0, 255], vec![7, 7])
                    .unwrap(),
            )),
            Step::Eos => Ok(None),
            Step::Fault => Err(PlayoutError::producer_fault("decode failed")),
            Step::Panic => panic!("corrupted state"),
        }
    }

    fn set_leading_producer(&mut self, leading: Option<LeadingProducer>) {
        *self.leading_seen.lock() = leading;
    }

    fn take_following_producer(&mut self) -> Option<BoxedProducer> {
        self.following.take()
    }

    fn describe(&self) -> String {
        format!("scripted[{}]", self.tag)
    }
}

fn tag_of(frame: &Frame) -> u8 {
    frame.image()[0]
}

#[test]
fn never_loaded_layer_is_end_of_stream() {
    let mut layer = Layer::new(LayerId(1));
    for _ in 0..5 {
        assert!(layer.get_frame().is_none());
    }
    assert_eq!(layer.state(), LayerState::Empty);
    assert!(layer.active().is_none() && layer.background().is_none());
}

#[test]
fn preview_caches_one_silent_frame_without_activating() {
    let mut layer = Layer::new(LayerId(1));
    let p = Scripted::new(1, &[Step::Frame]);
    let calls = p.calls.clone();

    let id = layer.load(Box::new(p), LoadMode::Preview);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(layer.active().is_none());
    assert_eq!(layer.background().map(|b| b.id), Some(id));
    assert_eq!(layer.state(), LayerState::Previewing);

    let cached = layer.last_frame().cloned().unwrap();
    assert!(cached.audio().is_empty());
    assert_eq!(tag_of(&cached), 1);

    // Without an active producer the preview frame is served as is.
    let served = layer.get_frame().unwrap();
    assert!(Frame::ptr_eq(&served, &cached));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn preview_leaves_an_active_producer_untouched() {
    let mut layer = Layer::new(LayerId(1));
    let active = layer.load(Box::new(Scripted::new(1, &[Step::Frame])), LoadMode::AutoPlay);
    layer.get_frame().unwrap();

    let bg = layer.load(Box::new(Scripted::new(2, &[Step::Frame])), LoadMode::Preview);

    assert_eq!(layer.active().map(|a| a.id), Some(active));
    assert_eq!(layer.background().map(|b| b.id), Some(bg));
    assert_eq!(layer.state(), LayerState::Playing);
    assert_eq!(tag_of(&layer.get_frame().unwrap()), 1);
}

#[test]
fn auto_play_activates_and_links_leading_producer() {
    let mut layer = Layer::new(LayerId(1));
    let first = layer.load(Box::new(Scripted::new(1, &[Step::Frame])), LoadMode::AutoPlay);
    let shown = layer.get_frame().unwrap();

    let second = Scripted::new(2, &[Step::Frame]);
    let seen = second.leading_seen.clone();
    let second_id = layer.load(Box::new(second), LoadMode::AutoPlay);

    let active = layer.active().unwrap();
    assert_eq!(active.id, second_id);
    assert_eq!(active.leading, Some(first));
    let leading = seen.lock().clone().unwrap();
    assert_eq!(leading.id, first);
    // The outgoing frame survives the cache reset done by `load`.
    assert!(Frame::ptr_eq(leading.last_frame.as_ref().unwrap(), &shown));
    assert!(layer.background().is_none());
    assert_ne!(first, second_id);

    // `load` cleared the cache before the switch.
    assert!(layer.last_frame().is_none());
    assert_eq!(tag_of(&layer.get_frame().unwrap()), 2);
}

#[test]
fn leading_link_carries_the_outgoing_last_frame() {
    let mut layer = Layer::new(LayerId(1));
    let first = layer.load(Box::new(Scripted::new(1, &[Step::Frame])), LoadMode::AutoPlay);
    layer.get_frame().unwrap();

    let next = Scripted::new(2, &[Step::Frame]);
    let seen = next.leading_seen.clone();
    layer.load(Box::new(next), LoadMode::None);
    // The old producer keeps playing until `play`, refilling the cache.
    let shown = layer.get_frame().unwrap();
    layer.play();

    let leading = seen.lock().clone().unwrap();
    assert_eq!(leading.id, first);
    assert_eq!(leading.description, "scripted[1]");
    assert!(Frame::ptr_eq(leading.last_frame.as_ref().unwrap(), &shown));
    assert_eq!(layer.active().unwrap().description, "scripted[2]");
}

#[test]
fn leading_frame_after_preview_is_the_outgoing_one() {
    let mut layer = Layer::new(LayerId(1));
    layer.load(Box::new(Scripted::new(1, &[Step::Frame])), LoadMode::AutoPlay);
    let shown = layer.get_frame().unwrap();

    let next = Scripted::new(2, &[Step::Frame]);
    let seen = next.leading_seen.clone();
    layer.load(Box::new(next), LoadMode::Preview);
    assert_eq!(tag_of(layer.last_frame().unwrap()), 2);
    layer.play();

    let leading = seen.lock().clone().unwrap();
    assert_eq!(leading.description, "scripted[1]");
    let last = leading.last_frame.unwrap();
    assert_eq!(tag_of(&last), 1);
    assert!(Frame::ptr_eq(&last, &shown));
    assert_eq!(last.audio(), &[7, 7]);
}

#[test]
fn leading_frame_is_dropped_by_stop() {
    let mut layer = Layer::new(LayerId(1));
    layer.load(Box::new(Scripted::new(1, &[Step::Frame])), LoadMode::AutoPlay);
    layer.get_frame().unwrap();
    layer.stop();

    let next = Scripted::new(2, &[Step::Frame]);
    let seen = next.leading_seen.clone();
    layer.load(Box::new(next), LoadMode::AutoPlay);
    assert!(seen.lock().is_none());
    assert_eq!(layer.active().unwrap().leading, None);
}

#[test]
fn first_auto_play_has_no_leading_producer() {
    let mut layer = Layer::new(LayerId(1));
    let p = Scripted::new(1, &[Step::Frame]);
    let seen = p.leading_seen.clone();
    layer.load(Box::new(p), LoadMode::AutoPlay);
    assert_eq!(layer.active().unwrap().leading, None);
    assert!(seen.lock().is_none());
}

#[test]
fn pause_freezes_output_without_calling_the_producer() {
    let mut layer = Layer::new(LayerId(1));
    let p = Scripted::new(1, &[Step::Frame]);
    let calls = p.calls.clone();
    layer.load(Box::new(p), LoadMode::AutoPlay);
    let frozen = layer.get_frame().unwrap();

    layer.pause();
    assert_eq!(layer.state(), LayerState::Paused);
    let before = calls.load(Ordering::SeqCst);
    for _ in 0..50 {
        let f = layer.get_frame().unwrap();
        assert!(Frame::ptr_eq(&f, &frozen));
        assert_eq!(f, frozen);
    }
    assert_eq!(calls.load(Ordering::SeqCst), before);

    // `play` without a background producer resumes.
    layer.play();
    assert_eq!(layer.state(), LayerState::Playing);
    let next = layer.get_frame().unwrap();
    assert_eq!(next.image()[1], 1);
    assert_eq!(calls.load(Ordering::SeqCst), before + 1);
}

#[test]
fn fault_on_third_call_blanks_the_layer() {
    let mut layer = Layer::new(LayerId(1));
    let p = Scripted::new(1, &[Step::Frame, Step::Frame, Step::Fault, Step::Frame]);
    let calls = p.calls.clone();
    layer.load(Box::new(p), LoadMode::AutoPlay);

    assert!(layer.get_frame().is_some());
    assert!(layer.get_frame().is_some());
    assert!(layer.get_frame().is_none());
    assert!(layer.active().is_none());
    assert!(layer.last_frame().is_none());
    assert_eq!(layer.state(), LayerState::Empty);
    for _ in 0..3 {
        assert!(layer.get_frame().is_none());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(layer.take_faults(), 1);
    assert_eq!(layer.take_faults(), 0);
}

#[test]
fn producer_panic_is_contained_as_a_fault() {
    let mut layer = Layer::new(LayerId(1));
    layer.load(Box::new(Scripted::new(1, &[Step::Frame, Step::Panic])), LoadMode::AutoPlay);

    assert!(layer.get_frame().is_some());
    assert!(layer.get_frame().is_none());
    assert!(layer.active().is_none());
    assert_eq!(layer.take_faults(), 1);
}

#[test]
fn chain_continues_without_a_gap() {
    let c = Scripted::new(3, &[Step::Frame]);
    let b = Scripted::new(2, &[Step::Frame, Step::Eos]).then(c);
    let a = Scripted::new(1, &[Step::Frame, Step::Eos]).then(b);

    let mut layer = Layer::new(LayerId(1));
    let a_id = layer.load(Box::new(a), LoadMode::AutoPlay);

    let tags: Vec<u8> = (0..6)
        .map(|_| tag_of(&layer.get_frame().expect("no gap in the chain")))
        .collect();
    assert_eq!(tags, vec![1, 2, 3, 3, 3, 3]);

    let active = layer.active().unwrap();
    assert_eq!(active.description, "scripted[3]");
    assert_ne!(active.id, a_id);
}

#[test]
fn exhausted_producer_without_following_blanks_the_layer() {
    let mut layer = Layer::new(LayerId(1));
    layer.load(Box::new(Scripted::new(1, &[Step::Frame, Step::Eos])), LoadMode::AutoPlay);
    assert!(layer.get_frame().is_some());
    assert!(layer.get_frame().is_none());
    assert!(layer.active().is_none());
    assert_eq!(layer.take_faults(), 0);
}

#[test]
fn stop_drops_active_and_cache_but_keeps_background() {
    let mut layer = Layer::new(LayerId(1));
    layer.load(Box::new(Scripted::new(1, &[Step::Frame])), LoadMode::AutoPlay);
    layer.get_frame().unwrap();
    let bg = layer.load(Box::new(Scripted::new(2, &[Step::Frame])), LoadMode::None);

    layer.stop();
    assert!(layer.active().is_none());
    assert!(layer.last_frame().is_none());
    assert_eq!(layer.background().map(|b| b.id), Some(bg));
    assert!(layer.get_frame().is_none());

    layer.play();
    assert_eq!(tag_of(&layer.get_frame().unwrap()), 2);
}

#[test]
fn clear_returns_to_empty() {
    let mut layer = Layer::new(LayerId(1));
    layer.load(Box::new(Scripted::new(1, &[Step::Frame])), LoadMode::AutoPlay);
    layer.load(Box::new(Scripted::new(2, &[Step::Frame])), LoadMode::Preview);
    layer.pause();

    layer.clear();
    assert_eq!(layer.state(), LayerState::Empty);
    assert!(!layer.is_paused());
    assert!(layer.get_frame().is_none());
}

#[test]
fn load_without_mode_only_sets_background() {
    let mut layer = Layer::new(LayerId(1));
    let p = Scripted::new(1, &[Step::Frame]);
    let calls = p.calls.clone();
    let id = layer.load(Box::new(p), LoadMode::None);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(layer.background().map(|b| b.id), Some(id));
    assert!(layer.get_frame().is_none());
}

#[test]
fn preview_of_a_faulting_producer_still_loads_it() {
    let mut layer = Layer::new(LayerId(1));
    let id = layer.load(Box::new(Scripted::new(1, &[Step::Fault])), LoadMode::Preview);
    assert_eq!(layer.background().map(|b| b.id), Some(id));
    assert!(layer.last_frame().is_none());
    assert_eq!(layer.take_faults(), 1);

    layer.play();
    assert!(layer.get_frame().is_none());
    assert!(layer.active().is_none());
}

#[test]
fn load_mode_parses_aliases() {
    assert_eq!("preview".parse::<LoadMode>().unwrap(), LoadMode::Preview);
    assert_eq!("AUTO_PLAY".parse::<LoadMode>().unwrap(), LoadMode::AutoPlay);
    assert_eq!("autoplay".parse::<LoadMode>().unwrap(), LoadMode::AutoPlay);
    assert_eq!("none".parse::<LoadMode>().unwrap(), LoadMode::None);
    assert!(matches!(
        "loop".parse::<LoadMode>().unwrap_err(),
        PlayoutError::InvalidArgument(_)
    ));
    assert_eq!(
        serde_json::from_str::<LoadMode>("\"auto_play\"").unwrap(),
        LoadMode::AutoPlay
    );
}
