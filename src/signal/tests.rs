use std::{cell::RefCell, rc::Rc};

use assert_call::{call, CallRecorder};

use crate::{computed, effect, signal, untrack, watch, Signal, Trackable};

#[test]
fn set_notifies_in_subscription_order() {
    let mut cr = CallRecorder::new();
    let s = signal(1);
    let _a = s.subscribe(|v| call!("a {v}"));
    let _b = s.subscribe(|v| call!("b {v}"));
    s.set(2);
    cr.verify(["a 2", "b 2"]);
}

#[test]
fn dropped_subscription_is_not_notified() {
    let mut cr = CallRecorder::new();
    let s = signal(1);
    let a = s.subscribe(|v| call!("a {v}"));
    let _b = s.subscribe(|v| call!("b {v}"));
    drop(a);
    s.set(2);
    cr.verify("b 2");
    assert_eq!(s.subscriber_count(), 1);
}

#[test]
fn unsubscribe_during_notify_uses_snapshot() {
    let mut cr = CallRecorder::new();
    let s = signal(0);
    let slot: Rc<RefCell<Option<crate::Subscription>>> = Rc::default();
    let slot0 = slot.clone();
    let _a = s.subscribe(move |v| {
        call!("a {v}");
        slot0.borrow_mut().take();
    });
    *slot.borrow_mut() = Some(s.subscribe(|v| call!("b {v}")));

    s.set(1);
    cr.verify(["a 1", "b 1"]);
    s.set(2);
    cr.verify("a 2");
}

#[test]
fn subscribe_during_notify_waits_for_next_write() {
    let mut cr = CallRecorder::new();
    let s = signal(0);
    let subs: Rc<RefCell<Vec<crate::Subscription>>> = Rc::default();
    let s0 = s.clone();
    let subs0 = subs.clone();
    let _a = s.subscribe(move |v| {
        call!("a {v}");
        if *v == 1 {
            subs0
                .borrow_mut()
                .push(s0.subscribe(|v| call!("late {v}")));
        }
    });
    s.set(1);
    cr.verify("a 1");
    s.set(2);
    cr.verify(["a 2", "late 2"]);
}

#[test]
fn write_from_subscriber_is_delivered_after_current_round() {
    let mut cr = CallRecorder::new();
    let s = signal(0);
    let s0 = s.clone();
    let _clamp = s.subscribe(move |v| {
        call!("clamp {v}");
        if *v > 10 {
            s0.set(10);
        }
    });
    let _log = s.subscribe(|v| call!("log {v}"));
    s.set(42);
    cr.verify(["clamp 42", "log 42", "clamp 10", "log 10"]);
    assert_eq!(s.peek(), 10);
}

#[test]
fn equal_write_from_subscriber_ends_delivery() {
    let mut cr = CallRecorder::new();
    let s = signal(0);
    let s0 = s.clone();
    let _a = s.subscribe(move |v| {
        call!("{v}");
        s0.set_dedup(*v.min(&3));
    });
    s.set(7);
    cr.verify(["7", "3"]);
    assert_eq!(s.peek(), 3);
}

#[test]
fn set_dedup_skips_equal_value() {
    let mut cr = CallRecorder::new();
    let s = signal(5);
    let _a = s.subscribe(|v| call!("{v}"));
    s.set_dedup(5);
    cr.verify(());
    s.set_dedup(6);
    cr.verify("6");
    s.set(6);
    cr.verify("6");
}

#[test]
fn update_in_place() {
    let s = signal(vec![1]);
    s.update(|v| v.push(2));
    assert_eq!(s.peek(), vec![1, 2]);
}

#[test]
fn computed_is_lazy_and_memoized() {
    let mut cr = CallRecorder::new();
    let s = signal(2);
    let s0 = s.clone();
    let c = computed(move || {
        call!("eval");
        s0.get() * 10
    });
    cr.verify(());
    assert_eq!(c.get(), 20);
    assert_eq!(c.get(), 20);
    cr.verify("eval");

    s.set(3);
    assert!(c.is_dirty());
    cr.verify(());
    assert_eq!(c.get(), 30);
    cr.verify("eval");
}

#[test]
fn computed_chain() {
    let s = signal(1);
    let a = s.map(|v| v + 1);
    let a0 = a.clone();
    let b = computed(move || a0.get() * 2);
    assert_eq!(b.get(), 4);
    s.set(10);
    assert_eq!(b.get(), 22);
}

#[test]
fn computed_drops_stale_dependencies() {
    let use_a = signal(true);
    let a = signal(1);
    let b = signal(2);
    let (use_a0, a0, b0) = (use_a.clone(), a.clone(), b.clone());
    let c = computed(move || if use_a0.get() { a0.get() } else { b0.get() });
    assert_eq!(c.get(), 1);
    assert_eq!(a.subscriber_count(), 1);
    assert_eq!(b.subscriber_count(), 0);

    use_a.set(false);
    assert_eq!(c.get(), 2);
    assert_eq!(a.subscriber_count(), 0);
    assert_eq!(b.subscriber_count(), 1);
}

#[test]
fn computed_subscriber_receives_new_value() {
    let mut cr = CallRecorder::new();
    let s = signal(1);
    let c = s.map(|v| v * 100);
    assert_eq!(c.get(), 100);
    let _sub = c.subscribe(|v| call!("{v}"));
    s.set(2);
    cr.verify("200");
}

#[test]
fn computed_subscriber_may_write_its_source() {
    let mut cr = CallRecorder::new();
    let s = signal(1);
    let c = s.map(|v| v * 2);
    assert_eq!(c.get(), 2);
    let s0 = s.clone();
    let _sub = c.subscribe(move |v| {
        call!("{v}");
        if *v > 10 {
            s0.set(5);
        }
    });
    s.set(8);
    cr.verify(["16", "10"]);
    assert_eq!(c.get(), 10);
}

#[test]
fn peek_is_not_tracked() {
    let mut cr = CallRecorder::new();
    let a = signal(1);
    let b = signal(1);
    let (a0, b0) = (a.clone(), b.clone());
    let _e = effect(move || {
        call!("{} {}", a0.get(), b0.peek());
    });
    cr.verify("1 1");
    b.set(2);
    cr.verify(());
    a.set(2);
    cr.verify("2 2");
}

#[test]
fn untrack_hides_reads() {
    let mut cr = CallRecorder::new();
    let a = signal(1);
    let a0 = a.clone();
    let _e = effect(move || {
        call!("{}", untrack(|| a0.get()));
    });
    cr.verify("1");
    a.set(2);
    cr.verify(());
}

#[test]
fn watch_runs_on_listed_deps_only() {
    let mut cr = CallRecorder::new();
    let a = signal(1);
    let b = signal(1);
    let (a0, b0) = (a.clone(), b.clone());
    let w = watch(&[&a as &dyn Trackable], move || {
        call!("{} {}", a0.get(), b0.get());
    });
    cr.verify("1 1");
    b.set(2);
    cr.verify(());
    a.set(3);
    cr.verify("3 2");
    w.stop();
    a.set(4);
    cr.verify(());
}

#[test]
fn watch_on_computed() {
    let mut cr = CallRecorder::new();
    let s = signal(1);
    let c = s.map(|v| v % 2 == 0);
    let c0 = c.clone();
    let _w = watch(&[&c as &dyn Trackable], move || {
        call!("{}", c0.get());
    });
    cr.verify("false");
    s.set(2);
    cr.verify("true");
}

#[test]
fn effect_writing_its_own_dependency_reruns() {
    let mut cr = CallRecorder::new();
    let s = signal(0);
    let s0 = s.clone();
    let _e = effect(move || {
        let v = s0.get();
        call!("{v}");
        if v > 0 && v < 3 {
            s0.set(v + 1);
        }
    });
    cr.verify("0");
    s.set(1);
    cr.verify(["1", "2", "3"]);
    assert_eq!(s.peek(), 3);
}

#[test]
fn dropped_watch_unsubscribes() {
    let s = signal(0);
    let s0 = s.clone();
    let e = effect(move || {
        s0.get();
    });
    assert_eq!(s.subscriber_count(), 1);
    drop(e);
    assert_eq!(s.subscriber_count(), 0);
}

#[test]
fn serialize() {
    let s = Signal::new(vec![1, 2]);
    assert_eq!(serde_json::to_string(&s).unwrap(), "[1,2]");
    let d: Signal<Vec<i32>> = serde_json::from_str("[3]").unwrap();
    assert_eq!(d.peek(), vec![3]);
}
