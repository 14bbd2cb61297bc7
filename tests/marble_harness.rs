use std::{
  cell::RefCell,
  collections::HashMap,
  panic::{catch_unwind, panic_any, AssertUnwindSafe},
  rc::Rc,
};

use futures::channel::oneshot;
use rxmarble::{
  marble::{parse_subscription_window, parse_timeline, RunPhase},
  prelude::*,
  scheduler::ambient,
};

fn ms(v: i64) -> Frame { Frame::from_millis(v) }

/// Runs a task on the ambient binding, whatever it is, and tells whether it
/// landed on `clock`.
fn ambient_is(clock: &TestScheduler) -> bool {
  let before = clock.pending_count();
  let handle = AmbientScheduler.schedule_once(|| {}, Some(Duration::from_millis(1)));
  let landed = clock.pending_count() == before + 1;
  handle.cancel();
  landed
}

#[rxmarble_macro::test]
fn combine_latest_end_to_end() {
  let outer = TestScheduler::new();
  let _outer = ambient::install(Rc::new(outer.clone()));

  MarbleRunner::new()
    .run(|h| {
      assert!(!ambient_is(&outer));
      let e1 = h.cold::<char>("---a----b----c----|")?;
      let e2 = h.cold::<char>("--d--e--f--g--|")?;
      let e1_subs = e1.subscriptions();
      let e2_subs = e2.subscriptions();

      let values: HashMap<char, String> = [
        ('u', "ad"),
        ('v', "ae"),
        ('w', "be"),
        ('x', "bf"),
        ('y', "bg"),
        ('z', "cg"),
      ]
      .into_iter()
      .map(|(k, v)| (k, v.to_owned()))
      .collect();

      let combined = e1.combine_latest(e2, |a, b| format!("{a}{b}"));
      h.expect_observable(combined).to_be_with("---u-v--(wx)--y-z----|", &values, None)?;
      h.expect_subscriptions(e1_subs).to_be(&["^-----------------!"])?;
      h.expect_subscriptions(e2_subs).to_be(&["^-------------!"])
    })
    .unwrap();

  assert!(ambient_is(&outer));
}

#[rxmarble_macro::test]
fn cold_replays_per_subscriber_and_hot_does_not() {
  MarbleRunner::new()
    .run(|h| {
      let cold = h.cold::<char>("--a--b--|")?;
      h.expect_observable_with_subscription(cold, "----------^")
        .to_be("------------a--b--|")?;

      let hot = h.hot::<char>("--a--b--|")?;
      h.expect_observable_with_subscription(hot, "---^").to_be("-----b--|")
    })
    .unwrap();
}

#[rxmarble_macro::test]
fn resubscribing_records_one_window_per_subscription() {
  MarbleRunner::new()
    .run(|h| {
      let source = h.cold::<char>("-a-|")?;
      let subs = source.subscriptions();
      let twice = source.clone().merge(source.delay(Duration::from_millis(1), h.scheduler()));
      h.expect_observable(twice).to_be("-aa-|")?;
      h.expect_subscriptions(subs).to_be(&["^--!", "^--!"])
    })
    .unwrap();
}

#[rxmarble_macro::test]
fn long_delays_without_a_frame_ceiling() {
  MarbleRunner::new()
    .run(|h| {
      let source = h.cold::<char>("a 999ms b|")?;
      let delayed = source.delay(Duration::from_secs(3600), h.scheduler());
      h.expect_observable(delayed).to_be("60m a 999ms b|")
    })
    .unwrap();
}

#[rxmarble_macro::test]
fn mismatch_reports_both_timelines() {
  let err = MarbleRunner::new()
    .run(|h| {
      let source = h.cold::<char>("-a-b|")?;
      h.expect_observable(source).to_be("-a-c|")
    })
    .unwrap_err();
  let text = err.to_string();
  assert!(text.contains("notifications mismatch"), "{text}");
  assert!(text.contains("expected 3ms: next('c'), got 3ms: next('b')"), "{text}");
  assert!(text.contains("actual:   [1ms: next('a'), 3ms: next('b'), 4ms: complete]"), "{text}");
}

#[rxmarble_macro::test]
fn error_in_the_body_still_tears_down() {
  let outer = TestScheduler::new();
  let _outer = ambient::install(Rc::new(outer.clone()));
  let runner = MarbleRunner::new();

  let err = runner
    .run(|h| {
      h.expect_observable(h.cold::<char>("a|")?).to_be("a|")?;
      h.cold::<char>("a|b")?;
      Ok(())
    })
    .unwrap_err();
  assert!(matches!(err, MarbleError::Syntax { .. }));
  assert!(ambient_is(&outer));
  assert_eq!(runner.phase(), RunPhase::Idle);

  runner
    .run(|h| h.expect_observable(h.cold::<char>("-a|")?).to_be("-a|"))
    .unwrap();
}

#[rxmarble_macro::test]
fn panic_in_the_body_still_tears_down() {
  #[derive(Debug)]
  struct Custom;

  let outer = TestScheduler::new();
  let _outer = ambient::install(Rc::new(outer.clone()));
  let runner = MarbleRunner::new();

  let payloads: Vec<Box<dyn Fn()>> = vec![
    Box::new(|| panic!("plain message")),
    Box::new(|| panic_any(Custom)),
    Box::new(|| panic_any(7_u32)),
  ];
  for raise in payloads {
    let result = catch_unwind(AssertUnwindSafe(|| {
      runner.run(|h| {
        h.expect_observable(h.cold::<char>("a|")?).to_be("a|")?;
        raise();
        Ok(())
      })
    }));
    assert!(result.is_err());
    assert!(ambient_is(&outer));
    assert_eq!(runner.phase(), RunPhase::Idle);
  }

  runner.run(|_| Ok(())).unwrap();
}

#[rxmarble_macro::test]
fn helpers_outliving_their_run_are_rejected() {
  let runner = MarbleRunner::new();
  let kept = runner.run(|h| Ok(h.clone())).unwrap();
  assert_eq!(kept.flush(), Err(MarbleError::AlreadyFlushed));
  assert_eq!(runner.flush(), Err(MarbleError::AlreadyFlushed));

  // A new run does not revive the old helpers.
  runner
    .run(|_| {
      assert_eq!(kept.flush(), Err(MarbleError::AlreadyFlushed));
      Ok(())
    })
    .unwrap();
}

#[rxmarble_macro::test]
fn nested_runs_are_rejected() {
  let runner = MarbleRunner::new();
  runner
    .run(|h| {
      assert_eq!(runner.run(|_| Ok(())), Err(MarbleError::NestedRun));
      h.expect_observable(h.cold::<char>("a|")?).to_be("a|")
    })
    .unwrap();
}

#[rxmarble_macro::test]
fn explicit_flush_then_more_expectations() {
  MarbleRunner::new()
    .run(|h| {
      let source = h.cold::<char>("--a|")?;
      h.expect_observable(source.clone()).to_be("--a|")?;
      h.flush()?;
      h.expect_observable(source).to_be("-----a|")?;
      h.flush()
    })
    .unwrap();
}

#[rxmarble_macro::test]
async fn async_value_settles_after_virtual_time() {
  let value = MarbleRunner::new()
    .run_future(|h| {
      let (tx, rx) = oneshot::channel();
      let tx = Rc::new(RefCell::new(Some(tx)));
      let source = h.cold::<i32>("-1-2-3|")?;
      source
        .map(|v| v * 2)
        .subscribe(move |v| {
          if v == 6 {
            if let Some(tx) = tx.borrow_mut().take() {
              let _ = tx.send(v);
            }
          }
        });
      Ok(rx)
    })
    .await
    .unwrap();
  assert_eq!(value, Ok(6));
}

#[rxmarble_macro::test]
fn parser_examples() {
  let values = HashMap::from([('a', 'A'), ('b', 'B')]);
  let messages: Vec<TestMessage<char, TestError>> =
    parse_timeline("--a--b--|", &values, None, ParseOptions::default()).unwrap();
  assert_eq!(
    messages,
    vec![
      TestMessage::next(ms(2), 'A'),
      TestMessage::next(ms(5), 'B'),
      TestMessage::complete(ms(8)),
    ]
  );

  let window = parse_subscription_window("---^---!", ParseOptions::default()).unwrap();
  assert_eq!(window, SubscriptionLog::new(ms(3), Some(ms(7))));
  let window = parse_subscription_window("---(^!)", ParseOptions::default()).unwrap();
  assert_eq!(window, SubscriptionLog::new(ms(3), Some(ms(3))));
}

#[rxmarble_macro::test(trace)]
fn custom_error_values() {
  MarbleRunner::new()
    .run(|h| {
      let boom = TestError::named("TimeoutError", "too slow");
      let values = HashMap::from([('a', 1), ('b', 2)]);
      let source = h.cold_with("-a-b-#", &values, Some(boom.clone()))?;
      h.expect_observable(source.map(|v: i32| v + 1)).to_be_with(
        "-x-y-#",
        &HashMap::from([('x', 2), ('y', 3)]),
        Some(boom),
      )
    })
    .unwrap();
}
