use std::{cell::RefCell, rc::Rc};

use proptest::prelude::*;
use rxmarble::{
  marble::{parse_subscription_window, parse_timeline},
  prelude::*,
};

type Log = Rc<RefCell<Vec<usize>>>;

fn ms(v: u64) -> Duration { Duration::from_millis(v) }

fn chain(clock: &TestScheduler, log: Log, depth: usize) {
  let c_clock = clock.clone();
  clock.schedule_once(
    move || {
      log.borrow_mut().push(depth);
      if depth > 0 {
        chain(&c_clock, log, depth - 1);
      }
    },
    None,
  );
}

proptest! {
  #[test]
  fn actions_run_by_due_time_then_insertion(delays in prop::collection::vec(0u64..20, 1..60)) {
    let clock = TestScheduler::new();
    let log = Log::default();
    for (idx, delay) in delays.iter().enumerate() {
      let log = log.clone();
      clock.schedule_once(move || log.borrow_mut().push(idx), Some(ms(*delay)));
    }
    clock.flush().unwrap();

    let mut expected: Vec<usize> = (0..delays.len()).collect();
    expected.sort_by_key(|idx| (delays[*idx], *idx));
    prop_assert_eq!(&*log.borrow(), &expected);
  }

  #[test]
  fn cancelled_actions_never_run(plan in prop::collection::vec((0u64..10, any::<bool>()), 1..60)) {
    let clock = TestScheduler::new();
    let log = Log::default();
    let handles: Vec<_> = plan
      .iter()
      .enumerate()
      .map(|(idx, (delay, _))| {
        let log = log.clone();
        clock.schedule_once(move || log.borrow_mut().push(idx), Some(ms(*delay)))
      })
      .collect();
    for (handle, (_, cancel)) in handles.iter().zip(&plan) {
      if *cancel {
        clock.cancel(handle);
      }
    }
    clock.flush().unwrap();

    let ran = log.borrow();
    for (idx, (_, cancel)) in plan.iter().enumerate() {
      prop_assert_eq!(ran.contains(&idx), !*cancel);
    }
    prop_assert!(clock.is_empty());
  }

  #[test]
  fn recursion_at_the_current_instant_is_flattened(depth in 0usize..300) {
    let clock = TestScheduler::new();
    let log = Log::default();
    chain(&clock, log.clone(), depth);
    clock.advance_to(Duration::ZERO).unwrap();
    prop_assert_eq!(log.borrow().len(), depth + 1);
    prop_assert!(clock.is_empty());
  }

  #[test]
  fn clock_never_goes_back(targets in prop::collection::vec(0u64..100, 1..20)) {
    let clock = TestScheduler::new();
    let mut last = clock.now();
    for target in targets {
      clock.advance_to(ms(target)).unwrap();
      let now = clock.now();
      prop_assert!(now >= last);
      prop_assert!(now >= ms(target));
      last = now;
    }
  }

  #[test]
  fn parsing_is_pure(marbles in "[-ab|#()^ ]{0,24}") {
    let parse = || {
      parse_timeline::<char, TestError, _>(&marbles, &Symbols, None, ParseOptions::default())
    };
    prop_assert_eq!(parse(), parse());
  }

  #[test]
  fn subscription_parsing_is_pure(marbles in "[-^!() ]{0,16}") {
    let options = ParseOptions::default();
    prop_assert_eq!(
      parse_subscription_window(&marbles, options),
      parse_subscription_window(&marbles, options)
    );
  }

  #[test]
  fn dash_runs_place_values(gaps in prop::collection::vec(0usize..6, 1..8)) {
    let mut marbles = String::new();
    let mut expected = vec![];
    let mut frame = 0i64;
    for gap in &gaps {
      marbles.push_str(&"-".repeat(*gap));
      frame += *gap as i64;
      marbles.push('x');
      expected.push(TestMessage::next(Frame::from_millis(frame), 'x'));
      frame += 1;
    }
    marbles.push('|');
    expected.push(TestMessage::complete(Frame::from_millis(frame)));

    let parsed: Vec<TestMessage<char, TestError>> =
      parse_timeline(&marbles, &Symbols, None, ParseOptions::default()).unwrap();
    prop_assert_eq!(parsed, expected);
  }
}
