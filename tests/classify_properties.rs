use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use taskwarden::Invocation;
use taskwarden::exec::collector::outcome_handler;
use taskwarden::exec::{ErrorKind, Outcome, ResultCollector, TerminationStatus, classify};

fn invocation() -> Invocation {
    Invocation::new("/bin/sh").arg("-c").arg("true")
}

proptest! {
    #[test]
    fn nonzero_exit_codes_are_preserved(code in any::<i32>().prop_filter("nonzero", |c| *c != 0)) {
        let err = classify(TerminationStatus::exited(code), None, &invocation()).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::NonzeroExit);
        prop_assert_eq!(err.exit_code(), Some(code));
    }

    #[test]
    fn any_signal_is_uncaught_signal(signal in 0i32..128, stderr in proptest::option::of(".*")) {
        let err = classify(TerminationStatus::signaled(signal), stderr.as_deref(), &invocation())
            .unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::UncaughtSignal);
        prop_assert_eq!(err.exit_code(), None);
        prop_assert_eq!(err.context().stderr.clone(), stderr);
    }

    #[test]
    fn collector_concatenates_and_reports_once(
        out_chunks in proptest::collection::vec(".{0,16}", 0..12),
        err_chunks in proptest::collection::vec(".{0,16}", 0..12),
        extra in proptest::collection::vec(".{0,8}", 0..4),
    ) {
        let calls: Arc<Mutex<Vec<Outcome>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let mut collector = ResultCollector::new(
            invocation(),
            outcome_handler(move |o| sink.lock().unwrap().push(o)),
        );

        for chunk in &out_chunks {
            collector.on_stdout(chunk);
        }
        for chunk in &err_chunks {
            collector.on_stderr(chunk);
        }
        collector.on_terminated(TerminationStatus::exited(0));
        for chunk in &extra {
            collector.on_stdout(chunk);
            collector.on_terminated(TerminationStatus::exited(1));
        }

        let calls = calls.lock().unwrap();
        prop_assert_eq!(calls.len(), 1);

        let expected_out = (!out_chunks.is_empty()).then(|| out_chunks.concat());
        let expected_err = (!err_chunks.is_empty()).then(|| err_chunks.concat());
        prop_assert_eq!(calls[0].stdout.clone(), expected_out);
        prop_assert_eq!(calls[0].stderr.clone(), expected_err);
        prop_assert!(calls[0].is_success());
    }
}
