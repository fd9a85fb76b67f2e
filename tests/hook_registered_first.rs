//! A hook registered before the diagnostic stack is first used. Kept in its
//! own test binary so that nothing else touches the stack first.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

use logical_stack::{
    DiagnosticStack, Report, annotation_of,
    hooks::report_creation::{
        ReportCreationHook, register_report_creation_hook, registered_hook_count,
    },
};

struct DepthHook(Arc<AtomicUsize>);

impl ReportCreationHook for DepthHook {
    fn on_creation(&self, report: &mut Report) {
        self.0.fetch_add(1, Ordering::SeqCst);
        report.push_attachment(format!("depth {}", DiagnosticStack::depth()));
    }
}

struct RegisteringHook;

impl ReportCreationHook for RegisteringHook {
    fn on_creation(&self, _report: &mut Report) {
        if registered_hook_count() < 8 {
            register_report_creation_hook(NoopHook);
        }
    }
}

struct NoopHook;

impl ReportCreationHook for NoopHook {
    fn on_creation(&self, _report: &mut Report) {}
}

#[test]
fn test_hook_may_use_the_stack_before_it_was_installed() {
    let calls = Arc::new(AtomicUsize::new(0));
    register_report_creation_hook(DepthHook(Arc::clone(&calls)));
    register_report_creation_hook(RegisteringHook);

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let first = Report::msg("first");
        let second = {
            let _frame = DiagnosticStack::enter("Worker.run()");
            Report::msg("second")
        };
        let _ = tx.send((first, second));
    });
    let (first, second) = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("report creation did not finish");

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(first.attachments()[0].to_string(), "depth 0");
    assert_eq!(annotation_of(&first), "");

    // The collector installed by the first report's hook applies from then on.
    assert_eq!(second.attachments()[0].to_string(), "depth 1");
    assert_eq!(annotation_of(&second), "   Worker.run()\n");
    assert!(registered_hook_count() > 3);
}
