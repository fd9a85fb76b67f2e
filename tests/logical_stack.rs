//! End-to-end behavior of the diagnostic stack across tasks, threads and
//! error reports.

use std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    sync::{Arc, mpsc},
    task::{Context as TaskContext, Poll, Waker},
    thread,
    time::Duration,
};

use logical_stack::{
    DiagnosticStack, EmptyStackError, InstrumentExt, IteratorExt, PropagateExt, Report,
    ReportCollection, ResultExt, Signature, annotation_of, enter, format_report, report, task,
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct InvalidOperation(&'static str);

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

fn frames() -> Vec<String> {
    DiagnosticStack::current()
        .iter()
        .map(|label| label.to_string())
        .collect()
}

#[test]
fn test_push_pop_balance() {
    init_logging();
    let before = frames();
    {
        let _a = DiagnosticStack::enter("a");
        {
            let _b = DiagnosticStack::enter("b");
            let _c = enter!("c");
            assert_eq!(DiagnosticStack::depth(), before.len() + 3);
        }
        let _d = DiagnosticStack::enter("d");
    }
    assert_eq!(frames(), before);
}

#[test]
fn test_idempotent_scope_disposal() {
    let _outer = DiagnosticStack::enter("outer");
    let mut guard = DiagnosticStack::enter("inner");

    assert_eq!(guard.dispose(), Ok(()));
    assert_eq!(guard.dispose(), Ok(()));
    assert!(!guard.is_active());
    assert_eq!(frames(), ["outer"]);

    drop(guard);
    assert_eq!(frames(), ["outer"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_isolation_under_fan_out() {
    init_logging();
    let _a = DiagnosticStack::enter("A");
    let barrier = Arc::new(tokio::sync::Barrier::new(2));

    let child = |label: &'static str| {
        let barrier = Arc::clone(&barrier);
        task::spawn(async move {
            let _frame = DiagnosticStack::enter(label);
            // Both children hold their frame at the same time.
            barrier.wait().await;
            tokio::task::yield_now().await;
            frames()
        })
    };
    let (b, c) = (child("B"), child("C"));

    assert_eq!(b.await.unwrap(), ["B", "A"]);
    assert_eq!(c.await.unwrap(), ["C", "A"]);
    assert_eq!(frames(), ["A"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_join_of_propagated_branches() {
    let _a = DiagnosticStack::enter("A");
    let branch = |label: &'static str| {
        async move {
            let _frame = DiagnosticStack::enter(label);
            tokio::task::yield_now().await;
            frames()
        }
        .propagate()
    };

    let (b, c) = tokio::join!(branch("B"), branch("C"));
    assert_eq!(b, ["B", "A"]);
    assert_eq!(c, ["C", "A"]);
    assert_eq!(frames(), ["A"]);
}

#[test]
fn test_suspension_transparency_across_threads() {
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let mut future: Pin<Box<dyn Future<Output = Vec<String>> + Send>> = Box::pin(
        async move {
            let _x = DiagnosticStack::enter("X");
            let _ = rx.await;
            let _y = DiagnosticStack::enter("Y");
            frames()
        }
        .propagate(),
    );

    let first_worker = thread::current().id();
    let mut cx = TaskContext::from_waker(Waker::noop());
    assert!(future.as_mut().poll(&mut cx).is_pending());
    assert!(DiagnosticStack::is_empty());

    tx.send(()).unwrap();
    let seen = thread::spawn(move || {
        assert_ne!(thread::current().id(), first_worker);
        let mut cx = TaskContext::from_waker(Waker::noop());
        let Poll::Ready(seen) = future.as_mut().poll(&mut cx) else {
            panic!("future should complete after the send");
        };
        assert!(DiagnosticStack::is_empty());
        seen
    })
    .join()
    .unwrap();

    assert_eq!(seen, ["Y", "X"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_suspension_transparency_on_runtime() {
    let seen = task::spawn(async {
        let _x = DiagnosticStack::enter("X");
        for _ in 0..8 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let _y = DiagnosticStack::enter("Y");
        frames()
    })
    .await
    .unwrap();

    assert_eq!(seen, ["Y", "X"]);
}

#[test]
fn test_empty_stack_pop() {
    let other = thread::spawn(|| {
        let _frame = DiagnosticStack::enter("other operation");
        thread::sleep(Duration::from_millis(20));
        frames()
    });

    assert_eq!(DiagnosticStack::pop(), Err(EmptyStackError));
    assert!(DiagnosticStack::is_empty());
    assert_eq!(other.join().unwrap(), ["other operation"]);
}

fn load_settings() -> Result<(), Report> {
    let _frame = DiagnosticStack::enter("Settings.load()");
    let _parse = DiagnosticStack::enter("Settings.parse(str text)");
    Err(InvalidOperation("bad header"))?;
    Ok(())
}

fn start() -> Result<(), Report> {
    let _frame = DiagnosticStack::enter("App.start()");
    load_settings()?;
    Ok(())
}

#[test]
fn test_first_capture_wins() {
    let _main = DiagnosticStack::enter("Program.Main()");
    let report = start().unwrap_err();
    let expected = "   Settings.parse(str text)\n   Settings.load()\n   App.start()\n   Program.Main()\n";
    assert_eq!(annotation_of(&report), expected);

    let _handler = DiagnosticStack::enter("Program.HandleError()");
    let report = Err::<(), _>(report).attach_logical_stack().unwrap_err();
    let report = report!(report);
    assert_eq!(annotation_of(&report), expected);

    let wrapped = report.context("startup failed");
    assert_eq!(
        annotation_of(&wrapped),
        "   Program.HandleError()\n   Program.Main()\n"
    );
    assert_eq!(annotation_of(wrapped.cause().unwrap()), expected);
}

#[tokio::test]
async fn test_report_format_literal_scenario() {
    let _main = DiagnosticStack::enter("Program.Main()");
    let report = async {
        tokio::task::yield_now().await;
        Report::new(InvalidOperation("boom"))
    }
    .in_logical_scope("Program.DoWorkAsync()")
    .await;

    let text = format_report(&report);
    let message = text.find("InvalidOperation: boom").unwrap();
    let header = text.find("\nLogical stack:\n").unwrap();
    let frames = text
        .find("\n   async Program.DoWorkAsync()\n   Program.Main()\n")
        .unwrap();
    assert!(message < header);
    assert_eq!(header + "\nLogical stack:".len(), frames);
    assert_eq!(format!("{report:?}"), text);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 3)]
async fn test_composite_report() {
    let _main = DiagnosticStack::enter("Batch.run()");
    let shard = |id: usize| {
        async move {
            let _frame = DiagnosticStack::enter(format!("Shard.query(usize id = {id})"));
            tokio::task::yield_now().await;
            Err::<(), _>(report!("shard {} unavailable", id))
        }
        .in_logical_scope(format!("Shard.run({id})"))
    };

    let (a, b, c) = tokio::join!(shard(0), shard(1), shard(2));
    let failures: ReportCollection = [a, b, c]
        .into_iter()
        .collect_reports::<Vec<()>>()
        .unwrap_err();
    let report = failures.context("3 shards failed");

    let text = format_report(&report);
    let blocks = text.split_once("--> (Inner report #0)\n").unwrap().1;
    assert_eq!(
        blocks,
        "   Shard.query(usize id = 0)\n   async Shard.run(0)\n   Batch.run()\n<--\n\
         --> (Inner report #1)\n   Shard.query(usize id = 1)\n   async Shard.run(1)\n   Batch.run()\n<--\n\
         --> (Inner report #2)\n   Shard.query(usize id = 2)\n   async Shard.run(2)\n   Batch.run()\n<--\n"
    );
    assert_eq!(text.matches("Logical stack:").count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_operation_pops_its_frame() {
    init_logging();
    let _main = DiagnosticStack::enter("Client.call()");
    let slow = async {
        let _wait = DiagnosticStack::enter("Client.wait_for_reply()");
        std::future::pending::<()>().await;
    }
    .in_logical_scope("Client.request()");

    let timed_out = tokio::time::timeout(Duration::from_millis(5), slow).await;
    assert!(timed_out.is_err());
    assert_eq!(frames(), ["Client.call()"]);

    let aborted = task::spawn(
        async {
            let _frame = DiagnosticStack::enter("Worker.loop()");
            std::future::pending::<()>().await;
        }
        .in_logical_scope("Worker.run()"),
    );
    tokio::task::yield_now().await;
    aborted.abort();
    assert!(aborted.await.unwrap_err().is_cancelled());
    assert_eq!(frames(), ["Client.call()"]);
}

#[test]
fn test_signature_labels() {
    let label = Signature::new("Fetch")
        .declared_in("net::Client")
        .generic("T")
        .param("Uri", "uri")
        .param("u32", "retries")
        .asynchronous()
        .to_label();
    assert_eq!(label, "net.Client.Fetch[T](Uri uri, u32 retries) // async");

    let _frame = DiagnosticStack::enter(&label);
    let report = Report::msg("timeout");
    assert_eq!(
        annotation_of(&report),
        "   net.Client.Fetch[T](Uri uri, u32 retries) // async\n"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn test_unwrapped_tasks_never_pop_each_others_frames() {
    let (a_tx, a_rx) = tokio::sync::oneshot::channel::<()>();
    let (b_tx, b_rx) = tokio::sync::oneshot::channel::<()>();

    let a = tokio::spawn(async move {
        let _frame = DiagnosticStack::enter("TaskA.frame()");
        let _ = a_rx.await;
    });
    let b = tokio::spawn(async move {
        let _frame = DiagnosticStack::enter("TaskB.frame()");
        let _ = a_tx.send(());
        let _ = b_rx.await;
        frames()
    });

    // A finishes while B's frame is on top of the shared worker stack.
    a.await.unwrap();
    b_tx.send(()).unwrap();
    let seen = b.await.unwrap();
    assert_eq!(seen.first().map(String::as_str), Some("TaskB.frame()"));

    DiagnosticStack::clear();
}

#[tokio::test(flavor = "current_thread")]
async fn test_spawned_tasks_keep_frames_private_on_one_thread() {
    let (a_tx, a_rx) = tokio::sync::oneshot::channel::<()>();
    let (b_tx, b_rx) = tokio::sync::oneshot::channel::<()>();

    let a = task::spawn(async move {
        let _frame = DiagnosticStack::enter("TaskA.frame()");
        let _ = b_tx.send(());
        let _ = a_rx.await;
        frames()
    });
    let b = task::spawn(async move {
        let _ = b_rx.await;
        let seen = frames();
        let _ = a_tx.send(());
        seen
    });

    assert_eq!(b.await.unwrap(), Vec::<String>::new());
    assert_eq!(a.await.unwrap(), ["TaskA.frame()"]);
    assert!(DiagnosticStack::is_empty());
}

struct ReportOnThreadExit(mpsc::Sender<Option<usize>>);

impl Drop for ReportOnThreadExit {
    fn drop(&mut self) {
        let report = Report::msg("raised while the thread exits");
        let _ = self.0.send(report.logical_stack().map(|stack| stack.len()));
    }
}

thread_local! {
    static ON_EXIT: RefCell<Option<ReportOnThreadExit>> = const { RefCell::new(None) };
}

#[test]
fn test_report_created_during_thread_teardown() {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        ON_EXIT.with(|slot| *slot.borrow_mut() = Some(ReportOnThreadExit(tx)));
        // Left open on purpose; the ambient context may already be gone by
        // the time the report above is created.
        DiagnosticStack::push("Thread.main()");
    })
    .join()
    .unwrap();

    let depth = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(depth, None | Some(1)), "unexpected stack depth {depth:?}");
}
