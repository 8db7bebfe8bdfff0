//! DispatchQueue + SinkForwarder: delivery, ordering, failure isolation and
//! lifecycle. Sinks here are in-memory; no collector is needed.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use lineage_relay_core::{
    DispatchConfig, DispatchQueue, EventBuilder, LineageError, LineageEvent, QueueKind,
    QueueState, Result, Sink, SinkForwarder,
};

/// Records everything it receives; optionally rejects or panics on chosen
/// call indexes.
struct MemorySink<T> {
    received: Mutex<Vec<T>>,
    calls: AtomicUsize,
    fail_on: Vec<usize>,
    panic_on: Vec<usize>,
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self::failing_on(Vec::new())
    }
}

impl<T> MemorySink<T> {
    fn failing_on(fail_on: Vec<usize>) -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_on,
            panic_on: Vec::new(),
        }
    }

    fn panicking_on(panic_on: Vec<usize>) -> Self {
        Self {
            panic_on,
            ..Self::failing_on(Vec::new())
        }
    }

    fn received(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl<T> Sink<T> for MemorySink<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn emit(&self, item: &T) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on.contains(&call) {
            panic!("sink blew up on call {call}");
        }
        if self.fail_on.contains(&call) {
            return Err(LineageError::DeliveryFailed {
                status: 503,
                body: format!("rejected call {call}"),
            });
        }
        self.received.lock().unwrap().push(item.clone());
        Ok(())
    }
}

fn fast_config() -> DispatchConfig {
    DispatchConfig::default().with_poll_interval(Duration::from_millis(20))
}

type MemoryQueue<T> = DispatchQueue<
    T,
    SinkForwarder<Arc<MemorySink<T>>, Box<dyn Fn() -> Result<Arc<MemorySink<T>>> + Send + Sync>>,
>;

fn memory_queue<T>(sink: &Arc<MemorySink<T>>, cfg: &DispatchConfig) -> MemoryQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    let sink = Arc::clone(sink);
    let factory: Box<dyn Fn() -> Result<Arc<MemorySink<T>>> + Send + Sync> =
        Box::new(move || Ok(Arc::clone(&sink)));
    DispatchQueue::forwarding(factory, cfg).unwrap()
}

// =========================================================================
// Delivery
// =========================================================================

#[tokio::test]
async fn join_delivers_everything_in_emit_order() {
    let sink = Arc::new(MemorySink::<u32>::default());
    // Long poll interval: delivery must not depend on the worker waking by
    // itself before join.
    let cfg = DispatchConfig::default().with_poll_interval(Duration::from_secs(30));
    let mut queue = memory_queue(&sink, &cfg);
    queue.start().unwrap();

    for i in 0..500 {
        queue.emit(i);
    }
    queue.join().await.unwrap();

    assert_eq!(sink.received(), (0..500).collect::<Vec<_>>());
    assert_eq!(queue.pending(), 0);
    assert_eq!(queue.worker().stats().delivered(), 500);
}

#[tokio::test]
async fn items_emitted_before_start_are_delivered() {
    let sink = Arc::new(MemorySink::<u32>::default());
    let mut queue = memory_queue(&sink, &fast_config());

    queue.emit(1);
    queue.emit(2);
    assert_eq!(queue.pending(), 2);

    queue.start().unwrap();
    queue.join().await.unwrap();
    assert_eq!(sink.received(), vec![1, 2]);
}

#[tokio::test]
async fn worker_delivers_without_being_stopped() {
    let sink = Arc::new(MemorySink::<u32>::default());
    let mut queue = memory_queue(&sink, &fast_config());
    queue.start().unwrap();

    queue.emit(42);
    for _ in 0..100 {
        if !sink.received().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(sink.received(), vec![42]);
    assert_eq!(queue.state(), QueueState::Running);

    queue.join().await.unwrap();
}

#[tokio::test]
async fn lineage_events_arrive_equal_by_value() {
    let sink = Arc::new(MemorySink::<LineageEvent>::default());
    let mut queue = memory_queue(&sink, &fast_config());
    queue.start().unwrap();

    let mut job = EventBuilder::from_fields("myspace", "job_1", None).unwrap();
    job.input("public.input_1");
    let started = job.dump();
    queue.emit(started.clone());

    job.output("public.output_1").complete(None);
    let completed = job.dump();
    queue.emit(completed.clone());

    queue.join().await.unwrap();
    assert_eq!(sink.received(), vec![started, completed]);
}

// =========================================================================
// Failure isolation
// =========================================================================

#[tokio::test]
async fn failing_item_does_not_stop_the_rest() {
    let sink = Arc::new(MemorySink::<u32>::failing_on(vec![2, 5]));
    let mut queue = memory_queue(&sink, &fast_config());
    queue.start().unwrap();

    for i in 0..8 {
        queue.emit(i);
    }
    queue.join().await.unwrap();

    assert_eq!(sink.received(), vec![0, 1, 3, 4, 6, 7]);
    let stats = queue.worker().stats();
    assert_eq!(stats.delivered(), 6);
    assert_eq!(stats.failed(), 2);
}

#[tokio::test]
async fn panicking_sink_does_not_stop_the_rest() {
    let sink = Arc::new(MemorySink::<u32>::panicking_on(vec![1]));
    let mut queue = memory_queue(&sink, &fast_config());
    queue.start().unwrap();

    for i in 0..4 {
        queue.emit(i);
    }
    queue.join().await.unwrap();

    assert_eq!(sink.received(), vec![0, 2, 3]);
    assert_eq!(queue.pending(), 0);
    assert_eq!(queue.state(), QueueState::Stopped);
    let stats = queue.worker().stats();
    assert_eq!(stats.delivered(), 3);
    assert_eq!(stats.failed(), 1);
}

#[tokio::test]
async fn factory_failure_surfaces_on_join() {
    let factory: Box<dyn Fn() -> Result<Arc<MemorySink<u32>>> + Send + Sync> =
        Box::new(|| {
            Err(LineageError::MissingEnv {
                env_var: "OPENLINEAGE_URL".to_string(),
            })
        });
    let mut queue: MemoryQueue<u32> = DispatchQueue::forwarding(factory, &fast_config()).unwrap();
    queue.start().unwrap();
    queue.emit(1);

    let err = queue.join().await.unwrap_err();
    assert!(matches!(err, LineageError::WorkerFailed { .. }));
    assert_eq!(queue.state(), QueueState::Stopped);
    // Nothing consumed the item.
    assert_eq!(queue.pending(), 1);
}

#[tokio::test]
async fn factory_runs_once_per_start_on_the_worker() {
    let sink = Arc::new(MemorySink::<u32>::default());
    let built = Arc::new(AtomicUsize::new(0));

    let factory: Box<dyn Fn() -> Result<Arc<MemorySink<u32>>> + Send + Sync> = {
        let sink = Arc::clone(&sink);
        let built = Arc::clone(&built);
        Box::new(move || {
            built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(&sink))
        })
    };
    let mut queue: MemoryQueue<u32> = DispatchQueue::forwarding(factory, &fast_config()).unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 0);

    queue.start().unwrap();
    for i in 0..10 {
        queue.emit(i);
    }
    queue.join().await.unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn state_walks_idle_running_stopped() {
    let sink = Arc::new(MemorySink::<u32>::default());
    let mut queue = memory_queue(&sink, &fast_config());
    assert_eq!(queue.state(), QueueState::Idle);
    assert!(!queue.is_running());

    queue.start().unwrap();
    assert_eq!(queue.state(), QueueState::Running);
    assert!(queue.is_running());

    queue.join().await.unwrap();
    assert_eq!(queue.state(), QueueState::Stopped);
    assert!(!queue.is_running());
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let sink = Arc::new(MemorySink::<u32>::default());
    let mut queue = memory_queue(&sink, &fast_config());
    queue.start().unwrap();

    let err = queue.start().unwrap_err();
    assert!(matches!(err, LineageError::AlreadyStarted));

    queue.join().await.unwrap();
}

#[tokio::test]
async fn create_and_start_starts_immediately() {
    let sink = Arc::new(MemorySink::<u32>::default());
    let sink_for_factory = Arc::clone(&sink);
    let factory: Box<dyn Fn() -> Result<Arc<MemorySink<u32>>> + Send + Sync> =
        Box::new(move || Ok(Arc::clone(&sink_for_factory)));
    let worker = SinkForwarder::new(factory, Duration::from_millis(20));
    assert_eq!(worker.poll_interval(), Duration::from_millis(20));

    let mut queue = DispatchQueue::create_and_start(worker, &fast_config()).unwrap();
    assert!(queue.is_running());
    queue.emit(9u32);
    queue.join().await.unwrap();
    assert_eq!(sink.received(), vec![9]);
}

#[tokio::test]
async fn join_without_start_is_rejected() {
    let sink = Arc::new(MemorySink::<u32>::default());
    let mut queue = memory_queue(&sink, &fast_config());
    assert!(matches!(
        queue.join().await.unwrap_err(),
        LineageError::NotStarted
    ));
}

#[tokio::test]
async fn stop_does_not_wait_and_allows_restart() {
    let sink = Arc::new(MemorySink::<u32>::default());
    let mut queue = memory_queue(&sink, &fast_config());
    queue.start().unwrap();
    queue.emit(1);

    queue.stop();
    assert!(!queue.is_running());
    assert!(matches!(
        queue.state(),
        QueueState::StopRequested | QueueState::Stopped
    ));

    // The detached worker still drains what was queued before the stop.
    for _ in 0..100 {
        if queue.state() == QueueState::Stopped {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(queue.state(), QueueState::Stopped);
    assert_eq!(sink.received(), vec![1]);

    queue.start().unwrap();
    assert_eq!(queue.state(), QueueState::Running);
    queue.emit(2);
    queue.join().await.unwrap();
    assert_eq!(sink.received(), vec![1, 2]);
}

#[tokio::test]
async fn emit_after_join_stays_queued() {
    let sink = Arc::new(MemorySink::<u32>::default());
    let mut queue = memory_queue(&sink, &fast_config());
    queue.start().unwrap();
    queue.join().await.unwrap();

    queue.emit(1);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(sink.received().is_empty());
    assert_eq!(queue.pending(), 1);
}

#[test]
fn start_outside_a_runtime_is_an_error() {
    let sink = Arc::new(MemorySink::<u32>::default());
    let mut queue = memory_queue(&sink, &fast_config());

    let err = queue.start().unwrap_err();
    assert!(matches!(err, LineageError::WorkerFailed { .. }));
    assert_eq!(queue.state(), QueueState::Idle);
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let sink = Arc::new(MemorySink::<u32>::default());
    let sink_for_factory = Arc::clone(&sink);
    let factory: Box<dyn Fn() -> Result<Arc<MemorySink<u32>>> + Send + Sync> =
        Box::new(move || Ok(Arc::clone(&sink_for_factory)));
    let cfg =
        DispatchConfig::default().with_queue_kind(QueueKind::FifoDropOldest { capacity: 0 });

    let result: Result<MemoryQueue<u32>> = DispatchQueue::forwarding(factory, &cfg);
    assert!(matches!(
        result,
        Err(LineageError::InvalidField {
            field: "capacity",
            ..
        })
    ));
}

// =========================================================================
// Bounded queues and concurrent producers
// =========================================================================

#[tokio::test]
async fn bounded_queue_drops_oldest_before_start() {
    let sink = Arc::new(MemorySink::<u32>::default());
    let cfg = fast_config().with_queue_kind(QueueKind::FifoDropOldest { capacity: 3 });
    let mut queue = memory_queue(&sink, &cfg);

    for i in 0..5 {
        queue.emit(i);
    }
    assert_eq!(queue.dropped(), 2);

    queue.start().unwrap();
    queue.join().await.unwrap();
    assert_eq!(sink.received(), vec![2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn many_producers_one_consumer() {
    let sink = Arc::new(MemorySink::<(usize, usize)>::default());
    let mut queue = memory_queue(&sink, &fast_config());
    queue.start().unwrap();

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let emitter = queue.emitter();
            std::thread::spawn(move || {
                for seq in 0..250 {
                    emitter.emit((producer, seq));
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }
    queue.join().await.unwrap();

    let received = sink.received();
    assert_eq!(received.len(), 1000);
    for producer in 0..4 {
        let seqs: Vec<usize> = received
            .iter()
            .filter(|(p, _)| *p == producer)
            .map(|(_, s)| *s)
            .collect();
        assert_eq!(seqs, (0..250).collect::<Vec<_>>());
    }
}
