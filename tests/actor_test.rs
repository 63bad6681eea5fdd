//! End-to-end actor runtime tests: ordering, lifecycle, affinity rules,
//! replies, and main-thread driving.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use strela::{
    Actor, Affinity, Config, Context, CreateMode, Error, Message, Priority, Runtime, Step,
    TaskOptions, TaskState,
};

fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        thread::yield_now();
    }
    cond()
}

/// Records payloads carrying header 1; ignores everything else.
struct Collector {
    seen: Arc<Mutex<Vec<u64>>>,
}

impl Actor for Collector {
    type Msg = u64;

    fn on_message(&mut self, _cx: &mut Context<'_>, msg: Message<u64>) -> Step {
        if msg.header() == 1 {
            self.seen.lock().push(*msg.payload());
        }
        Step::Await
    }
}

#[test]
fn per_sender_order_survives_noise() {
    const COUNT: u64 = 500;

    let rt = Runtime::new(Config::builder().num_workers(4).build().unwrap()).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (collector, token) = rt
        .create(Collector { seen: Arc::clone(&seen) }, TaskOptions::new())
        .unwrap();

    // Noise senders interleave arbitrarily; their messages carry header 0.
    let mut noise = Vec::new();
    for _ in 0..3 {
        let collector = collector.clone();
        let token = token.clone();
        noise.push(thread::spawn(move || {
            for i in 0..COUNT {
                while let Err(Error::MailboxFull) = collector.send(&token, 0, i) {
                    thread::yield_now();
                }
            }
        }));
    }

    // One sender's stream, retried on a full mailbox, must arrive in order.
    for i in 0..COUNT {
        while let Err(Error::MailboxFull) = collector.send(&token, 1, i) {
            thread::yield_now();
        }
    }

    for handle in noise {
        handle.join().unwrap();
    }
    assert!(wait_until(Duration::from_secs(10), || {
        seen.lock().len() == COUNT as usize
    }));
    let seen = seen.lock();
    assert!(
        seen.iter().copied().eq(0..COUNT),
        "stream arrived out of order"
    );
}

/// Counts every message it receives.
struct Ticker {
    hits: Arc<AtomicUsize>,
}

impl Actor for Ticker {
    type Msg = u64;

    fn on_message(&mut self, _cx: &mut Context<'_>, _msg: Message<u64>) -> Step {
        self.hits.fetch_add(1, Ordering::SeqCst);
        Step::Await
    }
}

#[test]
fn rapid_suspend_wake_round_trips_never_strand_a_message() {
    const ROUNDS: usize = 5_000;

    let rt = Runtime::new(Config::builder().num_workers(1).build().unwrap()).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let (task, token) = rt
        .create(Ticker { hits: Arc::clone(&hits) }, TaskOptions::new())
        .unwrap();

    // One message per round: the task suspends between rounds, so every
    // send races its park transition. A missed wakeup strands the round's
    // message forever, since no later send arrives to nudge the task.
    for round in 1..=ROUNDS {
        task.send(&token, 0, round as u64).unwrap();
        assert!(
            wait_until(Duration::from_secs(10), || {
                hits.load(Ordering::SeqCst) == round
            }),
            "message stranded at round {round}"
        );
    }
}

/// Terminates on the first message.
struct OneShot;

impl Actor for OneShot {
    type Msg = u64;

    fn on_message(&mut self, _cx: &mut Context<'_>, _msg: Message<u64>) -> Step {
        Step::Done
    }
}

#[test]
fn sends_after_termination_are_rejected() {
    let rt = Runtime::new(Config::builder().num_workers(1).build().unwrap()).unwrap();
    let (task, token) = rt.create(OneShot, TaskOptions::new()).unwrap();

    task.send(&token, 0, 1).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        task.state() == TaskState::Terminated
    }));

    assert!(matches!(
        task.send(&token, 0, 2),
        Err(Error::MailboxClosed)
    ));
}

#[test]
fn sends_observing_termination_always_fail_closed() {
    let rt = Runtime::new(Config::builder().num_workers(1).build().unwrap()).unwrap();
    let (task, token) = rt.create(OneShot, TaskOptions::new()).unwrap();

    // Race a sender against termination: the instant Terminated becomes
    // visible, a send must fail Closed rather than be accepted and dropped.
    let observer = {
        let task = task.clone();
        let token = token.clone();
        thread::spawn(move || {
            while task.state() != TaskState::Terminated {
                thread::yield_now();
            }
            task.send(&token, 0, 9)
        })
    };

    task.send(&token, 0, 1).unwrap();
    assert!(matches!(
        observer.join().unwrap(),
        Err(Error::MailboxClosed)
    ));
}

struct Inert;

impl Actor for Inert {
    type Msg = ();

    fn on_message(&mut self, _cx: &mut Context<'_>, _msg: Message<()>) -> Step {
        Step::Await
    }
}

#[test]
fn main_affinity_requires_a_main_thread() {
    let rt = Runtime::new(
        Config::builder()
            .num_workers(1)
            .main_thread(false)
            .build()
            .unwrap(),
    )
    .unwrap();

    let err = rt
        .create(Inert, TaskOptions::new().affinity(Affinity::Main))
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn inline_main_creation_off_the_main_thread_is_rejected() {
    let rt = Arc::new(Runtime::new(Config::builder().num_workers(1).build().unwrap()).unwrap());

    let other = Arc::clone(&rt);
    thread::spawn(move || {
        other.create(
            Inert,
            TaskOptions::new()
                .affinity(Affinity::Main)
                .mode(CreateMode::Inline),
        )
    })
    .join()
    .unwrap()
    .map(|_| ())
    .unwrap_err();
}

/// Runs its first continuation on whichever thread created it.
struct ThreadProbe {
    ran_on: Arc<Mutex<Option<thread::ThreadId>>>,
}

impl Actor for ThreadProbe {
    type Msg = ();

    fn on_start(&mut self, _cx: &mut Context<'_>) -> Step {
        *self.ran_on.lock() = Some(thread::current().id());
        Step::Done
    }

    fn on_message(&mut self, _cx: &mut Context<'_>, _msg: Message<()>) -> Step {
        Step::Await
    }
}

#[test]
fn inline_mode_runs_on_the_creating_thread() {
    let rt = Runtime::new(Config::builder().num_workers(1).build().unwrap()).unwrap();
    let ran_on = Arc::new(Mutex::new(None));
    rt.create(
        ThreadProbe { ran_on: Arc::clone(&ran_on) },
        TaskOptions::new().mode(CreateMode::Inline),
    )
    .unwrap();

    assert_eq!(*ran_on.lock(), Some(thread::current().id()));
}

#[test]
fn mailbox_capacity_is_enforced() {
    // Main-affine task on a runtime nobody drives: messages pile up.
    let rt = Runtime::new(Config::builder().num_workers(1).build().unwrap()).unwrap();
    let (task, token) = rt
        .create(
            Collector { seen: Arc::new(Mutex::new(Vec::new())) },
            TaskOptions::new()
                .affinity(Affinity::Main)
                .mailbox_capacity(2),
        )
        .unwrap();

    task.send(&token, 0, 1).unwrap();
    task.send(&token, 0, 2).unwrap();
    assert!(matches!(task.send(&token, 0, 3), Err(Error::MailboxFull)));
}

/// Request/reply pair. The requester's protocol carries both the kick-off
/// and the acknowledgement it gets back.
enum PingMsg {
    Kick,
    Ack(u64),
}

struct Pinger {
    target: strela::Handle<Ponger>,
    target_token: strela::CallToken<Ponger>,
    acked: Arc<AtomicUsize>,
}

impl Actor for Pinger {
    type Msg = PingMsg;

    fn on_message(&mut self, cx: &mut Context<'_>, msg: Message<PingMsg>) -> Step {
        match msg.into_payload() {
            PingMsg::Kick => {
                cx.send(&self.target, &self.target_token, 0, 77).unwrap();
                Step::Await
            }
            PingMsg::Ack(v) => {
                self.acked.store(v as usize, Ordering::SeqCst);
                Step::Done
            }
        }
    }
}

struct Ponger;

impl Actor for Ponger {
    type Msg = u64;

    fn on_message(&mut self, cx: &mut Context<'_>, msg: Message<u64>) -> Step {
        let (sender, _, payload) = msg.into_parts();
        cx.reply(sender, 1, PingMsg::Ack(payload + 1)).unwrap();
        Step::Await
    }
}

#[test]
fn replies_travel_back_to_the_sender() {
    let rt = Runtime::new(Config::builder().num_workers(2).build().unwrap()).unwrap();
    let acked = Arc::new(AtomicUsize::new(0));

    let (ponger, ponger_token) = rt.create(Ponger, TaskOptions::new()).unwrap();
    let (pinger, pinger_token) = rt
        .create(
            Pinger {
                target: ponger,
                target_token: ponger_token,
                acked: Arc::clone(&acked),
            },
            TaskOptions::new(),
        )
        .unwrap();

    pinger.send(&pinger_token, 0, PingMsg::Kick).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        acked.load(Ordering::SeqCst) == 78
    }));
    assert!(wait_until(Duration::from_secs(5), || {
        pinger.state() == TaskState::Terminated
    }));
}

/// Fires one request and terminates without waiting for the answer.
struct FireAndForget {
    target: strela::Handle<CountingPonger>,
    target_token: strela::CallToken<CountingPonger>,
}

impl Actor for FireAndForget {
    type Msg = ();

    fn on_start(&mut self, cx: &mut Context<'_>) -> Step {
        cx.send(&self.target, &self.target_token, 0, 5).unwrap();
        Step::Done
    }

    fn on_message(&mut self, _cx: &mut Context<'_>, _msg: Message<()>) -> Step {
        Step::Await
    }
}

struct CountingPonger {
    served: Arc<AtomicUsize>,
}

impl Actor for CountingPonger {
    type Msg = u64;

    fn on_message(&mut self, cx: &mut Context<'_>, msg: Message<u64>) -> Step {
        let (sender, _, _) = msg.into_parts();
        // The requester may already be gone; the reply is simply dropped.
        cx.reply(sender, 0, ()).unwrap();
        self.served.fetch_add(1, Ordering::SeqCst);
        Step::Await
    }
}

#[test]
fn reply_to_a_dead_sender_is_dropped() {
    let rt = Runtime::new(Config::builder().num_workers(1).build().unwrap()).unwrap();
    let served = Arc::new(AtomicUsize::new(0));

    let (ponger, ponger_token) = rt
        .create(CountingPonger { served: Arc::clone(&served) }, TaskOptions::new())
        .unwrap();
    rt.create(
        FireAndForget { target: ponger.clone(), target_token: ponger_token },
        TaskOptions::new().mode(CreateMode::Queued),
    )
    .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        served.load(Ordering::SeqCst) == 1
    }));
    // The ponger survives the dangling reply.
    assert_ne!(ponger.state(), TaskState::Terminated);
}

/// Records its own priority when first run.
struct BandProbe {
    order: Arc<Mutex<Vec<Priority>>>,
    band: Priority,
}

impl Actor for BandProbe {
    type Msg = ();

    fn on_start(&mut self, _cx: &mut Context<'_>) -> Step {
        self.order.lock().push(self.band);
        Step::Done
    }

    fn on_message(&mut self, _cx: &mut Context<'_>, _msg: Message<()>) -> Step {
        Step::Await
    }
}

#[test]
fn drive_serves_higher_bands_first() {
    let rt = Runtime::new(Config::builder().num_workers(1).build().unwrap()).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for band in [Priority::Low, Priority::Realtime, Priority::Normal] {
        rt.create(
            BandProbe { order: Arc::clone(&order), band },
            TaskOptions::new()
                .affinity(Affinity::Main)
                .priority(band)
                .mode(CreateMode::Queued),
        )
        .unwrap();
    }

    let resumed = rt.drive().unwrap();
    assert_eq!(resumed, 3);
    assert_eq!(
        *order.lock(),
        vec![Priority::Realtime, Priority::Normal, Priority::Low]
    );
}

#[test]
fn drive_off_the_main_thread_fails() {
    let rt = Arc::new(Runtime::new(Config::builder().num_workers(1).build().unwrap()).unwrap());

    let other = Arc::clone(&rt);
    let err = thread::spawn(move || other.drive())
        .join()
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, Error::WrongThread));
}

/// Yields once before finishing, so it is resumed twice.
struct Yielder {
    resumptions: Arc<AtomicUsize>,
}

impl Actor for Yielder {
    type Msg = ();

    fn on_start(&mut self, _cx: &mut Context<'_>) -> Step {
        self.resumptions.fetch_add(1, Ordering::SeqCst);
        Step::Yield
    }

    fn on_run(&mut self, _cx: &mut Context<'_>) -> Step {
        self.resumptions.fetch_add(1, Ordering::SeqCst);
        Step::Done
    }

    fn on_message(&mut self, _cx: &mut Context<'_>, _msg: Message<()>) -> Step {
        Step::Await
    }
}

#[test]
fn yield_reschedules_instead_of_suspending() {
    let rt = Runtime::new(Config::builder().num_workers(1).build().unwrap()).unwrap();
    let resumptions = Arc::new(AtomicUsize::new(0));
    let (task, _token) = rt
        .create(
            Yielder { resumptions: Arc::clone(&resumptions) },
            TaskOptions::new().mode(CreateMode::Queued),
        )
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        task.state() == TaskState::Terminated
    }));
    assert_eq!(resumptions.load(Ordering::SeqCst), 2);
}
