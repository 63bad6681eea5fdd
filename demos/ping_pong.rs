//! Two actors bouncing a counter back and forth through the typed send
//! path and the reply path.
//!
//! Run with `cargo run --example ping_pong`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use strela::prelude::*;

const ROUNDS: u64 = 10;

enum PingMsg {
    Start,
    Pong(u64),
}

struct Pinger {
    table: Handle<Ponger>,
    table_token: CallToken<Ponger>,
    done: Arc<AtomicBool>,
}

impl Actor for Pinger {
    type Msg = PingMsg;

    fn on_message(&mut self, cx: &mut Context<'_>, msg: Message<PingMsg>) -> Step {
        match msg.into_payload() {
            PingMsg::Start => {
                tracing::info!("serving");
                cx.send(&self.table, &self.table_token, 0, 0).unwrap();
                Step::Await
            }
            PingMsg::Pong(n) if n >= ROUNDS => {
                tracing::info!(rounds = n, "rally over");
                self.done.store(true, Ordering::Release);
                Step::Done
            }
            PingMsg::Pong(n) => {
                tracing::info!(n, "ping");
                cx.send(&self.table, &self.table_token, 0, n).unwrap();
                Step::Await
            }
        }
    }
}

struct Ponger;

impl Actor for Ponger {
    type Msg = u64;

    fn on_message(&mut self, cx: &mut Context<'_>, msg: Message<u64>) -> Step {
        let (sender, _, n) = msg.into_parts();
        tracing::info!(n, "pong");
        cx.reply(sender, 0, PingMsg::Pong(n + 1)).unwrap();
        Step::Await
    }
}

fn main() {
    strela::diag::init();
    strela::init().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let (ponger, ponger_token) = strela::create(Ponger, TaskOptions::new()).unwrap();
    let (pinger, pinger_token) = strela::create(
        Pinger {
            table: ponger,
            table_token: ponger_token,
            done: Arc::clone(&done),
        },
        TaskOptions::new().priority(Priority::High),
    )
    .unwrap();

    pinger.send(&pinger_token, 0, PingMsg::Start).unwrap();
    while !done.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(1));
    }

    strela::shutdown();
}
