//! A main-affine actor driven from the embedder's own loop.
//!
//! The status board below stands in for anything that must touch
//! main-thread-only state (a UI toolkit, a windowing system). Worker tasks
//! send it updates; the main loop pumps it with `drive()` once per
//! iteration.
//!
//! Run with `cargo run --example main_drive`.

use std::time::Duration;

use strela::prelude::*;

/// Owns main-thread-only state; everything else talks to it by message.
struct StatusBoard {
    title: String,
}

enum BoardMsg {
    SetTitle(String),
    Tick(u64),
}

impl Actor for StatusBoard {
    type Msg = BoardMsg;

    fn on_start(&mut self, _cx: &mut Context<'_>) -> Step {
        tracing::info!(title = %self.title, "board up");
        Step::Await
    }

    fn on_message(&mut self, _cx: &mut Context<'_>, msg: Message<BoardMsg>) -> Step {
        match msg.into_payload() {
            BoardMsg::SetTitle(title) => {
                tracing::info!(old = %self.title, new = %title, "title change");
                self.title = title;
            }
            BoardMsg::Tick(frame) => {
                tracing::info!(frame, title = %self.title, "tick");
            }
        }
        Step::Await
    }
}

/// Worker-side task feeding the board.
struct Reporter {
    board: Handle<StatusBoard>,
    board_token: CallToken<StatusBoard>,
}

impl Actor for Reporter {
    type Msg = ();

    fn on_start(&mut self, cx: &mut Context<'_>) -> Step {
        cx.send(
            &self.board,
            &self.board_token,
            0,
            BoardMsg::SetTitle("reporting".into()),
        )
        .unwrap();
        Step::Done
    }

    fn on_message(&mut self, _cx: &mut Context<'_>, _msg: Message<()>) -> Step {
        Step::Await
    }
}

fn main() {
    strela::diag::init();
    let rt = Runtime::new(Config::builder().num_workers(2).build().unwrap()).unwrap();

    let (board, board_token) = rt
        .create(
            StatusBoard { title: "starting".into() },
            TaskOptions::new()
                .affinity(Affinity::Main)
                .priority(Priority::High)
                .mode(CreateMode::Queued),
        )
        .unwrap();

    rt.create(
        Reporter { board: board.clone(), board_token: board_token.clone() },
        TaskOptions::new().mode(CreateMode::Queued),
    )
    .unwrap();

    // The embedder's loop: pump main-affine tasks, do frame work, repeat.
    for frame in 0..30u64 {
        board.send(&board_token, 0, BoardMsg::Tick(frame)).unwrap();
        // Drain the whole main-affine backlog before the frame's sleep.
        let mut resumed = 0;
        loop {
            let n = rt.drive().unwrap();
            if n == 0 {
                break;
            }
            resumed += n;
        }
        tracing::debug!(frame, resumed, "drive pass");
        std::thread::sleep(Duration::from_millis(10));
    }
}
