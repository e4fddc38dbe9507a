//! # Example: poll_until_ready
//!
//! Demonstrates an [`Ostinato`] polling a slow service with a growing [`Tempo`],
//! and a [`Cue`] waiting on a [`Bus`] for the service to report ready.
//!
//! ## Flow
//! ```text
//! Ostinato::play()
//!   ├─► refrain(1) → bus.send("status", ["booting"])
//!   ├─► sleep(100ms)
//!   ├─► refrain(2) → bus.send("status", ["booting"])
//!   ├─► sleep(200ms)
//!   ├─► refrain(3) → bus.send("status", ["ready"])
//!   │
//! Cue("status").promise_matching(2s, r == "ready")
//!   └─► resolves ─► ostinato.pause()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example poll_until_ready
//! ```

use std::time::Duration;

use concertino::{Bus, Config, Cue, Ostinato, Player, Tempo, Value, first_arg};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Shared defaults: polls start at 100ms and double up to 1s
    let mut cfg = Config::default();
    cfg.tempo = Tempo::growing(Duration::from_millis(100), 2.0, Duration::from_secs(1));
    cfg.cue_timeout = Duration::from_secs(2);
    cfg.bus_capacity = 16;

    // 2. The bus the service reports on
    let bus = Bus::from(&cfg);

    // 3. A poller that reports "ready" on its third attempt
    let reporter = bus.clone();
    let poller = Ostinato::with_defaults(
        move |attempt| {
            let bus = reporter.clone();
            async move {
                let status = if attempt >= 3 { "ready" } else { "booting" };
                println!("[poll] attempt {attempt} → {status}");
                bus.send("status", vec![Value::from(status)]);
            }
        },
        &cfg,
    );

    // 4. Wait for the first "ready" status
    let status = Cue::with_defaults(&bus, "status", first_arg, &cfg)?;
    let wait = status.promise_matching(cfg.cue_timeout, |r| {
        r.as_ref().and_then(Value::as_str) == Some("ready")
    });

    poller.play();
    let ready = wait.await?;
    poller.pause();

    println!("[main] service is {:?} after {} polls", ready, poller.iterations());
    Ok(())
}
