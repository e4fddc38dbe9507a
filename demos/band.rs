//! # Example: band
//!
//! Builds a small ensemble tree, attaches a [`LogWriter`] at the top and shows
//! how events bubble and how aggregate play/pause reaches every member.
//!
//! ## Tree
//! ```text
//! band
//!  ├─ strings
//!  │   ├─ violin
//!  │   └─ cello
//!  └─ drum
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example band --features logging
//! ```

use concertino::{Ensemble, LogWriter, Part, Player, Value, kind};

fn main() -> Result<(), concertino::EnsembleError> {
    let band = Ensemble::new();
    let strings = band.get_or_create("strings")?;
    let violin = Part::arc();
    strings.add("violin", violin.clone())?.add("cello", Part::arc())?;
    band.add("drum", Part::arc())?;

    // Everything bubbles to the top, so one writer sees the whole tree.
    LogWriter::attach(band.as_ref(), &[kind::CHANGED, "tuned"]);

    violin.emit("tuned", vec![Value::from(440)]);
    band.play();
    band.rotate(None);
    band.pause();

    let order: Vec<String> = band.names().iter().map(|n| n.to_string()).collect();
    println!("[main] order after rotate: {order:?}");
    println!("[main] descendants: {}", band.descendants(false).len());
    Ok(())
}
