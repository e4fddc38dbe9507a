//! # LogWriter: simple event printer
//!
//! A minimal listener that prints the events a player observes to stdout.
//! Use it for test or demo.
//!
//! ## Example output
//! ```text
//! [changed] emitter="violin" args=["playing", false, true] path=#7
//! [tuned] emitter="strings" args=[440] path=#7>#4
//! [exhausted] emitter=#12 args=[3] path=#12
//! [error] emitter="door-cue" args=["jammed"] path=#9
//! ```

use std::sync::Arc;

use crate::events::{Event, ListenerId};
use crate::players::Player;
use crate::value::Value;

/// Event writer listener.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Registers a writer on `player` for each of `kinds`.
    ///
    /// Returns the listener ids in the order of `kinds`, for use with `off`.
    pub fn attach<P>(player: &P, kinds: &[&str]) -> Vec<ListenerId>
    where
        P: Player + ?Sized,
    {
        let writer = Self::new();
        kinds
            .iter()
            .map(|kind| player.core().on(kind, move |ev| writer.write(ev)))
            .collect()
    }

    /// Prints one line for `ev`.
    pub fn write(&self, ev: &Arc<Event>) {
        println!("{}", self.format(ev));
    }

    /// Renders `ev` as a single log line.
    pub fn format(&self, ev: &Event) -> String {
        let emitter = match &ev.emitter_name {
            Some(name) => format!("{name:?}"),
            None => format!("#{}", ev.emitter.as_u64()),
        };
        let args: Vec<String> = ev.origin_args().iter().map(render).collect();
        let path: Vec<String> = ev
            .propagation_path()
            .iter()
            .map(|id| format!("#{}", id.as_u64()))
            .collect();

        format!(
            "[{}] emitter={} args=[{}] path={}",
            ev.kind,
            emitter,
            args.join(", "),
            path.join(">")
        )
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => format!("{s:?}"),
        Value::Player(id) => format!("#{}", id.as_u64()),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(render).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::players::PlayerId;

    #[test]
    fn test_format_origin_event() {
        let ev = Event::new(PlayerId::from_raw(7), "tuned", vec![Value::from(440), Value::Null])
            .with_emitter_name(Some(Arc::from("violin")));
        assert_eq!(
            LogWriter::new().format(&ev),
            r#"[tuned] emitter="violin" args=[440, null] path=#7"#
        );
    }

    #[test]
    fn test_format_bubbled_event_shows_path() {
        let origin = Arc::new(Event::new(PlayerId::from_raw(7), "tuned", vec![Value::from("a")]));
        let up = Event::derived(PlayerId::from_raw(4), origin);
        assert_eq!(
            LogWriter::new().format(&up),
            r#"[tuned] emitter=#4 args=["a"] path=#7>#4"#
        );
    }

    #[test]
    fn test_attach_registers_each_kind() {
        let part = crate::Part::arc();
        let ids = LogWriter::attach(part.as_ref(), &["changed", "tuned"]);
        assert_eq!(ids.len(), 2);
        assert_eq!(part.core().listener_count("changed"), 1);
        assert!(part.off("tuned", ids[1]));
    }
}
