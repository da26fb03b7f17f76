//! Event rendering. One console line per event; watched surrogate ids
//! additionally get a prominent alert block. Other delivery channels, such
//! as OS dialogs, sit behind the [`Notifier`] trait.

use std::collections::HashSet;

use crate::monitor::DeviceEvent;

pub trait Notifier {
    fn notify(&self, event: &DeviceEvent, watched: &HashSet<i64>);
}

pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, event: &DeviceEvent, watched: &HashSet<i64>) {
        println!("{}", event_line(event));

        if let Some(id) = event.device().id
            && watched.contains(&id)
        {
            let verb = verb_for(event);
            println!("==================================================");
            println!(
                "  WATCHED DEVICE #{} ({}) {}",
                id,
                event.device().display_name(),
                verb
            );
            println!("==================================================");
        }
    }
}

fn verb_for(event: &DeviceEvent) -> &'static str {
    match event {
        DeviceEvent::Connected { .. } => "connected",
        DeviceEvent::Disconnected { .. } => "disconnected",
    }
}

/// The one-line console rendering of an event.
pub fn event_line(event: &DeviceEvent) -> String {
    let (device, at) = match event {
        DeviceEvent::Connected { device, at } => (device, at),
        DeviceEvent::Disconnected { device, at } => (device, at),
    };
    format!(
        "{} ({}) has {} at {}",
        device.display_name(),
        device.ip,
        verb_for(event),
        at.format("%H:%M:%S")
    )
}
