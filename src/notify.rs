use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{Event, Id};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for change events: one channel per room plus a
/// campus-wide channel that sees every event.
pub struct NotifyHub {
    rooms: DashMap<Id, broadcast::Sender<Event>>,
    campus: broadcast::Sender<Event>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            campus: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribe to events about one room. Creates the channel if needed.
    pub fn subscribe(&self, room_id: Id) -> broadcast::Receiver<Event> {
        let sender = self
            .rooms
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.campus.subscribe()
    }

    /// Fan an event out to its room channel (if it has one and anyone is
    /// listening) and to the campus channel. Never blocks.
    pub fn send(&self, event: &Event) {
        if let Some(room_id) = event.room_id()
            && let Some(sender) = self.rooms.get(&room_id)
        {
            let _ = sender.send(event.clone());
        }
        let _ = self.campus.send(event.clone());
        if let Event::RoomRemoved { id } = event {
            self.remove(*id);
        }
    }

    /// Drop a room's channel. Existing receivers see the channel close.
    pub fn remove(&self, room_id: Id) {
        self.rooms.remove(&room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn room_subscriber_receives_room_events() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe(7);

        let event = Event::EntryAdded { id: 1, room_id: 7 };
        hub.send(&event);
        hub.send(&Event::EntryAdded { id: 2, room_id: 8 });

        assert_eq!(rx.recv().await.unwrap(), event);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn campus_subscriber_sees_everything() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe_all();

        hub.send(&Event::StudentAdded { id: 1 });
        hub.send(&Event::ReservationCancelled { id: 4, room_id: 2 });

        assert_eq!(rx.recv().await.unwrap(), Event::StudentAdded { id: 1 });
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::ReservationCancelled { id: 4, room_id: 2 }
        );
    }

    #[tokio::test]
    async fn room_removal_closes_its_channel() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe(3);

        hub.send(&Event::RoomRemoved { id: 3 });

        assert_eq!(rx.recv().await.unwrap(), Event::RoomRemoved { id: 3 });
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[test]
    fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        hub.send(&Event::BlockRemoved { id: 9 });
    }
}
