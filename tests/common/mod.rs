#![allow(dead_code)]

pub mod entities;
pub mod observers;

pub use entities::{Auction, Bidder, Orchid, OrchidSummary};
pub use observers::RecordingObserver;

use tracked_unit_of_work::EntityRegistry;

pub fn registry() -> EntityRegistry {
    EntityRegistry::new()
        .register::<Orchid>()
        .register::<Auction>()
}
