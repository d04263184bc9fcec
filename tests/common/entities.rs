use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tracked_unit_of_work::{Entity, Validate, ValidationFailure};

/// Sample self-validating Orchid entity for testing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orchid {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
}

impl Orchid {
    pub fn new(name: &str, price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price,
        }
    }
}

impl Entity for Orchid {
    const KIND: &'static str = "orchids";

    fn id(&self) -> Uuid {
        self.id
    }

    fn as_validatable(&self) -> Option<&dyn Validate> {
        Some(self)
    }
}

impl Validate for Orchid {
    fn validate(&self) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        if self.name.trim().is_empty() {
            failures.push(ValidationFailure::new(["Name"], "The Name field is required."));
        }
        if self.price <= 0 {
            failures.push(ValidationFailure::new(["Price"], "Price must be positive."));
        }
        failures
    }
}

/// Sample Auction entity without validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: Uuid,
    pub orchid_id: Uuid,
    pub starting_price: i64,
}

impl Auction {
    pub fn new(orchid_id: Uuid, starting_price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            orchid_id,
            starting_price,
        }
    }
}

impl Entity for Auction {
    const KIND: &'static str = "auctions";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Entity kind deliberately left out of the test registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bidder {
    pub id: Uuid,
}

impl Entity for Bidder {
    const KIND: &'static str = "bidders";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// A second type claiming the `orchids` kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchidSummary {
    pub id: Uuid,
}

impl Entity for OrchidSummary {
    const KIND: &'static str = "orchids";

    fn id(&self) -> Uuid {
        self.id
    }
}
