//! Demo blood bank directory, inserted into an empty database.

use std::collections::BTreeMap;

use baseseva_shared::{BankStatus, BloodBank, BloodType, Coordinates, InventoryLevel};
use baseseva_store::{Database, Result};
use uuid::Uuid;

struct SeedBank {
    name: &'static str,
    address: &'static str,
    phone: &'static str,
    lat: f64,
    lng: f64,
    open_hours: &'static str,
    status: BankStatus,
    rating: f32,
    emergency: bool,
    stock: &'static [(BloodType, InventoryLevel)],
}

const SEED_BANKS: &[SeedBank] = &[
    SeedBank {
        name: "Sassoon General Hospital Blood Centre",
        address: "Jai Prakash Narayan Rd, Pune 411001",
        phone: "+91 20 2612 8000",
        lat: 18.5286,
        lng: 73.8743,
        open_hours: "24/7",
        status: BankStatus::Open,
        rating: 4.4,
        emergency: true,
        stock: &[
            (BloodType::APositive, InventoryLevel::High),
            (BloodType::BPositive, InventoryLevel::Medium),
            (BloodType::OPositive, InventoryLevel::High),
            (BloodType::ONegative, InventoryLevel::Critical),
            (BloodType::AbPositive, InventoryLevel::Low),
        ],
    },
    SeedBank {
        name: "Jehangir Hospital Blood Bank",
        address: "Sassoon Rd, Pune 411001",
        phone: "+91 20 6681 9999",
        lat: 18.5309,
        lng: 73.8766,
        open_hours: "08:00-20:00",
        status: BankStatus::ClosingSoon,
        rating: 4.6,
        emergency: false,
        stock: &[
            (BloodType::APositive, InventoryLevel::Medium),
            (BloodType::ANegative, InventoryLevel::Low),
            (BloodType::BPositive, InventoryLevel::High),
            (BloodType::OPositive, InventoryLevel::Medium),
        ],
    },
    SeedBank {
        name: "KEM Hospital Blood Bank",
        address: "Acharya Donde Marg, Parel, Mumbai 400012",
        phone: "+91 22 2410 7000",
        lat: 19.0029,
        lng: 72.8416,
        open_hours: "24/7",
        status: BankStatus::Open,
        rating: 4.2,
        emergency: true,
        stock: &[
            (BloodType::OPositive, InventoryLevel::High),
            (BloodType::ONegative, InventoryLevel::Low),
            (BloodType::BNegative, InventoryLevel::Low),
            (BloodType::AbNegative, InventoryLevel::Critical),
        ],
    },
    SeedBank {
        name: "AIIMS Blood Bank",
        address: "Ansari Nagar, New Delhi 110029",
        phone: "+91 11 2659 4438",
        lat: 28.5672,
        lng: 77.2100,
        open_hours: "24/7",
        status: BankStatus::Open,
        rating: 4.5,
        emergency: true,
        stock: &[
            (BloodType::APositive, InventoryLevel::High),
            (BloodType::BPositive, InventoryLevel::High),
            (BloodType::OPositive, InventoryLevel::Medium),
            (BloodType::ONegative, InventoryLevel::Medium),
            (BloodType::AbPositive, InventoryLevel::Medium),
        ],
    },
    SeedBank {
        name: "Rotary Blood Bank",
        address: "Tughlakabad Institutional Area, New Delhi 110062",
        phone: "+91 11 2905 4066",
        lat: 28.5120,
        lng: 77.2520,
        open_hours: "09:00-17:00",
        status: BankStatus::Closed,
        rating: 4.1,
        emergency: false,
        stock: &[
            (BloodType::ANegative, InventoryLevel::Medium),
            (BloodType::BNegative, InventoryLevel::Medium),
            (BloodType::OPositive, InventoryLevel::Low),
        ],
    },
];

/// Insert the demo directory if no bank exists yet. Returns the number of
/// banks inserted.
pub fn seed_blood_banks(db: &Database) -> Result<usize> {
    if db.count_blood_banks()? > 0 {
        return Ok(0);
    }

    for seed in SEED_BANKS {
        let inventory: BTreeMap<BloodType, InventoryLevel> = seed.stock.iter().copied().collect();
        db.insert_blood_bank(&BloodBank {
            id: Uuid::new_v4(),
            name: seed.name.to_string(),
            address: seed.address.to_string(),
            phone: seed.phone.to_string(),
            coordinates: Coordinates::new(seed.lat, seed.lng),
            open_hours: seed.open_hours.to_string(),
            blood_types: inventory.keys().copied().collect(),
            status: seed.status,
            rating: seed.rating,
            verified: true,
            emergency: seed.emergency,
            inventory,
            distance_km: None,
        })?;
    }

    tracing::info!(count = SEED_BANKS.len(), "Seeded blood bank directory");
    Ok(SEED_BANKS.len())
}
