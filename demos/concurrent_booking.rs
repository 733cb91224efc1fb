//! Demo: many buyers race to book the same listing; exactly one wins.
//!
//! Uses an in-memory store, so it needs no setup.
//!
//! Run: `cargo run --example concurrent_booking --features blocking`

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use homebook::error::HomebookError;
use homebook::marketplace::{BookingRequest, MarketplaceBlocking};
use homebook::models::{Category, NewListing, Role, User, UserId};
use homebook::storage::{BlockingStorage, InMemoryStorage};

/// Number of competing buyers.
const BUYERS: usize = 8;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn user(id: String, role: Role) -> User {
    User {
        username: id.clone(),
        email: format!("{id}@example.com"),
        id: UserId::new(id),
        password_hash: String::new(),
        role,
        listings: Vec::new(),
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let market = Arc::new(
        MarketplaceBlocking::builder()
            .storage(InMemoryStorage::new())
            .build()?,
    );

    let mut users = vec![user("seller".to_owned(), Role::Seller)];
    users.extend((0..BUYERS).map(|idx| user(format!("buyer-{idx}"), Role::Buyer)));
    let _imported = market.import_users(users)?;

    let seller = UserId::new("seller".to_owned());
    let listing = market.create_listing(
        Some(&seller),
        NewListing {
            title: "Harbour view flat".to_owned(),
            description: "Two bedrooms, top floor".to_owned(),
            price: 320_000.0,
            location: "Lisbon".to_owned(),
            category: Category::Apartment,
            image: None,
        },
    )?;
    println!("Listing {} is up for grabs", listing.id);

    let handles: Vec<_> = (0..BUYERS)
        .map(|idx| {
            let market = Arc::clone(&market);
            let request = BookingRequest::new(
                listing.id.clone(),
                Some(UserId::new(format!("buyer-{idx}"))),
            );
            thread::spawn(move || (idx, market.book_listing(&request)))
        })
        .collect();

    for handle in handles {
        let (idx, outcome) = handle.join().map_err(|_| "booking thread panicked")?;
        match outcome {
            Ok(booked) => println!("buyer-{idx}: booked ({})", booked.reservation.id),
            Err(HomebookError::AlreadyBooked(_)) => println!("buyer-{idx}: already booked"),
            Err(err) => return Err(err.into()),
        }
    }

    let ledger = market.storage().reservations()?;
    println!("Reservations on record: {}", ledger.len());
    Ok(())
}
