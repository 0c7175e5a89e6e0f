//! # Seed Data Generator
//!
//! Populates the database with tattoo-supply catalog data and a few
//! customers for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p tinta-db --bin seed
//!
//! # Specify database path
//! cargo run -p tinta-db --bin seed -- --db ./data/tinta.db
//! ```

use chrono::Utc;
use std::env;
use tinta_core::{Customer, Product};
use tinta_db::{Database, DbConfig};
use uuid::Uuid;

/// (name, description, price in cents, stock)
const CATALOG: &[(&str, &str, i64, i64)] = &[
    (
        "Rotary Machine Pro",
        "Balanced rotary machine for lining and shading",
        25_000,
        8,
    ),
    (
        "Coil Machine Classic",
        "Traditional 10-wrap coil machine",
        18_500,
        5,
    ),
    ("Ink Set 12 Colors", "Vegan pigment set, 30ml bottles", 4500, 40),
    ("Black Outline Ink 120ml", "High-density outlining black", 2900, 60),
    ("Cartridge Needles 5RL", "Box of 20 sterilized cartridges", 1500, 120),
    ("Cartridge Needles 9RM", "Box of 20 sterilized cartridges", 1600, 100),
    ("Disposable Grips 25mm", "Box of 24 ergonomic grips", 2200, 80),
    ("Stencil Paper A4", "Thermal transfer sheets, 100 pack", 2000, 50),
    ("Stencil Transfer Gel", "220ml application gel", 1100, 70),
    ("Power Supply Digital", "Dual-mode digital power supply", 9900, 12),
    ("Clip Cord Premium", "Silicone-jacketed clip cord", 1800, 30),
    ("Aftercare Balm 50ml", "Panthenol healing balm", 1200, 150),
    ("Green Soap Concentrate 1L", "Cleansing concentrate", 1700, 45),
    ("Barrier Film Roll", "10cm x 200m protective film", 900, 90),
    ("Nitrile Gloves M", "Box of 100, powder free", 1300, 200),
];

const CUSTOMERS: &[(&str, &str, &str)] = &[
    ("Ana Ruiz", "ana.ruiz@example.com", "12345678Z"),
    ("Luis Vega", "luis.vega@example.com", "87654321X"),
    ("Estudio Norte SL", "compras@estudionorte.example.com", "B76543210"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./tinta_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tinta Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tinta_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tinta Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    for (name, description, price_cents, stock) in CATALOG {
        let slug = name.to_lowercase().replace(' ', "-");
        db.products()
            .insert(&Product {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                description: Some(description.to_string()),
                price_cents: *price_cents,
                stock: *stock,
                images: vec![format!("https://cdn.tinta.example.com/{slug}.jpg")],
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;
    }
    println!("✓ Seeded {} products", CATALOG.len());

    for (name, email, document) in CUSTOMERS {
        db.customers()
            .insert(&Customer {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                email: email.to_string(),
                phone: Some("+34 600 000 000".to_string()),
                address: Some("Calle Mayor 1, Madrid".to_string()),
                document: Some(document.to_string()),
                document_type: Some("cedula".to_string()),
            })
            .await?;
    }
    println!("✓ Seeded {} customers", CUSTOMERS.len());

    println!();
    println!("Done.");
    Ok(())
}
