//! # Seed Data Generator
//!
//! Populates a development database with articles, customers and orders.
//!
//! ## Usage
//! ```bash
//! # Generate 2,000 articles (default) plus the sample customers and orders
//! cargo run -p buho-store --bin seed
//!
//! # Generate custom amount
//! cargo run -p buho-store --bin seed -- --count 10000
//!
//! # Specify database path and engine
//! cargo run -p buho-store --bin seed -- --db ./data/buho.db --platform native
//! ```
//!
//! ## Generated Articles
//! Each department gets articles named `{base} {size}`:
//! - Unique SKU: `{DEPT}-{BASE}-{INDEX}`
//! - Five price lists, each 5% below the previous one
//! - Stock 0 - 100

use buho_core::{Article, CatalogRef};
use buho_store::{
    sample, DbConfig, OrderStorageFacade, Platform, RecordStore, StoreConfig,
};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Departments for realistic test data
const DEPARTMENTS: &[(i64, &str, &str, &[&str])] = &[
    (
        1,
        "IND",
        "Indumentaria",
        &["Remera", "Camisa", "Pantalón", "Buzo", "Campera", "Short", "Pollera", "Vestido"],
    ),
    (
        2,
        "CAL",
        "Calzado",
        &["Zapatilla", "Bota", "Sandalia", "Mocasín", "Ojota"],
    ),
    (
        3,
        "ACC",
        "Accesorios",
        &["Gorra", "Cinturón", "Bufanda", "Guantes", "Mochila", "Billetera"],
    ),
];

const SIZES: &[&str] = &["XS", "S", "M", "L", "XL", "XXL", "36", "38", "40", "42"];

const DESIGNS: &[&str] = &["Liso", "Rayado", "Estampado", "Cuadros"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 2000;
    let mut db_path = String::from("./buho_dev.db");
    let mut platform = Platform::detect();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(2000);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--platform" | "-p" => {
                if i + 1 < args.len() {
                    platform = match args[i + 1].as_str() {
                        "native" => Platform::Native,
                        _ => Platform::Embedded,
                    };
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Buho Orders Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>          Number of articles to generate (default: 2000)");
                println!("  -d, --db <PATH>          Database file path (default: ./buho_dev.db)");
                println!("  -p, --platform <NAME>    native | embedded (default: detected)");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, ?platform, count, "Seeding database");

    let config = StoreConfig::new(DbConfig::new(&db_path)).with_platform(platform);
    let storage = OrderStorageFacade::open(config).await?;
    info!(backend = %storage.active_backend(), "Connected");

    let articles = storage.articles();
    let existing = articles.count().await?;
    if existing > 0 {
        warn!(existing, "Database already has articles, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let generated = generate_articles(count);
    let result = articles.replace_all(generated).await?;
    info!(
        stored = result.success_count,
        rejected = result.errors.len(),
        elapsed = ?start.elapsed(),
        "Articles generated"
    );

    let result = storage.clients().replace_all(sample::sample_customers()).await?;
    info!(stored = result.success_count, "Customers loaded");

    let result = storage
        .replace_all_orders(sample::sample_orders(chrono::Utc::now()))
        .await?;
    info!(stored = result.success_count, "Orders loaded");

    let found = storage.articles().get_all().await?;
    let remeras = found.iter().filter(|a| a.matches("remera")).count();
    info!(total = found.len(), remeras, "Seed complete");

    Ok(())
}

/// Walks departments, bases and sizes, in rounds, until `count` articles exist.
fn generate_articles(count: usize) -> Vec<Article> {
    let mut articles = Vec::with_capacity(count);

    let mut round = 0;
    while articles.len() < count {
        for (department_id, code, department, bases) in DEPARTMENTS {
            for (base_idx, base) in bases.iter().enumerate() {
                for (size_idx, size) in SIZES.iter().enumerate() {
                    if articles.len() >= count {
                        return articles;
                    }
                    let seed = round * 10_000
                        + (*department_id as usize) * 1000
                        + base_idx * 20
                        + size_idx;
                    articles.push(generate_article(
                        CatalogRef::new(*department_id, *department),
                        code,
                        base,
                        size,
                        seed,
                    ));
                }
            }
        }
        round += 1;
    }

    articles
}

/// Generates a single article with realistic data.
fn generate_article(department: CatalogRef, code: &str, base: &str, size: &str, seed: usize) -> Article {
    let prefix: String = base.chars().take(3).collect::<String>().to_uppercase();
    let sku = format!("{code}-{prefix}-{seed:05}");

    // Base $5.00 - $45.00
    let price1 = 500 + ((seed * 37) % 4001) as i64;
    let list = |step: i64| price1 * (100 - 5 * step) / 100;

    Article {
        description: format!("{base} talle {size}"),
        unit_price1: price1,
        unit_price2: list(1),
        unit_price3: list(2),
        unit_price4: list(3),
        unit_price5: list(4),
        unit_in_stock: (seed % 101) as i64,
        sizes: vec![size.to_string()],
        designs: vec![DESIGNS[seed % DESIGNS.len()].to_string()],
        department: Some(department),
        tax_code1: 21,
        ..Article::new(sku, format!("{base} {size}"))
    }
}
