//! Fixed demo data for development databases and the `seed` binary.

use buho_core::{
    Article, BasketOrder, BranchRef, CatalogRef, Customer, DeliveryAddress, OrderDraft, OrderItem,
    OrderState,
};
use chrono::{DateTime, Duration, Utc};

/// Ids of the sample orders. Loading them twice reports duplicates instead
/// of adding copies.
pub const SAMPLE_ORDER_IDS: [i64; 3] = [1001, 1002, 1003];

pub fn sample_articles() -> Vec<Article> {
    let clothing = CatalogRef::new(1, "Indumentaria");
    let accessories = CatalogRef::new(2, "Accesorios");

    vec![
        Article {
            description: "Remera de algodón".to_string(),
            unit_price1: 1_500_00,
            unit_price2: 1_350_00,
            unit_in_stock: 40,
            sizes: vec!["S".into(), "M".into(), "L".into()],
            designs: vec!["Liso".into(), "Rayado".into()],
            department: Some(clothing.clone()),
            ..Article::new("REM-001", "Remera básica")
        },
        Article {
            description: "Pantalón de jean".to_string(),
            unit_price1: 4_200_00,
            unit_price2: 3_900_00,
            unit_in_stock: 18,
            sizes: vec!["38".into(), "40".into(), "42".into()],
            department: Some(clothing),
            ..Article::new("PAN-001", "Jean clásico")
        },
        Article {
            unit_price1: 900_00,
            unit_in_stock: 25,
            department: Some(accessories),
            ..Article::new("GOR-001", "Gorra")
        },
    ]
}

pub fn sample_customers() -> Vec<Customer> {
    let branch = BranchRef::new(1, "Default");
    vec![
        Customer {
            last_name: Some("García".into()),
            dni: Some("30111222".into()),
            email: Some("ana.garcia@example.com".into()),
            cellphone: Some("3415550101".into()),
            city: Some("Rosario".into()),
            branch: Some(branch.clone()),
            ..Customer::new(1, "Ana")
        },
        Customer {
            last_name: Some("Pérez".into()),
            dni: Some("28999111".into()),
            list_price: 2,
            checking_account_enabled: true,
            cta_cte_limit_amount: 50_000_00,
            branch: Some(branch),
            ..Customer::new(2, "Luis")
        },
    ]
}

/// Sample orders opened relative to `now`, one per headline state.
pub fn sample_orders(now: DateTime<Utc>) -> Vec<BasketOrder> {
    let customers = sample_customers();
    let articles = sample_articles();
    let line = |article: &Article, quantity: i64| {
        OrderItem::new(&article.sku, &article.name, quantity, article.unit_price1)
    };

    let states = [OrderState::Pending, OrderState::Invoiced, OrderState::Cancelled];
    SAMPLE_ORDER_IDS
        .iter()
        .zip(states)
        .enumerate()
        .map(|(i, (id, state))| {
            let customer = customers[i % customers.len()].clone();
            let mut draft = OrderDraft::for_customer(customer.clone())
                .with_item(line(&articles[i % articles.len()], 2))
                .with_item(line(&articles[(i + 1) % articles.len()], 1));
            draft.state = Some(state);
            if i == 0 {
                draft.customer_delivery = Some(DeliveryAddress {
                    name: customer.name.clone(),
                    address: Some("San Martín 1234".into()),
                    city: customer.city.clone(),
                    ..Default::default()
                });
                draft.delivery_amount = Some(500_00);
            }

            let mut order = draft.into_order(now - Duration::days(i as i64));
            order.id = Some(*id);
            order
        })
        .collect()
}
