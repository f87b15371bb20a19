//! Seeds a development database with demo catalog data and exercises
//! one sale end-to-end.
//!
//! ## Usage
//! ```text
//! cargo run -p kirana-db --bin seed [path/to/kirana.db]
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;

use kirana_core::dto::{NewCustomer, NewPayment, NewProduct, NewSale, SaleLineRequest};
use kirana_core::types::{PaymentMethod, PaymentStatus};
use kirana_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "kirana.db".to_string());

    let db = Database::new(DbConfig::new(&path)).await?;

    let rice = db
        .products()
        .create(&NewProduct {
            sku: Some("RICE-5KG".to_string()),
            name: "Basmati Rice 5kg".to_string(),
            selling_price_cents: 10000,
            purchase_price_cents: 8200,
            minimum_price_cents: 9000,
            stock: 40,
        })
        .await?;

    let sugar = db
        .products()
        .create(&NewProduct {
            sku: Some("SUGAR-1KG".to_string()),
            name: "Sugar 1kg".to_string(),
            selling_price_cents: 500,
            purchase_price_cents: 410,
            minimum_price_cents: 450,
            stock: 120,
        })
        .await?;

    let tea = db
        .products()
        .create(&NewProduct {
            sku: None,
            name: "Tea 250g".to_string(),
            selling_price_cents: 2000,
            purchase_price_cents: 1650,
            minimum_price_cents: 1800,
            stock: 25,
        })
        .await?;

    info!(generated_sku = %tea.sku, "Catalog seeded");

    let customer = db
        .customers()
        .create(&NewCustomer {
            name: "Ali Traders".to_string(),
            contact: Some("0300-1234567".to_string()),
            address: Some("Shop 14, Main Bazaar".to_string()),
            credit_limit_cents: 500_000,
        })
        .await?;

    // A walk-in cash sale.
    let cash = db
        .sales()
        .create_sale(&NewSale {
            customer_id: None,
            items: vec![
                SaleLineRequest {
                    product_id: sugar.id.clone(),
                    quantity: 2,
                },
                SaleLineRequest {
                    product_id: tea.id.clone(),
                    quantity: 1,
                },
            ],
            discount_cents: 100,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Paid,
            notes: None,
            receipt_image: None,
            sale_date: None,
        })
        .await?;
    info!(sale_id = %cash.sale.id, total = %cash.sale.total_amount(), "Cash sale recorded");
    println!("{}", serde_json::to_string_pretty(&cash)?);

    // A credit sale that lands on the customer's ledger...
    let credit = db
        .sales()
        .create_sale(&NewSale {
            customer_id: Some(customer.id.clone()),
            items: vec![SaleLineRequest {
                product_id: rice.id.clone(),
                quantity: 3,
            }],
            discount_cents: 0,
            payment_method: PaymentMethod::Credit,
            payment_status: PaymentStatus::Pending,
            notes: Some("monthly account".to_string()),
            receipt_image: None,
            sale_date: None,
        })
        .await?;

    // ...partially settled on the spot.
    db.payments()
        .record_payment(&NewPayment {
            customer_id: customer.id.clone(),
            sale_id: Some(credit.sale.id.clone()),
            amount_cents: 10000,
            payment_method: PaymentMethod::Cash,
            payment_date: None,
            notes: None,
        })
        .await?;

    let owed = db.customers().ledger_balance(&customer.id).await?;
    info!(
        customer = %customer.name,
        owed_cents = owed,
        "Seed complete"
    );

    Ok(())
}
