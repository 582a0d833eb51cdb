//! Database bootstrap helpers.

use crate::config::CheckoutConfig;
use crate::errors::CheckoutError;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema,
};
use std::time::Duration;
use tracing::info;

/// Establishes a sea-orm connection pool from configuration.
pub async fn establish_connection(
    config: &CheckoutConfig,
) -> Result<DatabaseConnection, CheckoutError> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    info!(url = %config.database_url, "database connection established");
    Ok(db)
}

/// Creates every table the crate uses. Intended for SQLite-backed tests and
/// embedded bootstrap; production deployments manage schema externally.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), CheckoutError> {
    use crate::entities::*;

    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    macro_rules! create_table {
        ($entity:expr) => {{
            let mut stmt = schema.create_table_from_entity($entity);
            stmt.if_not_exists();
            db.execute(backend.build(&stmt)).await?;
        }};
    }

    create_table!(channel::Entity);
    create_table!(address::Entity);
    create_table!(customer::Entity);
    create_table!(customer_address::Entity);
    create_table!(warehouse::Entity);
    create_table!(shipping_method::Entity);
    create_table!(product_variant::Entity);
    create_table!(variant_translation::Entity);
    create_table!(channel_listing::Entity);
    create_table!(promotion_rule::Entity);
    create_table!(stock::Entity);
    create_table!(reservation::Entity);
    create_table!(allocation::Entity);
    create_table!(voucher::Entity);
    create_table!(voucher_customer::Entity);
    create_table!(gift_card::Entity);
    create_table!(checkout_gift_card::Entity);
    create_table!(checkout::Entity);
    create_table!(checkout_line::Entity);
    create_table!(payment::Entity);
    create_table!(payment_transaction::Entity);
    create_table!(order::Entity);
    create_table!(order_line::Entity);
    create_table!(order_discount::Entity);
    create_table!(order_line_discount::Entity);

    Ok(())
}

/// True when the active backend supports `SELECT ... FOR UPDATE`.
pub fn supports_row_locks(db: &impl ConnectionTrait) -> bool {
    db.get_database_backend() != DbBackend::Sqlite
}
