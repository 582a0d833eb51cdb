//! Stock reservation and allocation engine.
//!
//! Availability is computed as warehouse quantity minus durable allocations
//! minus non-expired reservations held by other checkouts. Durable allocation
//! is an atomic conditional increment of `quantity_allocated` that fails
//! closed: a lost race surfaces as `InsufficientStock`, never as an oversell.

use crate::checkout::fetch::{CheckoutInfo, CheckoutLineInfo};
use crate::entities::{
    allocation, channel, channel_listing, product_variant, reservation, stock, warehouse,
};
use crate::errors::{CheckoutError, StockShortfall};
use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// One order line to allocate, paired with the checkout line it came from.
#[derive(Debug, Clone)]
pub struct AllocationLine {
    pub order_line_id: Uuid,
    pub checkout_line_id: Option<Uuid>,
    pub variant: product_variant::Model,
    pub quantity: i32,
}

/// Warehouses eligible for a channel/country, preferred collection point
/// first, then by priority.
async fn candidate_warehouses<C: ConnectionTrait>(
    db: &C,
    channel: &channel::Model,
    country_code: &str,
    preferred: Option<Uuid>,
) -> Result<Vec<warehouse::Model>, CheckoutError> {
    let mut warehouses = warehouse::Entity::find()
        .filter(warehouse::Column::ChannelId.eq(channel.id))
        .filter(warehouse::Column::CountryCode.eq(country_code))
        .order_by_asc(warehouse::Column::Priority)
        .all(db)
        .await?;
    if warehouses.is_empty() {
        warehouses = warehouse::Entity::find()
            .filter(warehouse::Column::ChannelId.eq(channel.id))
            .order_by_asc(warehouse::Column::Priority)
            .all(db)
            .await?;
    }
    if let Some(preferred) = preferred {
        warehouses.sort_by_key(|w| (w.id != preferred, w.priority));
    }
    Ok(warehouses)
}

/// Active reserved quantity per stock, excluding the given checkout lines.
/// `exclude` carries this checkout's own lines so its temporary hold does not
/// double-count against itself.
async fn reserved_quantities<C: ConnectionTrait>(
    db: &C,
    stock_ids: &[Uuid],
    exclude_checkout_lines: &[Uuid],
) -> Result<HashMap<Uuid, i32>, CheckoutError> {
    if stock_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = reservation::Entity::find()
        .filter(reservation::Column::StockId.is_in(stock_ids.to_vec()))
        .filter(reservation::Column::ReservedUntil.gt(Utc::now()))
        .all(db)
        .await?;
    let mut reserved: HashMap<Uuid, i32> = HashMap::new();
    for row in rows {
        if exclude_checkout_lines.contains(&row.checkout_line_id) {
            continue;
        }
        *reserved.entry(row.stock_id).or_default() += row.quantity_reserved;
    }
    Ok(reserved)
}

async fn stocks_for_warehouses<C: ConnectionTrait>(
    db: &C,
    variant_ids: &[Uuid],
    warehouses: &[warehouse::Model],
) -> Result<Vec<stock::Model>, CheckoutError> {
    if variant_ids.is_empty() || warehouses.is_empty() {
        return Ok(Vec::new());
    }
    let warehouse_ids: Vec<Uuid> = warehouses.iter().map(|w| w.id).collect();
    Ok(stock::Entity::find()
        .filter(stock::Column::VariantId.is_in(variant_ids.to_vec()))
        .filter(stock::Column::WarehouseId.is_in(warehouse_ids))
        .all(db)
        .await?)
}

/// Verifies that every line's requested quantity fits the available stock
/// (or preorder capacity), failing with a structured shortfall otherwise.
///
/// `replace` excludes reservations tied to this checkout's own lines from the
/// contention calculation.
#[instrument(skip_all, fields(checkout = %info.checkout.token))]
pub async fn check_availability_bulk<C: ConnectionTrait>(
    db: &C,
    info: &CheckoutInfo,
    lines: &[CheckoutLineInfo],
    replace: bool,
    check_reservations: bool,
) -> Result<(), CheckoutError> {
    let tracked: Vec<&CheckoutLineInfo> = lines
        .iter()
        .filter(|l| l.variant.track_inventory && !l.variant.is_preorder)
        .collect();
    let variant_ids: Vec<Uuid> = tracked.iter().map(|l| l.variant.id).collect();

    let warehouses =
        candidate_warehouses(db, &info.channel, info.country_code(), info.preferred_warehouse())
            .await?;
    let stocks = stocks_for_warehouses(db, &variant_ids, &warehouses).await?;

    let own_lines: Vec<Uuid> = if replace {
        lines.iter().map(|l| l.line.id).collect()
    } else {
        Vec::new()
    };
    let stock_ids: Vec<Uuid> = stocks.iter().map(|s| s.id).collect();
    let reserved = if check_reservations {
        reserved_quantities(db, &stock_ids, &own_lines).await?
    } else {
        HashMap::new()
    };

    let mut available_by_variant: HashMap<Uuid, i32> = HashMap::new();
    for stock in &stocks {
        let held = reserved.get(&stock.id).copied().unwrap_or(0);
        *available_by_variant.entry(stock.variant_id).or_default() +=
            (stock.available_quantity() - held).max(0);
    }

    let mut shortfalls = Vec::new();
    for line in &tracked {
        let available = available_by_variant
            .get(&line.variant.id)
            .copied()
            .unwrap_or(0);
        if line.line.quantity > available {
            shortfalls.push(StockShortfall {
                variant_id: line.variant.id,
                checkout_line_id: Some(line.line.id),
                requested: line.line.quantity,
                available,
            });
        }
    }

    for line in lines.iter().filter(|l| l.variant.is_preorder) {
        if let Some(shortfall) = preorder_shortfall(db, line).await? {
            shortfalls.push(shortfall);
        }
    }

    if shortfalls.is_empty() {
        Ok(())
    } else {
        Err(CheckoutError::InsufficientStock(shortfalls))
    }
}

/// Preorder capacity check against the channel-scoped threshold and the
/// variant-global threshold.
async fn preorder_shortfall<C: ConnectionTrait>(
    db: &C,
    line: &CheckoutLineInfo,
) -> Result<Option<StockShortfall>, CheckoutError> {
    let listing = &line.listing;
    if let Some(threshold) = listing.preorder_quantity_threshold {
        let remaining = threshold - listing.preorder_quantity_allocated;
        if line.line.quantity > remaining {
            return Ok(Some(StockShortfall {
                variant_id: line.variant.id,
                checkout_line_id: Some(line.line.id),
                requested: line.line.quantity,
                available: remaining.max(0),
            }));
        }
    }
    if let Some(global) = line.variant.preorder_global_threshold {
        let listings = channel_listing::Entity::find()
            .filter(channel_listing::Column::VariantId.eq(line.variant.id))
            .all(db)
            .await?;
        let allocated: i32 = listings.iter().map(|l| l.preorder_quantity_allocated).sum();
        let remaining = global - allocated;
        if line.line.quantity > remaining {
            return Ok(Some(StockShortfall {
                variant_id: line.variant.id,
                checkout_line_id: Some(line.line.id),
                requested: line.line.quantity,
                available: remaining.max(0),
            }));
        }
    }
    Ok(None)
}

/// Durably decrements available stock for each line, preferring the
/// checkout's selected warehouse. A race detected between the earlier
/// availability check and this conditional update fails with
/// `InsufficientStock`.
#[instrument(skip_all, fields(lines = lines.len()))]
pub async fn allocate_stocks<C: ConnectionTrait>(
    db: &C,
    lines: &[AllocationLine],
    country_code: &str,
    channel: &channel::Model,
    preferred_warehouse: Option<Uuid>,
    check_reservations: bool,
) -> Result<(), CheckoutError> {
    let tracked: Vec<&AllocationLine> = lines
        .iter()
        .filter(|l| l.variant.track_inventory && !l.variant.is_preorder)
        .collect();
    if tracked.is_empty() {
        return Ok(());
    }

    let warehouses = candidate_warehouses(db, channel, country_code, preferred_warehouse).await?;
    let variant_ids: Vec<Uuid> = tracked.iter().map(|l| l.variant.id).collect();
    let stocks = stocks_for_warehouses(db, &variant_ids, &warehouses).await?;

    let warehouse_rank: HashMap<Uuid, usize> =
        warehouses.iter().enumerate().map(|(i, w)| (w.id, i)).collect();

    let own_lines: Vec<Uuid> = tracked.iter().filter_map(|l| l.checkout_line_id).collect();
    let stock_ids: Vec<Uuid> = stocks.iter().map(|s| s.id).collect();
    let reserved = if check_reservations {
        reserved_quantities(db, &stock_ids, &own_lines).await?
    } else {
        HashMap::new()
    };

    for line in tracked {
        let mut candidates: Vec<&stock::Model> = stocks
            .iter()
            .filter(|s| s.variant_id == line.variant.id)
            .collect();
        candidates.sort_by_key(|s| warehouse_rank.get(&s.warehouse_id).copied().unwrap_or(usize::MAX));

        let mut remaining = line.quantity;
        let mut total_available = 0;
        for stock_row in candidates {
            if remaining == 0 {
                break;
            }
            let held = reserved.get(&stock_row.id).copied().unwrap_or(0);
            let available = (stock_row.available_quantity() - held).max(0);
            total_available += available;
            let take = remaining.min(available);
            if take == 0 {
                continue;
            }

            // Atomic conditional increment; zero rows affected means another
            // allocation raced us on this stock row.
            let result = stock::Entity::update_many()
                .col_expr(
                    stock::Column::QuantityAllocated,
                    Expr::col(stock::Column::QuantityAllocated).add(take),
                )
                .filter(stock::Column::Id.eq(stock_row.id))
                .filter(
                    Expr::col(stock::Column::Quantity)
                        .gte(Expr::col(stock::Column::QuantityAllocated).add(take)),
                )
                .exec(db)
                .await?;
            if result.rows_affected == 0 {
                debug!(stock_id = %stock_row.id, "allocation race lost, trying next stock");
                continue;
            }

            allocation::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_line_id: Set(line.order_line_id),
                stock_id: Set(stock_row.id),
                quantity_allocated: Set(take),
            }
            .insert(db)
            .await?;
            remaining -= take;
        }

        if remaining > 0 {
            return Err(CheckoutError::InsufficientStock(vec![StockShortfall {
                variant_id: line.variant.id,
                checkout_line_id: line.checkout_line_id,
                requested: line.quantity,
                available: total_available,
            }]));
        }
        info!(variant_id = %line.variant.id, quantity = line.quantity, "stock allocated");
    }
    Ok(())
}

/// Allocation path for preorder variants: consumes channel-scoped preorder
/// capacity instead of warehouse stock.
#[instrument(skip_all)]
pub async fn allocate_preorders<C: ConnectionTrait>(
    db: &C,
    lines: &[AllocationLine],
    channel_id: Uuid,
) -> Result<(), CheckoutError> {
    for line in lines.iter().filter(|l| l.variant.is_preorder) {
        let listing = channel_listing::Entity::find()
            .filter(channel_listing::Column::VariantId.eq(line.variant.id))
            .filter(channel_listing::Column::ChannelId.eq(channel_id))
            .one(db)
            .await?
            .ok_or_else(|| {
                CheckoutError::NotFound(format!(
                    "Channel listing for preorder variant {}",
                    line.variant.id
                ))
            })?;

        if let Some(global) = line.variant.preorder_global_threshold {
            let listings = channel_listing::Entity::find()
                .filter(channel_listing::Column::VariantId.eq(line.variant.id))
                .all(db)
                .await?;
            let allocated: i32 = listings.iter().map(|l| l.preorder_quantity_allocated).sum();
            if line.quantity > global - allocated {
                return Err(CheckoutError::InsufficientStock(vec![StockShortfall {
                    variant_id: line.variant.id,
                    checkout_line_id: line.checkout_line_id,
                    requested: line.quantity,
                    available: (global - allocated).max(0),
                }]));
            }
        }

        let mut update = channel_listing::Entity::update_many()
            .col_expr(
                channel_listing::Column::PreorderQuantityAllocated,
                Expr::col(channel_listing::Column::PreorderQuantityAllocated).add(line.quantity),
            )
            .filter(channel_listing::Column::Id.eq(listing.id));
        if listing.preorder_quantity_threshold.is_some() {
            update = update.filter(
                Expr::col(channel_listing::Column::PreorderQuantityThreshold).gte(
                    Expr::col(channel_listing::Column::PreorderQuantityAllocated)
                        .add(line.quantity),
                ),
            );
        }
        let result = update.exec(db).await?;
        if result.rows_affected == 0 {
            let remaining = listing
                .preorder_quantity_threshold
                .map(|t| (t - listing.preorder_quantity_allocated).max(0))
                .unwrap_or(0);
            return Err(CheckoutError::InsufficientStock(vec![StockShortfall {
                variant_id: line.variant.id,
                checkout_line_id: line.checkout_line_id,
                requested: line.quantity,
                available: remaining,
            }]));
        }
    }
    Ok(())
}

/// Creates short-lived reservations for every line with no availability
/// re-validation. Used only while the checkout lock is released for the
/// external payment call, to keep a different concurrent checkout from racing
/// the same units.
#[instrument(skip_all, fields(checkout = %info.checkout.token))]
pub async fn reserve_stocks_without_availability_check<C: ConnectionTrait>(
    db: &C,
    info: &CheckoutInfo,
    lines: &[CheckoutLineInfo],
    hold: Duration,
) -> Result<usize, CheckoutError> {
    let variant_ids: Vec<Uuid> = lines
        .iter()
        .filter(|l| l.variant.track_inventory && !l.variant.is_preorder)
        .map(|l| l.variant.id)
        .collect();
    let warehouses =
        candidate_warehouses(db, &info.channel, info.country_code(), info.preferred_warehouse())
            .await?;
    let stocks = stocks_for_warehouses(db, &variant_ids, &warehouses).await?;

    let mut stock_by_variant: HashMap<Uuid, &stock::Model> = HashMap::new();
    for stock_row in &stocks {
        stock_by_variant.entry(stock_row.variant_id).or_insert(stock_row);
    }

    let reserved_until = Utc::now() + hold;
    let mut created = 0;
    for line in lines {
        if let Some(stock_row) = stock_by_variant.get(&line.variant.id) {
            reservation::ActiveModel {
                id: Set(Uuid::new_v4()),
                stock_id: Set(stock_row.id),
                checkout_line_id: Set(line.line.id),
                quantity_reserved: Set(line.line.quantity),
                reserved_until: Set(reserved_until),
            }
            .insert(db)
            .await?;
            created += 1;
        }
    }
    debug!(count = created, "bridging reservations created");
    Ok(created)
}

/// Deletes reservations whose hold has expired. Intended for a periodic
/// background task.
#[instrument(skip_all)]
pub async fn cleanup_expired_reservations<C: ConnectionTrait>(
    db: &C,
) -> Result<u64, CheckoutError> {
    let result = reservation::Entity::delete_many()
        .filter(reservation::Column::ReservedUntil.lt(Utc::now()))
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        info!(count = result.rows_affected, "expired reservations removed");
    }
    Ok(result.rows_affected)
}
