mod common;

use assert_matches::assert_matches;
use checkout_core::entities::channel::MarkAsPaidStrategy;
use checkout_core::entities::checkout::AuthorizeStatus;
use checkout_core::entities::order::{OrderStatus, PaymentCoverage};
use checkout_core::entities::payment_transaction::TransactionKind;
use checkout_core::entities::{allocation, checkout, order, payment, payment_transaction, stock};
use checkout_core::{CheckoutError, CheckoutErrorCode, CompleteCheckoutParams};
use common::*;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

#[tokio::test]
async fn transaction_flow_creates_order_and_deletes_checkout() {
    let db = setup_db().await;
    let channel = seed_channel(&db, MarkAsPaidStrategy::TransactionFlow, false, true).await;
    let warehouse = seed_warehouse(&db, channel.id).await;
    let variant = seed_variant(&db, channel.id, dec!(10)).await;
    seed_stock(&db, warehouse.id, variant.id, 5).await;
    let session = seed_checkout(&db, &channel).await;
    seed_line(&db, session.token, variant.id, 2).await;
    seed_transaction(&db, session.token, TransactionKind::Capture, dec!(20)).await;
    let session = set_authorize_status(&db, &session, AuthorizeStatus::Full).await;

    let gateway = TestGateway::new(db.clone());
    let service = build_service(db.clone(), gateway.clone());
    let outcome = service
        .complete_checkout(session.token, CompleteCheckoutParams::default())
        .await
        .expect("completion");

    let created = outcome.order.expect("order");
    assert_eq!(created.status, OrderStatus::Unfulfilled);
    assert_eq!(created.total_gross, dec!(20));
    assert_eq!(created.total_charged, dec!(20));
    assert_eq!(created.charge_status, PaymentCoverage::Full);
    assert!(!outcome.action_required);

    // transaction rows moved onto the order
    let moved = payment_transaction::Entity::find()
        .filter(payment_transaction::Column::OrderId.eq(created.id))
        .all(&db)
        .await
        .expect("transactions");
    assert_eq!(moved.len(), 1);
    assert!(moved[0].checkout_token.is_none());

    // checkout gone, stock durably allocated
    assert!(checkout::Entity::find_by_id(session.token)
        .one(&db)
        .await
        .expect("query")
        .is_none());
    let stock_row = stock::Entity::find()
        .filter(stock::Column::VariantId.eq(variant.id))
        .one(&db)
        .await
        .expect("query")
        .expect("stock");
    assert_eq!(stock_row.quantity_allocated, 2);
    assert_eq!(
        allocation::Entity::find().count(&db).await.expect("count"),
        1
    );
    // gateway never involved in the transaction flow
    assert_eq!(
        gateway
            .charge_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn unpaid_checkout_is_rejected_without_side_effects() {
    let db = setup_db().await;
    let channel = seed_channel(&db, MarkAsPaidStrategy::TransactionFlow, false, true).await;
    let warehouse = seed_warehouse(&db, channel.id).await;
    let variant = seed_variant(&db, channel.id, dec!(10)).await;
    seed_stock(&db, warehouse.id, variant.id, 5).await;
    let session = seed_checkout(&db, &channel).await;
    seed_line(&db, session.token, variant.id, 1).await;
    seed_transaction(&db, session.token, TransactionKind::Auth, dec!(5)).await;
    let session = set_authorize_status(&db, &session, AuthorizeStatus::Partial).await;

    let service = build_service(db.clone(), TestGateway::new(db.clone()));
    let err = service
        .complete_checkout(session.token, CompleteCheckoutParams::default())
        .await
        .expect_err("must reject");

    assert_matches!(err, CheckoutError::Validation(failure) => {
        assert_eq!(failure.code, CheckoutErrorCode::CheckoutNotFullyPaid);
        assert_eq!(failure.field, "id");
    });
    assert_eq!(order::Entity::find().count(&db).await.expect("count"), 0);
    assert!(checkout::Entity::find_by_id(session.token)
        .one(&db)
        .await
        .expect("query")
        .is_some());
}

#[tokio::test]
async fn unpaid_order_allowed_when_channel_permits() {
    let db = setup_db().await;
    let channel = seed_channel(&db, MarkAsPaidStrategy::TransactionFlow, true, true).await;
    let warehouse = seed_warehouse(&db, channel.id).await;
    let variant = seed_variant(&db, channel.id, dec!(10)).await;
    seed_stock(&db, warehouse.id, variant.id, 5).await;
    let session = seed_checkout(&db, &channel).await;
    seed_line(&db, session.token, variant.id, 1).await;

    let service = build_service(db.clone(), TestGateway::new(db.clone()));
    let outcome = service
        .complete_checkout(session.token, CompleteCheckoutParams::default())
        .await
        .expect("completion");

    let created = outcome.order.expect("order");
    // no payment transactions: auto-confirm alone does not confirm here
    assert_eq!(created.status, OrderStatus::Unconfirmed);
    assert_eq!(created.charge_status, PaymentCoverage::None);
    assert_eq!(created.total_charged, dec!(0));
}

#[tokio::test]
async fn zero_total_transaction_flow_is_not_auto_marked_paid() {
    let db = setup_db().await;
    let channel = seed_channel(&db, MarkAsPaidStrategy::TransactionFlow, false, true).await;
    let warehouse = seed_warehouse(&db, channel.id).await;
    let variant = seed_variant(&db, channel.id, dec!(0)).await;
    seed_stock(&db, warehouse.id, variant.id, 5).await;
    let session = seed_checkout(&db, &channel).await;
    seed_line(&db, session.token, variant.id, 1).await;
    let session = set_authorize_status(&db, &session, AuthorizeStatus::Full).await;

    let service = build_service(db.clone(), TestGateway::new(db.clone()));
    let outcome = service
        .complete_checkout(session.token, CompleteCheckoutParams::default())
        .await
        .expect("completion");

    let created = outcome.order.expect("order");
    assert_eq!(created.total_gross, dec!(0));
    assert_eq!(created.charge_status, PaymentCoverage::None);
    // no manual payment was fabricated
    assert_eq!(payment::Entity::find().count(&db).await.expect("count"), 0);
}

#[tokio::test]
async fn duplicate_completion_returns_the_same_order() {
    let db = setup_db().await;
    let channel = seed_channel(&db, MarkAsPaidStrategy::TransactionFlow, true, true).await;
    let warehouse = seed_warehouse(&db, channel.id).await;
    let variant = seed_variant(&db, channel.id, dec!(10)).await;
    seed_stock(&db, warehouse.id, variant.id, 5).await;
    let session = seed_checkout(&db, &channel).await;
    seed_line(&db, session.token, variant.id, 1).await;

    let service = build_service(db.clone(), TestGateway::new(db.clone()));
    let first = service
        .complete_checkout(session.token, CompleteCheckoutParams::default())
        .await
        .expect("first completion")
        .order
        .expect("order");
    let second = service
        .complete_checkout(session.token, CompleteCheckoutParams::default())
        .await
        .expect("second completion")
        .order
        .expect("order");

    assert_eq!(first.id, second.id);
    assert_eq!(order::Entity::find().count(&db).await.expect("count"), 1);
}

#[tokio::test]
async fn create_order_from_checkout_can_keep_the_checkout() {
    let db = setup_db().await;
    let channel = seed_channel(&db, MarkAsPaidStrategy::TransactionFlow, true, true).await;
    let warehouse = seed_warehouse(&db, channel.id).await;
    let variant = seed_variant(&db, channel.id, dec!(10)).await;
    seed_stock(&db, warehouse.id, variant.id, 5).await;
    let session = seed_checkout(&db, &channel).await;
    seed_line(&db, session.token, variant.id, 1).await;

    let service = build_service(db.clone(), TestGateway::new(db.clone()));
    let created = service
        .create_order_from_checkout(session.token, false, None, None)
        .await
        .expect("order");

    assert!(checkout::Entity::find_by_id(session.token)
        .one(&db)
        .await
        .expect("query")
        .is_some());
    // a second call hits the idempotency guard
    let again = service
        .create_order_from_checkout(session.token, false, None, None)
        .await
        .expect("order");
    assert_eq!(created.id, again.id);
}
