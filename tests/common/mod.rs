//! Shared harness for integration tests: in-memory SQLite, schema bootstrap,
//! seed helpers and a scriptable payment gateway.
#![allow(dead_code)]

use async_trait::async_trait;
use checkout_core::entities::channel::MarkAsPaidStrategy;
use checkout_core::entities::checkout::AuthorizeStatus;
use checkout_core::entities::payment_transaction::TransactionKind;
use checkout_core::entities::{
    address, channel, channel_listing, checkout, checkout_gift_card, checkout_line, gift_card,
    payment, payment_transaction, product_variant, shipping_method, stock, voucher, warehouse,
};
use checkout_core::errors::CheckoutError;
use checkout_core::{
    create_schema, establish_connection, events, CheckoutCompletionService, CheckoutConfig,
    FlatRatePricing, NoopHooks, PaymentGateway, TransactionResult,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub async fn setup_db() -> DatabaseConnection {
    checkout_core::logging::init_tracing("warn");
    let config = CheckoutConfig::for_database_url("sqlite::memory:");
    let db = establish_connection(&config).await.expect("connect");
    create_schema(&db).await.expect("schema");
    db
}

/// Scriptable gateway. `behavior` drives the outcome of charge calls;
/// `deactivate_after_charge` flips the payment row inactive mid-call to model
/// an external deactivation racing the completion.
pub struct TestGateway {
    pub behavior: Mutex<GatewayBehavior>,
    pub deactivate_after_charge: AtomicBool,
    pub charge_calls: AtomicUsize,
    pub refund_calls: AtomicUsize,
    db: DatabaseConnection,
}

#[derive(Clone, Copy, Debug)]
pub enum GatewayBehavior {
    Success,
    ActionRequired,
    Decline,
}

impl TestGateway {
    pub fn new(db: DatabaseConnection) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(GatewayBehavior::Success),
            deactivate_after_charge: AtomicBool::new(false),
            charge_calls: AtomicUsize::new(0),
            refund_calls: AtomicUsize::new(0),
            db,
        })
    }

    pub fn set_behavior(&self, behavior: GatewayBehavior) {
        *self.behavior.lock().expect("behavior lock") = behavior;
    }

    async fn charge(
        &self,
        payment: &payment::Model,
        amount: Decimal,
    ) -> Result<TransactionResult, CheckoutError> {
        self.charge_calls.fetch_add(1, Ordering::SeqCst);
        if self.deactivate_after_charge.load(Ordering::SeqCst) {
            let mut active: payment::ActiveModel = payment.clone().into();
            active.is_active = Set(false);
            active.update(&self.db).await?;
        }
        let behavior = *self.behavior.lock().expect("behavior lock");
        let result = match behavior {
            GatewayBehavior::Success => TransactionResult {
                kind: TransactionKind::Capture,
                is_success: true,
                amount,
                currency: payment.currency.clone(),
                error: None,
                customer_id: Some("cus_test".to_string()),
                action_required: false,
                action_required_data: json!({}),
            },
            GatewayBehavior::ActionRequired => TransactionResult {
                kind: TransactionKind::Auth,
                is_success: true,
                amount,
                currency: payment.currency.clone(),
                error: None,
                customer_id: None,
                action_required: true,
                action_required_data: json!({"confirmation": "3ds-redirect"}),
            },
            GatewayBehavior::Decline => TransactionResult {
                kind: TransactionKind::Capture,
                is_success: false,
                amount,
                currency: payment.currency.clone(),
                error: Some("Card declined".to_string()),
                customer_id: None,
                action_required: false,
                action_required_data: json!({}),
            },
        };
        Ok(result)
    }
}

#[async_trait]
impl PaymentGateway for TestGateway {
    async fn confirm(
        &self,
        payment: &payment::Model,
        amount: Decimal,
    ) -> Result<TransactionResult, CheckoutError> {
        self.charge(payment, amount).await
    }

    async fn process_payment(
        &self,
        payment: &payment::Model,
        amount: Decimal,
        _store_payment_method: bool,
    ) -> Result<TransactionResult, CheckoutError> {
        self.charge(payment, amount).await
    }

    async fn refund_or_void(
        &self,
        payment: &payment::Model,
    ) -> Result<TransactionResult, CheckoutError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TransactionResult {
            kind: TransactionKind::Void,
            is_success: true,
            amount: payment.total,
            currency: payment.currency.clone(),
            error: None,
            customer_id: None,
            action_required: false,
            action_required_data: json!({}),
        })
    }
}

pub fn build_service(
    db: DatabaseConnection,
    gateway: Arc<TestGateway>,
) -> CheckoutCompletionService {
    let (sender, receiver) = events::channel(64);
    tokio::spawn(events::process_events(receiver));
    CheckoutCompletionService::new(
        db,
        CheckoutConfig::for_database_url("sqlite::memory:"),
        Arc::new(FlatRatePricing::tax_free()),
        gateway,
        Arc::new(NoopHooks),
        sender,
    )
}

pub async fn seed_channel(
    db: &DatabaseConnection,
    strategy: MarkAsPaidStrategy,
    allow_unpaid: bool,
    auto_confirm: bool,
) -> channel::Model {
    channel::ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(format!("channel-{}", Uuid::new_v4().simple())),
        name: Set("Default".to_string()),
        is_active: Set(true),
        currency: Set("USD".to_string()),
        default_country: Set("US".to_string()),
        automatically_confirm_all_new_orders: Set(auto_confirm),
        allow_unpaid_orders: Set(allow_unpaid),
        order_mark_as_paid_strategy: Set(strategy),
        prices_entered_with_tax: Set(false),
    }
    .insert(db)
    .await
    .expect("seed channel")
}

pub async fn seed_address(db: &DatabaseConnection) -> address::Model {
    address::ActiveModel {
        id: Set(Uuid::new_v4()),
        first_name: Set("Ada".to_string()),
        last_name: Set("Lovelace".to_string()),
        company: Set(None),
        street_address_1: Set("1 Analytical Way".to_string()),
        street_address_2: Set(None),
        city: Set("London".to_string()),
        postal_code: Set("00100".to_string()),
        country_code: Set("US".to_string()),
        phone: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed address")
}

pub async fn seed_warehouse(db: &DatabaseConnection, channel_id: Uuid) -> warehouse::Model {
    warehouse::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Main".to_string()),
        channel_id: Set(channel_id),
        country_code: Set("US".to_string()),
        priority: Set(0),
    }
    .insert(db)
    .await
    .expect("seed warehouse")
}

pub async fn seed_variant(
    db: &DatabaseConnection,
    channel_id: Uuid,
    price: Decimal,
) -> product_variant::Model {
    let variant = product_variant::ActiveModel {
        id: Set(Uuid::new_v4()),
        sku: Set(Some(format!("SKU-{}", Uuid::new_v4().simple()))),
        name: Set("Small".to_string()),
        product_name: Set("T-Shirt".to_string()),
        track_inventory: Set(true),
        is_shipping_required: Set(true),
        is_gift_card: Set(false),
        is_preorder: Set(false),
        preorder_global_threshold: Set(None),
    }
    .insert(db)
    .await
    .expect("seed variant");

    channel_listing::ActiveModel {
        id: Set(Uuid::new_v4()),
        variant_id: Set(variant.id),
        channel_id: Set(channel_id),
        price_amount: Set(price),
        undiscounted_price_amount: Set(price),
        preorder_quantity_threshold: Set(None),
        preorder_quantity_allocated: Set(0),
    }
    .insert(db)
    .await
    .expect("seed listing");

    variant
}

pub async fn seed_stock(
    db: &DatabaseConnection,
    warehouse_id: Uuid,
    variant_id: Uuid,
    quantity: i32,
) -> stock::Model {
    stock::ActiveModel {
        id: Set(Uuid::new_v4()),
        warehouse_id: Set(warehouse_id),
        variant_id: Set(variant_id),
        quantity: Set(quantity),
        quantity_allocated: Set(0),
    }
    .insert(db)
    .await
    .expect("seed stock")
}

pub async fn seed_checkout(db: &DatabaseConnection, channel: &channel::Model) -> checkout::Model {
    let billing = seed_address(db).await;
    let shipping = seed_address(db).await;
    let method = shipping_method::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Standard".to_string()),
        channel_id: Set(channel.id),
        price_amount: Set(Decimal::ZERO),
    }
    .insert(db)
    .await
    .expect("seed shipping method");

    checkout::ActiveModel {
        token: Set(Uuid::new_v4()),
        channel_id: Set(channel.id),
        user_id: Set(None),
        email: Set(Some("buyer@example.com".to_string())),
        currency: Set("USD".to_string()),
        country_code: Set("US".to_string()),
        language_code: Set("en".to_string()),
        billing_address_id: Set(Some(billing.id)),
        shipping_address_id: Set(Some(shipping.id)),
        shipping_method_id: Set(Some(method.id)),
        collection_point_id: Set(None),
        voucher_code: Set(None),
        discount_amount: Set(Decimal::ZERO),
        discount_name: Set(None),
        translated_discount_name: Set(None),
        redirect_url: Set(None),
        note: Set(String::new()),
        tracking_code: Set(None),
        tax_exemption: Set(false),
        authorize_status: Set(AuthorizeStatus::None),
        metadata: Set(json!({})),
        private_metadata: Set(json!({})),
        created_at: Set(Utc::now()),
        last_change: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed checkout")
}

pub async fn seed_line(
    db: &DatabaseConnection,
    checkout_token: Uuid,
    variant_id: Uuid,
    quantity: i32,
) -> checkout_line::Model {
    checkout_line::ActiveModel {
        id: Set(Uuid::new_v4()),
        checkout_token: Set(checkout_token),
        variant_id: Set(variant_id),
        quantity: Set(quantity),
        promotion_rule_id: Set(None),
        voucher_applies: Set(false),
        metadata: Set(json!({})),
        private_metadata: Set(json!({})),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed line")
}

pub async fn set_authorize_status(
    db: &DatabaseConnection,
    checkout: &checkout::Model,
    status: AuthorizeStatus,
) -> checkout::Model {
    let mut active: checkout::ActiveModel = checkout.clone().into();
    active.authorize_status = Set(status);
    active.update(db).await.expect("update authorize status")
}

pub async fn seed_voucher(
    db: &DatabaseConnection,
    code: &str,
    usage_limit: Option<i32>,
    apply_once_per_customer: bool,
) -> voucher::Model {
    voucher::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        name: Set(Some("Test voucher".to_string())),
        is_active: Set(true),
        usage_limit: Set(usage_limit),
        used: Set(0),
        apply_once_per_customer: Set(apply_once_per_customer),
    }
    .insert(db)
    .await
    .expect("seed voucher")
}

pub async fn apply_voucher(
    db: &DatabaseConnection,
    checkout: &checkout::Model,
    code: &str,
    discount_amount: Decimal,
) -> checkout::Model {
    let mut active: checkout::ActiveModel = checkout.clone().into();
    active.voucher_code = Set(Some(code.to_string()));
    active.discount_amount = Set(discount_amount);
    active.discount_name = Set(Some(code.to_string()));
    active.update(db).await.expect("apply voucher")
}

pub async fn seed_payment(
    db: &DatabaseConnection,
    checkout_token: Uuid,
    total: Decimal,
) -> payment::Model {
    payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        checkout_token: Set(Some(checkout_token)),
        order_id: Set(None),
        gateway: Set("test".to_string()),
        is_active: Set(true),
        to_confirm: Set(false),
        token: Set(Some("tok_test".to_string())),
        psp_reference: Set(None),
        currency: Set("USD".to_string()),
        total: Set(total),
        captured_amount: Set(Decimal::ZERO),
        charge_status: Set("not-charged".to_string()),
        created_at: Set(Utc::now()),
        modified_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed payment")
}

pub async fn seed_transaction(
    db: &DatabaseConnection,
    checkout_token: Uuid,
    kind: TransactionKind,
    amount: Decimal,
) -> payment_transaction::Model {
    payment_transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        payment_id: Set(None),
        checkout_token: Set(Some(checkout_token)),
        order_id: Set(None),
        kind: Set(kind),
        is_success: Set(true),
        amount: Set(amount),
        currency: Set("USD".to_string()),
        action_required: Set(false),
        action_required_data: Set(json!({})),
        customer_id: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed transaction")
}

pub async fn seed_gift_card(
    db: &DatabaseConnection,
    checkout_token: Uuid,
    balance: Decimal,
) -> gift_card::Model {
    let card = gift_card::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(format!("GC-{}", Uuid::new_v4().simple())),
        is_active: Set(true),
        expiry_date: Set(None),
        currency: Set("USD".to_string()),
        initial_balance_amount: Set(balance),
        current_balance_amount: Set(balance),
        used_in_order_id: Set(None),
        last_used_on: Set(None),
    }
    .insert(db)
    .await
    .expect("seed gift card");

    checkout_gift_card::ActiveModel {
        id: Set(Uuid::new_v4()),
        checkout_token: Set(checkout_token),
        gift_card_id: Set(card.id),
    }
    .insert(db)
    .await
    .expect("link gift card");

    card
}
