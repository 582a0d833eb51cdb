//! sea-orm entities for the checkout completion core.

pub mod address;
pub mod allocation;
pub mod channel;
pub mod channel_listing;
pub mod checkout;
pub mod checkout_gift_card;
pub mod checkout_line;
pub mod customer;
pub mod customer_address;
pub mod gift_card;
pub mod order;
pub mod order_discount;
pub mod order_line;
pub mod order_line_discount;
pub mod payment;
pub mod payment_transaction;
pub mod product_variant;
pub mod promotion_rule;
pub mod reservation;
pub mod shipping_method;
pub mod stock;
pub mod variant_translation;
pub mod voucher;
pub mod voucher_customer;
pub mod warehouse;
