pub mod cart;
pub mod cart_item;
pub mod category;
pub mod dining_table;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod payment_method;
pub mod product;
pub mod table_update_log;
pub mod transaction_history;
pub mod user;
pub mod wallet;
