//! Lifecycle service implementations.
//!
//! Each service holds the shared [`AppState`](crate::AppState) and receives the
//! caller's [`SessionContext`](storefront_core::SessionContext) explicitly.
//! Mutations return [`Outcome`](crate::Outcome) so the router can wrap them in
//! an [`ActionResult`](crate::ActionResult).

pub mod account;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod payment;

pub use account::AccountService;
pub use cart::CartService;
pub use catalog::CatalogService;
pub use order::OrderService;
pub use payment::PaymentService;
