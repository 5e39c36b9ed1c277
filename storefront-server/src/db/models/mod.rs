//! Database Models
//!
//! Model structs plus the Create/Update payloads per table.
//! Update payloads carry one `Option` per attribute: only provided
//! fields are applied, with no cross-field validation.

pub mod customer;
pub mod order;
pub mod product;
pub mod serde_helpers;
pub mod user;

pub use customer::{Customer, CustomerCreate, CustomerFilter, CustomerUpdate};
pub use order::{
    Order, OrderCreate, OrderDetail, OrderFilter, OrderLineCreate, OrderLineItem, OrderUpdate,
};
pub use product::{Product, ProductCreate, ProductFilter, ProductUpdate};
pub use user::{User, UserCreate};
