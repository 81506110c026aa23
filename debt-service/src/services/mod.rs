pub mod auth;
pub mod database;
pub mod error;
pub mod jwt;
pub mod metrics;
pub mod statistics;
pub mod storage;

pub use auth::{AuthService, IssuedTokens};
pub use database::{
    AdminChanges, Database, DebtChanges, DebtorChanges, NewDebt, NewDebtor, NewStore,
    PaymentChanges, Scope, StoreChanges,
};
pub use error::ServiceError;
pub use jwt::{Claims, JwtService, Role, TokenKind};
pub use statistics::StatisticsService;
pub use storage::{LocalStorage, Storage};
