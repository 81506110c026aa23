//! Persistent entities of the debt back office.

pub mod admin;
pub mod debt;
pub mod debtor;
pub mod like;
pub mod payment;
pub mod refresh_session;
pub mod store;

pub use admin::{Admin, AdminRole};
pub use debt::{Debt, DebtImage};
pub use debtor::{Debtor, DebtorImage, DebtorPhone};
pub use like::Like;
pub use payment::{Payment, PaymentType};
pub use refresh_session::{RefreshSession, SubjectKind};
pub use store::Store;
