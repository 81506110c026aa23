use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDebtorRequest {
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(length(min = 7, max = 32))]
    pub phone_number: String,
    #[validate(length(min = 1))]
    pub address: String,
    pub note: Option<String>,
    pub image: Option<String>,
    /// Required when an admin creates the debtor; stores always use their own id.
    pub store_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateDebtorRequest {
    #[validate(length(min = 1, max = 255))]
    pub full_name: Option<String>,
    #[validate(length(min = 7, max = 32))]
    pub phone_number: Option<String>,
    #[validate(length(min = 1))]
    pub address: Option<String>,
    pub note: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddDebtorImageRequest {
    pub debtor_id: Uuid,
    #[validate(length(min = 1))]
    pub image: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddDebtorPhoneRequest {
    pub debtor_id: Uuid,
    #[validate(length(min = 7, max = 32))]
    pub phone_number: String,
}
