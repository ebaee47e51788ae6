use serde::{Deserialize, Serialize};

/// Postal address as held by the order domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub name: String,
    pub company: Option<String>,
    pub lines: Vec<String>,
    pub city: String,
    pub postal_code: String,
    pub country_code: String, // ISO 3166-1 alpha-2
    pub state: Option<String>,
}

/// Address in the shape the provider stores on a customer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PostalAddress {
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub country: String,
    pub postal_code: String,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShippingDetails {
    pub name: String,
    pub address: PostalAddress,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CustomerRequest {
    pub email: String,
    pub address: PostalAddress,
    pub shipping: ShippingDetails,
}

/// Remote customer record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
    pub email: Option<String>,
}
