use checkout_core::customer::{Address, Customer, CustomerRequest, PostalAddress, ShippingDetails};
use checkout_core::{CheckoutProvider, ProviderResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Finds or creates the remote customer for an email address.
pub struct CustomerResolver {
    provider: Arc<dyn CheckoutProvider>,
}

impl CustomerResolver {
    pub fn new(provider: Arc<dyn CheckoutProvider>) -> Self {
        Self { provider }
    }

    /// Returns the first customer the provider lists for `email`, or creates one.
    ///
    /// When several customers share an email the provider's ordering decides
    /// which one is returned; it is not guaranteed to be stable.
    pub async fn resolve(
        &self,
        email: &str,
        billing_address: &Address,
        shipping_address: &Address,
    ) -> ProviderResult<Customer> {
        let matches = self.provider.search_customers(email).await?;

        if let Some(existing) = matches.into_iter().next() {
            debug!("Reusing remote customer {}", existing.id);
            return Ok(existing);
        }

        let request = customer_request(email, billing_address, shipping_address);
        let customer = self.provider.create_customer(&request).await?;
        info!("Created remote customer {}", customer.id);

        Ok(customer)
    }
}

/// `"{company} ({name})"` when a company is set, otherwise the plain name.
pub fn display_name(address: &Address) -> String {
    match address.company.as_deref().map(str::trim) {
        Some(company) if !company.is_empty() => format!("{} ({})", company, address.name),
        _ => address.name.clone(),
    }
}

/// Keeps the first two address lines, the rest are dropped.
pub fn postal_address(address: &Address) -> PostalAddress {
    PostalAddress {
        line1: address.lines.first().cloned().unwrap_or_default(),
        line2: address.lines.get(1).cloned().unwrap_or_default(),
        city: address.city.clone(),
        country: address.country_code.clone(),
        postal_code: address.postal_code.clone(),
        state: address.state.clone(),
    }
}

pub fn customer_request(email: &str, billing_address: &Address, shipping_address: &Address) -> CustomerRequest {
    CustomerRequest {
        email: email.to_string(),
        address: postal_address(billing_address),
        shipping: ShippingDetails {
            name: display_name(shipping_address),
            address: postal_address(shipping_address),
        },
    }
}
