//! Form encoding of request bodies in Stripe's bracketed notation.

use checkout_core::customer::{CustomerRequest, PostalAddress};
use checkout_core::payment::{SessionRequest, ORDER_ID_METADATA_KEY};

pub(crate) type FormParams = Vec<(String, String)>;

fn push(params: &mut FormParams, key: impl Into<String>, value: impl ToString) {
    params.push((key.into(), value.to_string()));
}

pub(crate) fn session_params(request: &SessionRequest) -> FormParams {
    let mut params = FormParams::new();

    push(&mut params, "mode", "payment");
    push(&mut params, "customer", &request.customer_id);
    push(&mut params, "success_url", &request.success_url);
    push(&mut params, "cancel_url", &request.cancel_url);
    push(&mut params, format!("metadata[{}]", ORDER_ID_METADATA_KEY), request.order_id);
    push(&mut params, "payment_intent_data[capture_method]", request.capture_method.as_str());
    push(
        &mut params,
        format!("payment_intent_data[metadata][{}]", ORDER_ID_METADATA_KEY),
        request.order_id,
    );

    let rate = "shipping_options[0][shipping_rate_data]";
    push(&mut params, format!("{rate}[type]"), "fixed_amount");
    push(&mut params, format!("{rate}[display_name]"), &request.shipping.display_name);
    push(&mut params, format!("{rate}[fixed_amount][amount]"), request.shipping.amount);
    push(&mut params, format!("{rate}[fixed_amount][currency]"), &request.shipping.currency);
    push(&mut params, format!("{rate}[tax_behavior]"), "inclusive");

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        push(&mut params, format!("{prefix}[quantity]"), item.quantity);
        push(&mut params, format!("{prefix}[price_data][currency]"), &item.currency);
        push(&mut params, format!("{prefix}[price_data][unit_amount]"), item.unit_amount);
        push(&mut params, format!("{prefix}[price_data][product_data][name]"), &item.name);
        push(&mut params, format!("{prefix}[price_data][tax_behavior]"), "inclusive");
    }

    params
}

fn push_address(params: &mut FormParams, prefix: &str, address: &PostalAddress) {
    push(params, format!("{prefix}[line1]"), &address.line1);
    push(params, format!("{prefix}[line2]"), &address.line2);
    push(params, format!("{prefix}[city]"), &address.city);
    push(params, format!("{prefix}[country]"), &address.country);
    push(params, format!("{prefix}[postal_code]"), &address.postal_code);
    if let Some(state) = &address.state {
        push(params, format!("{prefix}[state]"), state);
    }
}

pub(crate) fn customer_params(request: &CustomerRequest) -> FormParams {
    let mut params = FormParams::new();
    push(&mut params, "email", &request.email);
    push_address(&mut params, "address", &request.address);
    push(&mut params, "shipping[name]", &request.shipping.name);
    push_address(&mut params, "shipping[address]", &request.shipping.address);
    params
}

/// Exact match query for the customer search endpoint.
pub(crate) fn email_query(email: &str) -> String {
    let escaped = email.replace('\\', "\\\\").replace('\'', "\\'");
    format!("email:'{}'", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::customer::ShippingDetails;
    use checkout_core::payment::{CaptureMethod, LineItem, ShippingRate};
    use uuid::Uuid;

    fn value<'a>(params: &'a FormParams, key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn address() -> PostalAddress {
        PostalAddress {
            line1: "12 St James's Square".to_string(),
            line2: String::new(),
            city: "London".to_string(),
            country: "GB".to_string(),
            postal_code: "SW1Y 4JH".to_string(),
            state: None,
        }
    }

    #[test]
    fn test_session_params() {
        let order_id = Uuid::new_v4();
        let request = SessionRequest {
            order_id,
            customer_id: "cus_1".to_string(),
            line_items: vec![
                LineItem { name: "Poster".to_string(), unit_amount: 1250, quantity: 2, currency: "eur".to_string() },
                LineItem { name: "Cards".to_string(), unit_amount: 500, quantity: 1, currency: "eur".to_string() },
            ],
            shipping: ShippingRate { display_name: "Standard Parcel".to_string(), amount: 490, currency: "eur".to_string() },
            success_url: "https://shop.example/ok".to_string(),
            cancel_url: "https://shop.example/cancel".to_string(),
            capture_method: CaptureMethod::Manual,
        };

        let params = session_params(&request);

        assert_eq!(value(&params, "mode"), Some("payment"));
        assert_eq!(value(&params, "customer"), Some("cus_1"));
        assert_eq!(value(&params, "metadata[order_id]"), Some(order_id.to_string().as_str()));
        assert_eq!(value(&params, "payment_intent_data[capture_method]"), Some("manual"));
        assert_eq!(value(&params, "shipping_options[0][shipping_rate_data][fixed_amount][amount]"), Some("490"));
        assert_eq!(value(&params, "shipping_options[0][shipping_rate_data][tax_behavior]"), Some("inclusive"));
        assert_eq!(value(&params, "line_items[0][price_data][unit_amount]"), Some("1250"));
        assert_eq!(value(&params, "line_items[0][quantity]"), Some("2"));
        assert_eq!(value(&params, "line_items[1][price_data][product_data][name]"), Some("Cards"));
        assert_eq!(value(&params, "line_items[1][price_data][tax_behavior]"), Some("inclusive"));
        assert_eq!(value(&params, "line_items[2][quantity]"), None);
    }

    #[test]
    fn test_customer_params_skip_missing_state() {
        let mut shipping_address = address();
        shipping_address.state = Some("Greater London".to_string());
        let request = CustomerRequest {
            email: "ada@example.com".to_string(),
            address: address(),
            shipping: ShippingDetails { name: "Ada Lovelace".to_string(), address: shipping_address },
        };

        let params = customer_params(&request);

        assert_eq!(value(&params, "address[line2]"), Some(""));
        assert_eq!(value(&params, "address[state]"), None);
        assert_eq!(value(&params, "shipping[name]"), Some("Ada Lovelace"));
        assert_eq!(value(&params, "shipping[address][state]"), Some("Greater London"));
    }

    #[test]
    fn test_email_query_escapes_quotes() {
        assert_eq!(email_query("ada@example.com"), "email:'ada@example.com'");
        assert_eq!(email_query("o'brien@example.com"), "email:'o\\'brien@example.com'");
    }
}
