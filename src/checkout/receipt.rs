use crate::config::SiteConfiguration;
use crate::payments::errors::{PaymentError, PaymentResult};
use reqwest::Url;

/// Storefront receipt page for a placed order
pub fn receipt_page_url(order_number: &str, site: &SiteConfiguration) -> PaymentResult<Url> {
    let base = site.ecommerce_url(&site.receipt_path);
    let mut url = Url::parse(&base).map_err(|e| {
        PaymentError::configuration(format!("Invalid receipt URL {}: {}", base, e))
    })?;
    url.query_pairs_mut()
        .append_pair("order_number", order_number);
    Ok(url)
}
