use serde_json::Value;

use prodsearch_core::MergedResult;

pub const DEFAULT_CURRENCY_FIELD: &str = "default_currency";

/// Fills `region_price` and `region_currency` from the document's
/// `price_reg_<id>` and `currency_reg_<id>` fields, falling back to the
/// default price and currency.
pub fn apply_region_prices(results: &mut [MergedResult], region_id: &str, price_field: &str) {
    let price_key = format!("price_reg_{region_id}");
    let currency_key = format!("currency_reg_{region_id}");
    for r in results.iter_mut() {
        let doc = &r.document;
        r.region_price =
            doc.get(&price_key).and_then(Value::as_f64).or_else(|| doc.get(price_field).and_then(Value::as_f64));
        r.region_currency = doc
            .get(&currency_key)
            .and_then(Value::as_str)
            .or_else(|| doc.get(DEFAULT_CURRENCY_FIELD).and_then(Value::as_str))
            .map(str::to_string);
    }
}
