use crate::types::BidderRecord;

const HEADER: [&str; 5] = [
    "Wallet Address",
    "First Buy Time",
    "Total USD",
    "Transaction Count",
    "Average Buy USD",
];

/// Render ranked bidders as a CSV download
pub fn render_csv(bidders: &[BidderRecord]) -> Result<String, ::csv::Error> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    for bidder in bidders {
        writer.write_record([
            bidder.wallet_address.clone(),
            bidder.first_buy_time.to_rfc3339(),
            format!("${:.2}", bidder.total_usd),
            bidder.transaction_count.to_string(),
            format!("${:.2}", bidder.average_buy_usd),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    // All fields are UTF-8
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
