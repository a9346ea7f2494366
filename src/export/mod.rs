//! Result exports: acronym labels, wallet-tracker import lists and CSV

pub mod acronym;
pub mod csv;
pub mod wallet_tracker;

pub use acronym::acronym;
pub use self::csv::render_csv;
pub use wallet_tracker::{build_export_list, WalletTrackerEntry, DEFAULT_WALLET_LIMIT};
