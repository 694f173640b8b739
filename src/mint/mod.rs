pub mod params;
pub mod record;
pub mod eligibility;
pub mod ledger;
pub mod mirror;
pub mod service;

pub use params::{MintingParameters, Wei};
pub use record::{MintRecord, MintStatus};
pub use eligibility::{check_eligibility, get_mint_price, is_eligible, EligibilityChecker};
pub use ledger::{AdminChange, MintLedger, MintReceipt, Role};
pub use mirror::MintedMirror;
pub use service::{MintQuote, MintService};
