//! Loan products, tier tables, and the quotation engine.
//!
//! One resolver backs both the public simulator and the re-application
//! form: a requested amount maps to the largest tier at or below it, so
//! the two surfaces can never quote different rates for the same figure.

mod resolver;
mod tables;

pub use resolver::{resolve_option, AmountOutOfRange};

use serde::{Deserialize, Serialize};

/// Loan products offered to returning borrowers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanType {
    #[serde(rename = "Regular Loan With Collateral")]
    RegularWithCollateral,
    #[serde(rename = "Regular Loan Without Collateral")]
    RegularWithoutCollateral,
    #[serde(rename = "Open-Term Loan")]
    OpenTerm,
}

impl LoanType {
    pub const ALL: [LoanType; 3] = [
        LoanType::RegularWithCollateral,
        LoanType::RegularWithoutCollateral,
        LoanType::OpenTerm,
    ];

    pub const fn label(&self) -> &'static str {
        match self {
            LoanType::RegularWithCollateral => "Regular Loan With Collateral",
            LoanType::RegularWithoutCollateral => "Regular Loan Without Collateral",
            LoanType::OpenTerm => "Open-Term Loan",
        }
    }

    /// Backend path segment for the matching re-application endpoint.
    pub const fn submission_segment(&self) -> &'static str {
        match self {
            LoanType::RegularWithCollateral => "reloan/with-collateral",
            LoanType::RegularWithoutCollateral => "reloan/without-collateral",
            LoanType::OpenTerm => "reloan/open-term",
        }
    }

    pub const fn requires_collateral(&self) -> bool {
        matches!(self, LoanType::RegularWithCollateral | LoanType::OpenTerm)
    }

    /// Exact number of supporting documents the product requires.
    pub const fn required_document_count(&self) -> usize {
        match self {
            LoanType::RegularWithCollateral | LoanType::OpenTerm => 6,
            LoanType::RegularWithoutCollateral => 4,
        }
    }

    /// Ascending tier table for the product.
    pub fn options(&self) -> &'static [LoanOption] {
        match self {
            LoanType::RegularWithCollateral => tables::REGULAR_WITH_COLLATERAL,
            LoanType::RegularWithoutCollateral => tables::REGULAR_WITHOUT_COLLATERAL,
            LoanType::OpenTerm => tables::OPEN_TERM,
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|loan_type| trimmed.eq_ignore_ascii_case(loan_type.label()))
    }
}

impl Default for LoanType {
    fn default() -> Self {
        LoanType::RegularWithoutCollateral
    }
}

/// A single rate/term tier. Open-term tiers carry no month count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanOption {
    pub amount: u64,
    pub months: Option<u32>,
    pub interest_rate: f64,
}

/// How an outstanding balance from the previous loan is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceDecision {
    #[serde(rename = "addPrincipal")]
    AddToPrincipal,
    #[serde(rename = "deductProceeds")]
    DeductFromProceeds,
}

impl BalanceDecision {
    pub const fn as_field(&self) -> &'static str {
        match self {
            BalanceDecision::AddToPrincipal => "addPrincipal",
            BalanceDecision::DeductFromProceeds => "deductProceeds",
        }
    }

    pub fn from_field(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("addPrincipal") {
            Some(Self::AddToPrincipal)
        } else if trimmed.eq_ignore_ascii_case("deductProceeds") {
            Some(Self::DeductFromProceeds)
        } else {
            None
        }
    }
}

/// Full quotation for a requested amount, including the amortization
/// sample and the figures attached to a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanQuote {
    pub loan_type: LoanType,
    pub requested_amount: u64,
    pub previous_balance: u64,
    pub balance_decision: BalanceDecision,
    /// Amount the tier lookup and interest math run against.
    pub adjusted_amount: u64,
    pub option: LoanOption,
    pub interest_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_interest: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_payable: Option<f64>,
    pub monthly_due: f64,
    pub service_fee: f64,
    pub net_proceeds: f64,
}

/// Quote a loan for `requested` pesos carrying `previous_balance` from the
/// prior loan. Under the add-to-principal decision the balance joins the
/// principal before the tier lookup; under deduct it comes out of the
/// proceeds instead.
pub fn quote(
    loan_type: LoanType,
    requested: u64,
    previous_balance: u64,
    decision: BalanceDecision,
) -> Result<LoanQuote, AmountOutOfRange> {
    let adjusted = match decision {
        BalanceDecision::AddToPrincipal => requested + previous_balance,
        BalanceDecision::DeductFromProceeds => requested,
    };

    let option = resolve_option(loan_type, adjusted)?;

    let principal = adjusted as f64;
    let interest_amount = round_centavos(principal * option.interest_rate / 100.0);
    let (total_interest, total_payable, monthly_due) = match option.months {
        Some(months) => {
            let total_interest = round_centavos(interest_amount * months as f64);
            let total_payable = round_centavos(principal + total_interest);
            let monthly_due = round_centavos(total_payable / months as f64);
            (Some(total_interest), Some(total_payable), monthly_due)
        }
        // Open-term: interest-only schedule, no fixed totals.
        None => (None, None, interest_amount),
    };

    let service_fee = service_fee(adjusted);
    let settlement = match decision {
        BalanceDecision::DeductFromProceeds => previous_balance as f64,
        BalanceDecision::AddToPrincipal => 0.0,
    };
    let net_proceeds = round_centavos(principal - service_fee - settlement);

    Ok(LoanQuote {
        loan_type,
        requested_amount: requested,
        previous_balance,
        balance_decision: decision,
        adjusted_amount: adjusted,
        option,
        interest_amount,
        total_interest,
        total_payable,
        monthly_due,
        service_fee,
        net_proceeds,
    })
}

/// Processing fee brackets by principal.
pub fn service_fee(principal: u64) -> f64 {
    match principal {
        6_000..=20_000 => round_centavos(principal as f64 * 0.05),
        25_000..=45_000 => 1_000.0,
        principal if principal >= 50_000 => round_centavos(principal as f64 * 0.03),
        _ => 0.0,
    }
}

pub(crate) fn round_centavos(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// "₱1,234,567.00" style rendering for user-facing amounts.
pub fn format_peso(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("\u{20b1}{grouped}.00")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-6
    }

    #[test]
    fn document_requirements_by_product() {
        assert_eq!(LoanType::RegularWithCollateral.required_document_count(), 6);
        assert_eq!(LoanType::OpenTerm.required_document_count(), 6);
        assert_eq!(LoanType::RegularWithoutCollateral.required_document_count(), 4);
    }

    #[test]
    fn tier_tables_are_ascending() {
        for loan_type in LoanType::ALL {
            let table = loan_type.options();
            assert!(!table.is_empty());
            for pair in table.windows(2) {
                assert!(pair[0].amount < pair[1].amount, "{:?} table out of order", loan_type);
            }
        }
    }

    #[test]
    fn open_term_tiers_have_no_month_count() {
        assert!(LoanType::OpenTerm.options().iter().all(|option| option.months.is_none()));
        assert!(LoanType::RegularWithoutCollateral
            .options()
            .iter()
            .all(|option| option.months.is_some()));
    }

    #[test]
    fn service_fee_brackets() {
        assert!(close(service_fee(5_000), 0.0));
        assert!(close(service_fee(6_000), 300.0));
        assert!(close(service_fee(12_000), 600.0));
        assert!(close(service_fee(20_000), 1_000.0));
        assert!(close(service_fee(22_000), 0.0));
        assert!(close(service_fee(25_000), 1_000.0));
        assert!(close(service_fee(45_000), 1_000.0));
        assert!(close(service_fee(47_000), 0.0));
        assert!(close(service_fee(50_000), 1_500.0));
        assert!(close(service_fee(200_000), 6_000.0));
    }

    #[test]
    fn quote_amortizes_fixed_term_products() {
        let quote = quote(
            LoanType::RegularWithoutCollateral,
            20_000,
            0,
            BalanceDecision::DeductFromProceeds,
        )
        .expect("amount within table");

        assert_eq!(quote.option.amount, 20_000);
        assert_eq!(quote.option.months, Some(8));
        assert!(close(quote.interest_amount, 1_800.0));
        assert!(close(quote.total_interest.expect("fixed term"), 14_400.0));
        assert!(close(quote.total_payable.expect("fixed term"), 34_400.0));
        assert!(close(quote.monthly_due, 4_300.0));
        assert!(close(quote.service_fee, 1_000.0));
        assert!(close(quote.net_proceeds, 19_000.0));
    }

    #[test]
    fn quote_open_term_is_interest_only() {
        let quote = quote(LoanType::OpenTerm, 100_000, 0, BalanceDecision::DeductFromProceeds)
            .expect("amount within table");

        assert_eq!(quote.option.months, None);
        assert!(quote.total_interest.is_none());
        assert!(quote.total_payable.is_none());
        assert!(close(quote.interest_amount, 4_500.0));
        assert!(close(quote.monthly_due, 4_500.0));
    }

    #[test]
    fn add_to_principal_drives_validation_but_keeps_requested_amount() {
        let quote = quote(LoanType::OpenTerm, 50_000, 5_000, BalanceDecision::AddToPrincipal)
            .expect("55k passes the 50k-500k window");

        assert_eq!(quote.requested_amount, 50_000);
        assert_eq!(quote.adjusted_amount, 55_000);
        assert_eq!(quote.option.amount, 50_000);
        assert!(close(quote.service_fee, 1_650.0));
        // Balance folded into principal is not taken from the proceeds.
        assert!(close(quote.net_proceeds, 53_350.0));
    }

    #[test]
    fn deduct_decision_reduces_proceeds() {
        let quote = quote(
            LoanType::RegularWithoutCollateral,
            20_000,
            5_000,
            BalanceDecision::DeductFromProceeds,
        )
        .expect("within table");

        assert_eq!(quote.adjusted_amount, 20_000);
        assert!(close(quote.service_fee, 1_000.0));
        assert!(close(quote.net_proceeds, 14_000.0));
    }

    #[test]
    fn peso_formatting_groups_thousands() {
        assert_eq!(format_peso(500), "\u{20b1}500.00");
        assert_eq!(format_peso(10_000), "\u{20b1}10,000.00");
        assert_eq!(format_peso(1_234_567), "\u{20b1}1,234,567.00");
    }

    #[test]
    fn loan_type_labels_round_trip() {
        for loan_type in LoanType::ALL {
            assert_eq!(LoanType::from_label(loan_type.label()), Some(loan_type));
        }
        assert_eq!(LoanType::from_label("  open-term loan "), Some(LoanType::OpenTerm));
        assert_eq!(LoanType::from_label("Payday Loan"), None);
    }
}
