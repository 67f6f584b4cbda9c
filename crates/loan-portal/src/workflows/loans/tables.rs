use super::LoanOption;

/// Tier tables per product, ascending by amount. Rates are percent per
/// month; open-term tiers have no fixed term.

pub(super) const REGULAR_WITH_COLLATERAL: &[LoanOption] = &[
    LoanOption { amount: 50_000, months: Some(12), interest_rate: 4.0 },
    LoanOption { amount: 75_000, months: Some(18), interest_rate: 4.0 },
    LoanOption { amount: 100_000, months: Some(24), interest_rate: 3.5 },
    LoanOption { amount: 150_000, months: Some(30), interest_rate: 3.5 },
    LoanOption { amount: 200_000, months: Some(36), interest_rate: 3.0 },
    LoanOption { amount: 300_000, months: Some(36), interest_rate: 2.5 },
];

pub(super) const REGULAR_WITHOUT_COLLATERAL: &[LoanOption] = &[
    LoanOption { amount: 10_000, months: Some(5), interest_rate: 10.0 },
    LoanOption { amount: 15_000, months: Some(6), interest_rate: 10.0 },
    LoanOption { amount: 20_000, months: Some(8), interest_rate: 9.0 },
    LoanOption { amount: 25_000, months: Some(10), interest_rate: 9.0 },
    LoanOption { amount: 30_000, months: Some(12), interest_rate: 8.0 },
    LoanOption { amount: 40_000, months: Some(12), interest_rate: 8.0 },
    LoanOption { amount: 50_000, months: Some(15), interest_rate: 7.0 },
];

pub(super) const OPEN_TERM: &[LoanOption] = &[
    LoanOption { amount: 50_000, months: None, interest_rate: 5.0 },
    LoanOption { amount: 100_000, months: None, interest_rate: 4.5 },
    LoanOption { amount: 200_000, months: None, interest_rate: 4.0 },
    LoanOption { amount: 300_000, months: None, interest_rate: 3.5 },
    LoanOption { amount: 500_000, months: None, interest_rate: 3.0 },
];
