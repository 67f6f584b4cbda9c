use std::fmt;

use super::{format_peso, LoanOption, LoanType};

/// Requested amount fell outside the product's tier window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountOutOfRange {
    pub requested: u64,
    pub min: u64,
    pub max: u64,
}

impl fmt::Display for AmountOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loan amount must be between {} and {}",
            format_peso(self.min),
            format_peso(self.max)
        )
    }
}

impl std::error::Error for AmountOutOfRange {}

/// Resolve the tier for a validation amount: the largest table entry whose
/// amount does not exceed it. Amounts outside the table window are
/// rejected with the window bounds.
pub fn resolve_option(loan_type: LoanType, amount: u64) -> Result<LoanOption, AmountOutOfRange> {
    let table = loan_type.options();
    let (first, last) = match (table.first(), table.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(AmountOutOfRange {
                requested: amount,
                min: 0,
                max: 0,
            })
        }
    };

    if amount < first.amount || amount > last.amount {
        return Err(AmountOutOfRange {
            requested: amount,
            min: first.amount,
            max: last.amount,
        });
    }

    Ok(table
        .iter()
        .rev()
        .find(|option| option.amount <= amount)
        .copied()
        .unwrap_or(*first))
}
