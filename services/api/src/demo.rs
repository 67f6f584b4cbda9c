use crate::infra::{demo_pdf, DemoBackend, DemoEventLog, InMemoryDraftStore};
use clap::Args;
use loan_portal::config::ConsentConfig;
use loan_portal::error::AppError;
use loan_portal::workflows::loans::{format_peso, quote, BalanceDecision, LoanType};
use loan_portal::workflows::reloan::{ReloanService, Section, SubmissionState};
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct SimulateArgs {
    /// Loan product label, e.g. "Regular Loan Without Collateral"
    #[arg(long, default_value = "Regular Loan Without Collateral")]
    pub(crate) loan_type: String,
    /// Requested principal in whole pesos
    #[arg(long)]
    pub(crate) amount: u64,
    /// Outstanding balance carried over from the previous loan
    #[arg(long, default_value_t = 0)]
    pub(crate) previous_balance: u64,
    /// Fold the outstanding balance into the principal instead of
    /// deducting it from the released proceeds
    #[arg(long)]
    pub(crate) add_to_principal: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Borrower id for the demo session
    #[arg(long, default_value = "B-0001")]
    pub(crate) borrowers_id: String,
    /// Requested principal in whole pesos
    #[arg(long, default_value_t = 20_000)]
    pub(crate) amount: u64,
}

pub(crate) fn run_simulation(args: SimulateArgs) -> Result<(), AppError> {
    let SimulateArgs {
        loan_type,
        amount,
        previous_balance,
        add_to_principal,
    } = args;

    let product = match LoanType::from_label(&loan_type) {
        Some(product) => product,
        None => {
            println!("Unknown loan product '{loan_type}'. Available products:");
            for product in LoanType::ALL {
                println!("- {}", product.label());
            }
            return Ok(());
        }
    };
    let decision = if add_to_principal {
        BalanceDecision::AddToPrincipal
    } else {
        BalanceDecision::DeductFromProceeds
    };

    println!("Loan simulation: {}", product.label());
    println!("Tier table");
    for option in product.options() {
        match option.months {
            Some(months) => println!(
                "- {} | {} months | {:.2}% monthly",
                format_peso(option.amount),
                months,
                option.interest_rate
            ),
            None => println!(
                "- {} | open term | {:.2}% monthly",
                format_peso(option.amount),
                option.interest_rate
            ),
        }
    }

    let quotation = match quote(product, amount, previous_balance, decision) {
        Ok(quotation) => quotation,
        Err(err) => {
            println!("\nQuote rejected: {err}");
            return Ok(());
        }
    };

    let settlement = match decision {
        BalanceDecision::AddToPrincipal => "added to principal",
        BalanceDecision::DeductFromProceeds => "deducted from proceeds",
    };
    println!(
        "\nQuote for {} (previous balance {}, {})",
        format_peso(amount),
        format_peso(previous_balance),
        settlement
    );
    println!(
        "- Matched tier: {} at {:.2}% monthly",
        format_peso(quotation.option.amount),
        quotation.option.interest_rate
    );
    match quotation.option.months {
        Some(months) => println!("- Term: {months} months"),
        None => println!("- Term: open (interest-only monthly due)"),
    }
    println!("- Monthly interest: \u{20b1}{:.2}", quotation.interest_amount);
    if let Some(total_interest) = quotation.total_interest {
        println!("- Total interest: \u{20b1}{total_interest:.2}");
    }
    if let Some(total_payable) = quotation.total_payable {
        println!("- Total payable: \u{20b1}{total_payable:.2}");
    }
    println!("- Monthly due: \u{20b1}{:.2}", quotation.monthly_due);
    println!("- Service fee: \u{20b1}{:.2}", quotation.service_fee);
    println!("- Net proceeds: \u{20b1}{:.2}", quotation.net_proceeds);

    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        borrowers_id,
        amount,
    } = args;

    println!("Borrower reloan demo (in-memory backend)");

    let store = Arc::new(InMemoryDraftStore::default());
    let backend = Arc::new(DemoBackend::with_sample_borrower());
    let events = Arc::new(DemoEventLog::default());
    let service = Arc::new(ReloanService::new(
        store,
        backend.clone(),
        events.clone(),
        ConsentConfig {
            company_name: "Demo Lending Corp.".to_string(),
            terms_version: "demo".to_string(),
            privacy_version: "demo".to_string(),
        },
    ));

    let view = match service.prefill(&borrowers_id).await {
        Ok(Some(view)) => view,
        Ok(None) => {
            println!("- No application on file for {borrowers_id}; nothing to prefill");
            return Ok(());
        }
        Err(err) => {
            println!("- Prefill unavailable: {err}");
            return Ok(());
        }
    };
    println!(
        "- Prefilled the form from the last application of {}",
        view.draft.full_name
    );
    println!(
        "  Reusable from last time: photo on file {}, {} stored documents",
        view.previous_uploads.profile_photo_url.is_some(),
        view.previous_uploads.documents.len()
    );

    let mut draft = view.draft;
    draft.loan_amount = amount;
    draft.balance_decision = Some(BalanceDecision::DeductFromProceeds);
    let view = service.save(
        &borrowers_id,
        draft,
        Some(LoanType::RegularWithoutCollateral),
    );
    println!(
        "- Saved edits: {} requested under {}",
        format_peso(amount),
        view.loan_type.label()
    );

    if let Err(err) = service.reuse_previous_photo(&borrowers_id).await {
        println!("  Previous photo unavailable: {err}");
    }
    let pool = service.load(&borrowers_id).previous_uploads.documents.len();
    for _ in 0..pool {
        // Reuse consumes the pool entry, so the next document is always
        // at index zero.
        if let Err(err) = service.reuse_previous_document(&borrowers_id, 0).await {
            println!("  Stored document unavailable: {err}");
            break;
        }
    }
    println!("- Reused the stored 2x2 photo and {pool} stored documents");

    let required = view.loan_type.required_document_count();
    let fresh: Vec<_> = (pool..required)
        .map(|n| demo_pdf(&format!("demo-extra-{n}.pdf")))
        .collect();
    println!("- Attached {} freshly scanned documents", fresh.len());
    let progress = service.attach_documents(&borrowers_id, fresh);

    println!("\nSection progress");
    for section in Section::ordered() {
        if let Some(status) = progress.sections.get(&section) {
            if status.done {
                println!("- {}: complete", section.label());
            } else {
                println!(
                    "- {}: {} missing ({})",
                    section.label(),
                    status.missing_count,
                    status.missing_details.join(", ")
                );
            }
        }
    }
    if progress.ready {
        println!("Application is ready to submit");
    } else {
        println!("Still missing: {}", progress.missing_fields.join(", "));
    }

    println!("\nSubmitting");
    match service.submit(&borrowers_id).await {
        Ok(SubmissionState::Succeeded { application_id }) => {
            println!("- Accepted as application {application_id}");
        }
        Ok(state) => {
            println!("- Submission ended in state:");
            match serde_json::to_string_pretty(&state) {
                Ok(json) => println!("{json}"),
                Err(err) => println!("  (state unavailable: {err})"),
            }
            return Ok(());
        }
        Err(err) => {
            println!("- Submission failed: {err}");
            return Ok(());
        }
    }

    if let Some(request) = backend.recorded_submissions().into_iter().next() {
        println!(
            "- Posted to {} with {} form fields, {} documents and a 2x2 photo",
            request.path,
            request.fields.len(),
            request.documents.len()
        );
    }

    // The status watch polls on a fixed interval; give it one cycle so
    // the acceptance event shows up in the log below.
    println!("- Waiting for the first status poll");
    tokio::time::sleep(Duration::from_secs(3)).await;

    println!("\nPortal events");
    for event in events.events() {
        match serde_json::to_string(&event) {
            Ok(json) => println!("- {json}"),
            Err(err) => println!("- (event unavailable: {err})"),
        }
    }

    Ok(())
}
