//! Query Classifier
//!
//! Routes a question to one of the deterministic fast paths or to the
//! generic oracle fallback. Rules are evaluated in order; the first match
//! wins. Add a fast path by appending a rule to `RULES`.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    TopFivePortfolios,
    TotalPerClient,
    StockHolders { stock: String },
    Generic,
}

/// A fast-path rule that fired on its trigger words but could not extract
/// its parameters. The question still goes to the generic fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialMatch {
    pub rule: &'static str,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: QueryKind,
    pub partial: Option<PartialMatch>,
}

enum RuleOutcome {
    Matched(QueryKind),
    Partial(&'static str),
    Skip,
}

struct Rule {
    name: &'static str,
    /// (original question, lowercased question)
    check: fn(&str, &str) -> RuleOutcome,
}

const RULES: &[Rule] = &[
    Rule {
        name: "top_five_portfolios",
        check: top_five_portfolios,
    },
    Rule {
        name: "total_per_client",
        check: total_per_client,
    },
    Rule {
        name: "stock_holders",
        check: stock_holders,
    },
];

lazy_static! {
    static ref STOCK_NAME: Regex = Regex::new(r"(?i)of\s+(.*?)(\?|$)").unwrap();
}

/// Query classifier
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn classify(question: &str) -> Classification {
        let lowered = question.to_lowercase();
        let mut partial = None;

        for rule in RULES {
            match (rule.check)(question, &lowered) {
                RuleOutcome::Matched(kind) => {
                    debug!(rule = rule.name, "Fast path matched");
                    return Classification { kind, partial: None };
                }
                RuleOutcome::Partial(reason) => {
                    warn!(rule = rule.name, reason, "Fast path partially matched, using fallback");
                    partial.get_or_insert(PartialMatch {
                        rule: rule.name,
                        reason,
                    });
                }
                RuleOutcome::Skip => {}
            }
        }

        Classification {
            kind: QueryKind::Generic,
            partial,
        }
    }
}

fn top_five_portfolios(_question: &str, lowered: &str) -> RuleOutcome {
    if lowered.contains("top five portfolios") || lowered.contains("top 5 portfolios") {
        RuleOutcome::Matched(QueryKind::TopFivePortfolios)
    } else {
        RuleOutcome::Skip
    }
}

fn total_per_client(_question: &str, lowered: &str) -> RuleOutcome {
    if lowered.contains("total investments per client") {
        RuleOutcome::Matched(QueryKind::TotalPerClient)
    } else {
        RuleOutcome::Skip
    }
}

fn stock_holders(question: &str, lowered: &str) -> RuleOutcome {
    if !lowered.contains("highest holders") {
        return RuleOutcome::Skip;
    }
    if !lowered.contains("stock") {
        return RuleOutcome::Partial("no 'stock' in question");
    }

    match extract_stock_name(question) {
        Some(stock) => RuleOutcome::Matched(QueryKind::StockHolders { stock }),
        None => RuleOutcome::Partial("no 'of <stock>' clause"),
    }
}

/// Text after the first "of" up to a question mark or end of input, minus
/// a trailing " stock".
pub fn extract_stock_name(question: &str) -> Option<String> {
    let captured = STOCK_NAME.captures(question)?.get(1)?.as_str().trim();

    let stock = match captured.len().checked_sub(" stock".len()).and_then(|cut| {
        captured
            .get(cut..)
            .filter(|tail| tail.eq_ignore_ascii_case(" stock"))
            .map(|_| &captured[..cut])
    }) {
        Some(head) => head.trim(),
        None => captured,
    };

    if stock.is_empty() {
        None
    } else {
        Some(stock.to_string())
    }
}
