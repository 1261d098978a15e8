use serde::{Deserialize, Serialize};

use crate::glossary::GlossaryTerm;
use crate::summary::{EXPIRY_WINDOW_DAYS, PortfolioSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Contracts,
    Expiring,
    Value,
    People,
    Payments,
    Tenders,
    Approvals,
    Teams,
    Rates,
    Glossary,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub topic: Topic,
    pub text: String,
}

// First match wins, so narrower topics come before the ones whose keywords
// they contain ("contract value" is about value).
const TOPIC_KEYWORDS: &[(Topic, &[&str])] = &[
    (Topic::Expiring, &["expir", "renew", "ending", "end soon"]),
    (Topic::Value, &["value", "worth", "revenue", "income"]),
    (Topic::Payments, &["payment", "paid", "spend", "spent"]),
    (Topic::Approvals, &["approval", "approve", "pending", "sign off", "sign-off"]),
    (Topic::Tenders, &["tender", "bid", "opportunit"]),
    (Topic::Rates, &["rate", "price", "pricing"]),
    (Topic::Teams, &["team"]),
    (Topic::People, &["people", "person", "client", "service user"]),
    (Topic::Contracts, &["contract"]),
    (Topic::Help, &["help", "what can you", "how do i"]),
];

const DEFINITION_PREFIXES: &[&str] = &["what is ", "what's ", "what are ", "define ", "meaning of "];

fn definition_subject(question: &str) -> Option<String> {
    let rest = DEFINITION_PREFIXES
        .iter()
        .find_map(|p| question.strip_prefix(*p))?;
    let rest = rest.trim().trim_end_matches(['?', '.', '!']).trim();
    let rest = ["a ", "an ", "the "]
        .iter()
        .find_map(|article| rest.strip_prefix(*article))
        .unwrap_or(rest)
        .trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

fn lookup<'a>(glossary: &'a [GlossaryTerm], subject: &str) -> Option<&'a GlossaryTerm> {
    glossary
        .iter()
        .find(|t| t.term.to_lowercase() == subject)
        .or_else(|| glossary.iter().find(|t| subject.contains(&t.term.to_lowercase())))
}

fn detect_topic(question: &str) -> Option<Topic> {
    TOPIC_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| question.contains(*w)))
        .map(|(topic, _)| *topic)
}

fn help_text() -> String {
    "I can answer questions about contracts, expiring contracts, contract value, people, payments, \
     tenders, approvals, teams and rates, or define a glossary term (\"what is ...\")."
        .to_string()
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 { format!("{n} {one}") } else { format!("{n} {many}") }
}

fn by_status(counts: &std::collections::BTreeMap<String, usize>) -> String {
    counts
        .iter()
        .map(|(status, n)| format!("{n} {}", status.replace('_', " ")))
        .collect::<Vec<_>>()
        .join(", ")
}

fn answer_topic(topic: Topic, s: &PortfolioSummary) -> String {
    match topic {
        Topic::Contracts => {
            let total: usize = s.contracts_by_status.values().sum();
            if total == 0 {
                "There are no contracts recorded yet.".to_string()
            } else {
                format!(
                    "You have {} ({}); {} currently live.",
                    plural(total, "contract", "contracts"),
                    by_status(&s.contracts_by_status),
                    s.active_contracts
                )
            }
        }
        Topic::Expiring => {
            if s.expiring_soon.is_empty() {
                format!("No live contracts end in the next {EXPIRY_WINDOW_DAYS} days.")
            } else {
                let list = s
                    .expiring_soon
                    .iter()
                    .map(|c| format!("{} ({}) on {}", c.title, c.reference, c.end_date))
                    .collect::<Vec<_>>()
                    .join("; ");
                format!(
                    "{} in the next {EXPIRY_WINDOW_DAYS} days: {list}.",
                    plural(s.expiring_soon.len(), "contract ends", "contracts end")
                )
            }
        }
        Topic::Value => format!(
            "Live contracts are worth {} a year across {}.",
            s.total_annual_value,
            plural(s.active_contracts, "contract", "contracts")
        ),
        Topic::People => format!("You are supporting {}.", plural(s.people_count, "person", "people")),
        Topic::Payments => format!(
            "{} totalling {} in the last 12 months.",
            plural(s.payment_count_last_12_months, "payment was recorded", "payments were recorded"),
            s.payments_last_12_months
        ),
        Topic::Tenders => {
            if s.tenders_by_status.is_empty() {
                "No tender applications are being tracked.".to_string()
            } else {
                format!(
                    "{} still open; by status: {}.",
                    plural(s.open_tenders, "tender is", "tenders are"),
                    by_status(&s.tenders_by_status)
                )
            }
        }
        Topic::Approvals => format!(
            "{} waiting for a decision.",
            plural(s.open_approval_requests, "approval request is", "approval requests are")
        ),
        Topic::Teams => format!("There {}.", plural(s.team_count, "active team", "active teams")),
        Topic::Rates => format!("{} in force today.", plural(s.current_rates, "rate is", "rates are")),
        Topic::Glossary | Topic::Help => help_text(),
    }
}

/// Answer a free-text question from the summary and glossary.
pub fn ask(summary: &PortfolioSummary, glossary: &[GlossaryTerm], question: &str) -> Answer {
    let q = question.trim().to_lowercase();
    let subject = definition_subject(&q);

    if let Some(term) = subject.as_deref().and_then(|s| lookup(glossary, s)) {
        return Answer {
            topic: Topic::Glossary,
            text: format!("{}: {}", term.term, term.definition),
        };
    }

    match detect_topic(&q) {
        Some(topic) => Answer { topic, text: answer_topic(topic, summary) },
        None => match subject {
            Some(subject) => Answer {
                topic: Topic::Glossary,
                text: format!("I don't have a definition for \"{subject}\". Add it to the glossary to teach me."),
            },
            None => Answer { topic: Topic::Help, text: help_text() },
        },
    }
}
