use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::matcher::{contains_any, Term};

/// Output labels the classifier treats specially. The configuration keys
/// categories by their output label, so these are part of the rule-document
/// contract, not an implementation detail.
pub const GST_CHARGES_LABEL: &str = "BOUNCE CHARGES - GST";
pub const CHARGES_LABEL: &str = "BOUNCE CHARGES";
pub const NEFT_LABEL: &str = "NEFT";
pub const CHEQUE_TECHNICAL_LABEL: &str = "Cheque Bounce - Technical";
pub const CHEQUE_NON_TECHNICAL_LABEL: &str = "Cheque Bounce - Non-Technical";

/// Generic failure indicators. The charge tiers require one of these on top
/// of their own keyword sets, so a narration that merely mentions a charge
/// ("processing charges") never reads as a bounce charge.
const BOUNCE_INDICATORS: &[&str] = &["rtn", "return", "ret", "rtnchg", "bounce"];

const BUILTIN_RULES: &str = include_str!("builtin_rules.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid rule document: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("rule configuration declares no categories")]
    NoCategories,
    #[error("category `{category}` is missing `{field}`")]
    MissingField {
        category: String,
        field: &'static str,
    },
    #[error("invalid keyword `{term}` in `{category}`")]
    BadTerm {
        category: String,
        term: String,
        source: regex::Error,
    },
}

/// How the classifier applies a rule's keyword sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Charge tier with the additional `gst` token requirement.
    GstCharge,
    /// Generic charge tier.
    Charge,
    /// Sub-classifies into technical / non-technical labels.
    Cheque,
    /// Plain instrument category: type keyword + bounce keyword.
    Instrument,
}

/// One named bounce category with its compiled keyword sets.
#[derive(Debug, Clone)]
pub struct BounceRule {
    pub label: String,
    pub kind: RuleKind,
    /// The narration must name the instrument/category at all.
    pub type_keywords: Vec<Term>,
    /// Within the category, these confirm a failure/reversal.
    pub keywords: Vec<Term>,
    pub technical_keywords: Vec<Term>,
    pub non_technical_keywords: Vec<Term>,
    /// NEFT-style guard: only a net inflow can be this bounce.
    pub inflow_only: bool,
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    #[serde(default)]
    loan_keywords: Vec<String>,
    #[serde(default, rename = "category")]
    categories: Vec<CategoryDocument>,
}

#[derive(Debug, Deserialize)]
struct CategoryDocument {
    label: String,
    #[serde(default)]
    type_keywords: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    technical_keywords: Vec<String>,
    #[serde(default)]
    non_technical_keywords: Vec<String>,
}

/// Immutable rule repository, built once at startup and shared by the
/// classifier and the reconciliation matcher for the whole run.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<BounceRule>,
    loan_terms: Vec<Term>,
    bounce_indicators: Vec<Term>,
    gst: Term,
}

impl RuleSet {
    pub fn from_toml(doc: &str) -> Result<RuleSet, ConfigError> {
        let doc: RuleDocument = toml::from_str(doc)?;
        if doc.categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }

        let mut rules = Vec::with_capacity(doc.categories.len());
        for category in &doc.categories {
            rules.push(compile_category(category)?);
        }

        let loan_terms = compile_terms("loan_keywords", &doc.loan_keywords)?;
        let bounce_indicators = compile_literals("bounce_indicators", BOUNCE_INDICATORS)?;
        let gst = Term::compile("gst").map_err(|source| ConfigError::BadTerm {
            category: "gst".to_string(),
            term: "gst".to_string(),
            source,
        })?;

        Ok(RuleSet {
            rules,
            loan_terms,
            bounce_indicators,
            gst,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<RuleSet, ConfigError> {
        let doc = fs::read_to_string(path)?;
        RuleSet::from_toml(&doc)
    }

    /// The canonical built-in rule document.
    pub fn builtin() -> Result<RuleSet, ConfigError> {
        RuleSet::from_toml(BUILTIN_RULES)
    }

    /// Categories in precedence order (configured order).
    pub fn categories(&self) -> &[BounceRule] {
        &self.rules
    }

    pub fn loan_terms(&self) -> &[Term] {
        &self.loan_terms
    }

    pub fn has_loan_keyword(&self, narration: &str) -> bool {
        contains_any(narration, &self.loan_terms)
    }

    pub fn has_bounce_indicator(&self, narration: &str) -> bool {
        contains_any(narration, &self.bounce_indicators)
    }

    pub fn has_gst_token(&self, narration: &str) -> bool {
        self.gst.is_match(narration)
    }
}

fn compile_category(category: &CategoryDocument) -> Result<BounceRule, ConfigError> {
    if category.type_keywords.is_empty() {
        return Err(ConfigError::MissingField {
            category: category.label.clone(),
            field: "type_keywords",
        });
    }

    let has_cheque_sets =
        !category.technical_keywords.is_empty() || !category.non_technical_keywords.is_empty();
    if category.keywords.is_empty() && !has_cheque_sets {
        return Err(ConfigError::MissingField {
            category: category.label.clone(),
            field: "keywords",
        });
    }

    let kind = if has_cheque_sets {
        RuleKind::Cheque
    } else if category.label == GST_CHARGES_LABEL {
        RuleKind::GstCharge
    } else if category.label == CHARGES_LABEL {
        RuleKind::Charge
    } else {
        RuleKind::Instrument
    };

    Ok(BounceRule {
        label: category.label.clone(),
        kind,
        type_keywords: compile_terms(&category.label, &category.type_keywords)?,
        keywords: compile_terms(&category.label, &category.keywords)?,
        technical_keywords: compile_terms(&category.label, &category.technical_keywords)?,
        non_technical_keywords: compile_terms(&category.label, &category.non_technical_keywords)?,
        inflow_only: category.label == NEFT_LABEL,
    })
}

fn compile_terms(category: &str, raw: &[String]) -> Result<Vec<Term>, ConfigError> {
    raw.iter()
        .map(|term| {
            Term::compile(term).map_err(|source| ConfigError::BadTerm {
                category: category.to_string(),
                term: term.clone(),
                source,
            })
        })
        .collect()
}

fn compile_literals(category: &str, raw: &[&str]) -> Result<Vec<Term>, ConfigError> {
    raw.iter()
        .map(|term| {
            Term::compile(term).map_err(|source| ConfigError::BadTerm {
                category: category.to_string(),
                term: (*term).to_string(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rules_load() {
        let rules = RuleSet::builtin().unwrap();
        let labels: Vec<&str> = rules.categories().iter().map(|r| r.label.as_str()).collect();
        // Charge tiers first, instruments after, in configured order.
        assert_eq!(labels[0], GST_CHARGES_LABEL);
        assert_eq!(labels[1], CHARGES_LABEL);
        assert!(labels.contains(&"NEFT"));
        assert!(labels.contains(&"CHEQUE"));
        assert!(!rules.loan_terms().is_empty());
    }

    #[test]
    fn builtin_kinds_are_assigned() {
        let rules = RuleSet::builtin().unwrap();
        let kind_of = |label: &str| {
            rules
                .categories()
                .iter()
                .find(|r| r.label == label)
                .map(|r| r.kind)
                .unwrap()
        };
        assert_eq!(kind_of(GST_CHARGES_LABEL), RuleKind::GstCharge);
        assert_eq!(kind_of(CHARGES_LABEL), RuleKind::Charge);
        assert_eq!(kind_of("CHEQUE"), RuleKind::Cheque);
        assert_eq!(kind_of("UPI"), RuleKind::Instrument);
        assert_eq!(kind_of("NEFT"), RuleKind::Instrument);
    }

    #[test]
    fn neft_rule_carries_inflow_guard() {
        let rules = RuleSet::builtin().unwrap();
        let neft = rules
            .categories()
            .iter()
            .find(|r| r.label == NEFT_LABEL)
            .unwrap();
        assert!(neft.inflow_only);
        let upi = rules.categories().iter().find(|r| r.label == "UPI").unwrap();
        assert!(!upi.inflow_only);
    }

    #[test]
    fn missing_type_keywords_is_config_error() {
        let doc = r#"
            loan_keywords = ["emi"]

            [[category]]
            label = "UPI"
            keywords = ["return"]
        "#;
        let err = RuleSet::from_toml(doc).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { field: "type_keywords", .. }
        ));
    }

    #[test]
    fn missing_keywords_is_config_error() {
        let doc = r#"
            [[category]]
            label = "UPI"
            type_keywords = ["upi"]
        "#;
        let err = RuleSet::from_toml(doc).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { field: "keywords", .. }
        ));
    }

    #[test]
    fn cheque_style_category_needs_no_plain_keywords() {
        let doc = r#"
            [[category]]
            label = "CHEQUE"
            type_keywords = ["chq"]
            technical_keywords = ["signature"]
            non_technical_keywords = ["funds insufficient"]
        "#;
        let rules = RuleSet::from_toml(doc).unwrap();
        assert_eq!(rules.categories()[0].kind, RuleKind::Cheque);
    }

    #[test]
    fn empty_document_is_config_error() {
        assert!(matches!(
            RuleSet::from_toml("loan_keywords = []"),
            Err(ConfigError::NoCategories)
        ));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        assert!(matches!(
            RuleSet::from_toml("not toml ["),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loan_keyword_lookup_is_token_bounded() {
        let rules = RuleSet::builtin().unwrap();
        assert!(rules.has_loan_keyword("emi debit for march"));
        assert!(rules.has_loan_keyword("nbfc installment"));
        // "emi" inside "premium" must not count.
        assert!(!rules.has_loan_keyword("insurance premium renewal"));
    }

    #[test]
    fn gst_and_indicator_helpers() {
        let rules = RuleSet::builtin().unwrap();
        assert!(rules.has_gst_token("rtn chg gst"));
        assert!(!rules.has_gst_token("august statement"));
        assert!(rules.has_bounce_indicator("ecs rtn chg"));
        assert!(!rules.has_bounce_indicator("retail purchase"));
    }
}
