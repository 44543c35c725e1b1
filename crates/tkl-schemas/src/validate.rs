//! Closed-schema validator for candidate asset descriptors.
//!
//! Operates on already-parsed JSON (`serde_json::Value`) so that unknown
//! fields and wrong types are reported as violations instead of decode
//! errors. Every rule is checked; the full violation list is returned.
//!
//! Malformed input is the expected failure mode here: nothing in this module
//! panics or returns `Err` for bad input.

use crate::AssetRecord;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;

pub const CONTRACT_PATTERN: &str = r"^C[A-Z0-9]{55}$";
pub const ISSUER_PATTERN: &str = r"^G[A-Z0-9]{55}$";
pub const CODE_PATTERN: &str = r"^[A-Za-z0-9]{1,12}$";
pub const DOMAIN_PATTERN: &str =
    r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9][a-z0-9-]{0,61}[a-z0-9]$";
/// Content-addressed (IPFS CIDv1 base32) icon identifier.
pub const CID_PATTERN: &str = r"^baf[a-zA-Z0-9]+$";

static CONTRACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CONTRACT_PATTERN).expect("valid regex"));
static ISSUER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ISSUER_PATTERN).expect("valid regex"));
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(CODE_PATTERN).expect("valid regex"));
static DOMAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DOMAIN_PATTERN).expect("valid regex"));
static CID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(CID_PATTERN).expect("valid regex"));

const KNOWN_FIELDS: &[&str] = &[
    "name", "contract", "code", "issuer", "org", "domain", "icon", "decimals", "comment",
];

const NAME_LEN: (usize, usize) = (5, 30);
const ORG_LEN: (usize, usize) = (5, 30);
const COMMENT_MAX: usize = 150;
const DECIMALS_MAX: u64 = 38;

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

/// One violated schema constraint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaViolation {
    /// The document is not a JSON object.
    NotAnObject { found: &'static str },
    MissingField { field: &'static str },
    /// Closed schema: the field is not part of the descriptor.
    UnknownField { field: String },
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    Length {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },
    Pattern {
        field: &'static str,
        pattern: &'static str,
        value: String,
    },
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
        actual: String,
    },
    /// `anyOf`: needs `contract`, or both `code` and `issuer`.
    IdentityRequired,
    /// Neither a URI nor a content-addressed identifier.
    InvalidIcon { value: String },
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaViolation::NotAnObject { found } => {
                write!(f, "descriptor must be a JSON object, found {found}")
            }
            SchemaViolation::MissingField { field } => {
                write!(f, "missing required field '{field}'")
            }
            SchemaViolation::UnknownField { field } => {
                write!(f, "unknown field '{field}' (additional properties are not allowed)")
            }
            SchemaViolation::WrongType { field, expected } => {
                write!(f, "field '{field}' must be {expected}")
            }
            SchemaViolation::Length {
                field,
                min,
                max,
                actual,
            } => write!(
                f,
                "field '{field}' length {actual} outside {min}..={max}"
            ),
            SchemaViolation::Pattern {
                field,
                pattern,
                value,
            } => write!(f, "field '{field}' value '{value}' does not match {pattern}"),
            SchemaViolation::OutOfRange {
                field,
                min,
                max,
                actual,
            } => write!(f, "field '{field}' value {actual} outside {min}..={max}"),
            SchemaViolation::IdentityRequired => write!(
                f,
                "anyOf: descriptor requires 'contract' or both 'code' and 'issuer'"
            ),
            SchemaViolation::InvalidIcon { value } => write!(
                f,
                "field 'icon' value '{value}' is neither a URI nor a content identifier ({CID_PATTERN})"
            ),
        }
    }
}

impl std::error::Error for SchemaViolation {}

/// Outcome of validating one descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub violations: Vec<SchemaViolation>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Validate a candidate descriptor against the closed asset schema.
pub fn validate_asset(value: &Value) -> Validation {
    let mut violations = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        other => {
            violations.push(SchemaViolation::NotAnObject {
                found: json_type_name(other),
            });
            return Validation { violations };
        }
    };

    for key in obj.keys() {
        if !KNOWN_FIELDS.contains(&key.as_str()) {
            violations.push(SchemaViolation::UnknownField { field: key.clone() });
        }
    }

    for field in ["name", "org"] {
        if !obj.contains_key(field) {
            violations.push(SchemaViolation::MissingField { field });
        }
    }

    let has = |k: &str| obj.contains_key(k);
    if !(has("contract") || (has("code") && has("issuer"))) {
        violations.push(SchemaViolation::IdentityRequired);
    }

    check_length(obj, "name", NAME_LEN, &mut violations);
    check_length(obj, "org", ORG_LEN, &mut violations);
    check_length(obj, "comment", (0, COMMENT_MAX), &mut violations);

    check_pattern(obj, "contract", &CONTRACT_RE, CONTRACT_PATTERN, &mut violations);
    check_pattern(obj, "issuer", &ISSUER_RE, ISSUER_PATTERN, &mut violations);
    check_pattern(obj, "code", &CODE_RE, CODE_PATTERN, &mut violations);
    check_pattern(obj, "domain", &DOMAIN_RE, DOMAIN_PATTERN, &mut violations);

    if let Some(v) = obj.get("icon") {
        match v.as_str() {
            Some(s) if is_uri(s) || is_content_id(s) => {}
            Some(s) => violations.push(SchemaViolation::InvalidIcon {
                value: s.to_string(),
            }),
            None => violations.push(SchemaViolation::WrongType {
                field: "icon",
                expected: "a string",
            }),
        }
    }

    if let Some(v) = obj.get("decimals") {
        match integer_value(v) {
            Some(d) if (0..=i128::from(DECIMALS_MAX)).contains(&d) => {}
            Some(_) => violations.push(SchemaViolation::OutOfRange {
                field: "decimals",
                min: 0,
                max: DECIMALS_MAX,
                actual: v.to_string(),
            }),
            None => violations.push(SchemaViolation::WrongType {
                field: "decimals",
                expected: "an integer",
            }),
        }
    }

    violations.sort();
    Validation { violations }
}

/// Validate, then decode into an [`AssetRecord`].
pub fn parse_candidate(value: &Value) -> Result<AssetRecord, Vec<SchemaViolation>> {
    let validation = validate_asset(value);
    if !validation.is_valid() {
        return Err(validation.violations);
    }
    // A validated object only carries known fields with checked types.
    let mut normalized = value.clone();
    if let Some(d) = normalized
        .get("decimals")
        .and_then(integer_value)
        .and_then(|d| u64::try_from(d).ok())
    {
        normalized["decimals"] = Value::from(d);
    }
    serde_json::from_value(normalized).map_err(|_| {
        vec![SchemaViolation::NotAnObject {
            found: json_type_name(value),
        }]
    })
}

/// `true` if `s` is a content-addressed identifier (exempt from live fetch).
pub fn is_content_id(s: &str) -> bool {
    CID_RE.is_match(s)
}

/// `true` if `s` parses as an absolute URI.
pub fn is_uri(s: &str) -> bool {
    url::Url::parse(s).is_ok()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_length(
    obj: &Map<String, Value>,
    field: &'static str,
    (min, max): (usize, usize),
    out: &mut Vec<SchemaViolation>,
) {
    let Some(v) = obj.get(field) else {
        return;
    };
    match v.as_str() {
        Some(s) => {
            let n = s.chars().count();
            if n < min || n > max {
                out.push(SchemaViolation::Length {
                    field,
                    min,
                    max,
                    actual: n,
                });
            }
        }
        None => out.push(SchemaViolation::WrongType {
            field,
            expected: "a string",
        }),
    }
}

fn check_pattern(
    obj: &Map<String, Value>,
    field: &'static str,
    re: &Regex,
    pattern: &'static str,
    out: &mut Vec<SchemaViolation>,
) {
    let Some(v) = obj.get(field) else {
        return;
    };
    match v.as_str() {
        Some(s) if re.is_match(s) => {}
        Some(s) => out.push(SchemaViolation::Pattern {
            field,
            pattern,
            value: s.to_string(),
        }),
        None => out.push(SchemaViolation::WrongType {
            field,
            expected: "a string",
        }),
    }
}

/// Integer value of a JSON number, including floats with no fractional part
/// (`7.0` is the integer 7).
fn integer_value(v: &Value) -> Option<i128> {
    if let Some(i) = v.as_i64() {
        return Some(i.into());
    }
    if let Some(u) = v.as_u64() {
        return Some(u.into());
    }
    let f = v.as_f64()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 1e18).then(|| f as i128)
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONTRACT: &str = "CAS3J7GYLGXMF6TDJBBYYSE3HQ6BBSMLNUQ34T6TZMYMW2EVH34XOWMA";
    const ISSUER: &str = "GA5ZSEJYB37JRC5AVCIA5MOP4RHTM335X2KGX3IHOJAPP5RE34K4KZVN";

    fn base() -> Value {
        json!({
            "name": "USD Coin",
            "org": "Centre Consortium",
            "contract": CONTRACT,
            "decimals": 7
        })
    }

    #[test]
    fn minimal_contract_record_passes() {
        assert!(validate_asset(&base()).is_valid());
    }

    #[test]
    fn code_and_issuer_without_contract_passes() {
        let v = json!({
            "name": "USD Coin",
            "org": "Centre Consortium",
            "code": "USDC",
            "issuer": ISSUER,
            "domain": "centre.io",
            "icon": "https://example.org/usdc.png"
        });
        let r = validate_asset(&v);
        assert!(r.is_valid(), "{:?}", r.violations);
    }

    #[test]
    fn missing_identity_cites_any_of() {
        let v = json!({"name": "USD Coin", "org": "Centre Consortium"});
        let r = validate_asset(&v);
        assert_eq!(r.violations, vec![SchemaViolation::IdentityRequired]);
        assert!(r.violations[0].to_string().contains("anyOf"));
    }

    #[test]
    fn code_without_issuer_is_not_an_identity() {
        let v = json!({"name": "USD Coin", "org": "Centre Consortium", "code": "USDC"});
        assert!(validate_asset(&v)
            .violations
            .contains(&SchemaViolation::IdentityRequired));
    }

    #[test]
    fn unknown_field_is_hard_failure() {
        let mut v = base();
        v["website"] = json!("https://example.org");
        let r = validate_asset(&v);
        assert_eq!(
            r.violations,
            vec![SchemaViolation::UnknownField {
                field: "website".to_string()
            }]
        );
    }

    #[test]
    fn missing_name_and_org_reported_together() {
        let v = json!({"contract": CONTRACT});
        let r = validate_asset(&v);
        assert!(r
            .violations
            .contains(&SchemaViolation::MissingField { field: "name" }));
        assert!(r
            .violations
            .contains(&SchemaViolation::MissingField { field: "org" }));
    }

    #[test]
    fn contract_pattern_enforced() {
        let mut v = base();
        v["contract"] = json!("GAS3J7GYLGXMF6TDJBBYYSE3HQ6BBSMLNUQ34T6TZMYMW2EVH34XOWMA");
        assert!(matches!(
            validate_asset(&v).violations.as_slice(),
            [SchemaViolation::Pattern { field: "contract", .. }]
        ));

        v["contract"] = json!("CAS3J7");
        assert!(!validate_asset(&v).is_valid());
    }

    #[test]
    fn lowercase_in_issuer_rejected() {
        let mut v = base();
        v["code"] = json!("USDC");
        v["issuer"] = json!(ISSUER.to_lowercase());
        assert!(matches!(
            validate_asset(&v).violations.as_slice(),
            [SchemaViolation::Pattern { field: "issuer", .. }]
        ));
    }

    #[test]
    fn length_bounds_enforced() {
        let mut v = base();
        v["name"] = json!("Foo");
        v["org"] = json!("x".repeat(31));
        v["comment"] = json!("c".repeat(151));
        let r = validate_asset(&v);
        assert_eq!(r.violations.len(), 3, "{:?}", r.violations);
    }

    #[test]
    fn domain_must_be_multi_label() {
        let mut v = base();
        v["domain"] = json!("localhost");
        assert!(!validate_asset(&v).is_valid());

        v["domain"] = json!("assets.example.org");
        assert!(validate_asset(&v).is_valid());

        v["domain"] = json!("Example.org");
        assert!(!validate_asset(&v).is_valid());
    }

    #[test]
    fn icon_accepts_uri_or_content_id() {
        let mut v = base();
        v["icon"] = json!("https://assets.example.org/icon.png");
        assert!(validate_asset(&v).is_valid());

        v["icon"] = json!("bafkreibml2jyjqv4trrk5ekj6xfcqkvnnrtljc2cpqmikz5tcnaqmaum4a");
        assert!(validate_asset(&v).is_valid());

        v["icon"] = json!("not a uri");
        assert!(matches!(
            validate_asset(&v).violations.as_slice(),
            [SchemaViolation::InvalidIcon { .. }]
        ));
    }

    #[test]
    fn decimals_range_and_type() {
        let mut v = base();
        v["decimals"] = json!(39);
        assert!(matches!(
            validate_asset(&v).violations.as_slice(),
            [SchemaViolation::OutOfRange { field: "decimals", .. }]
        ));

        v["decimals"] = json!(-1);
        assert!(!validate_asset(&v).is_valid());

        v["decimals"] = json!(7.5);
        assert!(matches!(
            validate_asset(&v).violations.as_slice(),
            [SchemaViolation::WrongType { field: "decimals", .. }]
        ));

        v["decimals"] = json!(0);
        assert!(validate_asset(&v).is_valid());

        v["decimals"] = json!(39.0);
        assert!(matches!(
            validate_asset(&v).violations.as_slice(),
            [SchemaViolation::OutOfRange { field: "decimals", .. }]
        ));
    }

    #[test]
    fn integral_float_decimals_accepted() {
        let mut v = base();
        v["decimals"] = json!(7.0);
        assert!(validate_asset(&v).is_valid());
        let rec = parse_candidate(&v).unwrap();
        assert_eq!(rec.decimals, Some(7));
        assert_eq!(rec, parse_candidate(&base()).unwrap());
    }

    #[test]
    fn non_object_rejected_without_panic() {
        let r = validate_asset(&json!([1, 2, 3]));
        assert_eq!(
            r.violations,
            vec![SchemaViolation::NotAnObject { found: "array" }]
        );
    }

    #[test]
    fn parse_candidate_decodes_valid_record() {
        let rec = parse_candidate(&base()).unwrap();
        assert_eq!(rec.contract.as_deref(), Some(CONTRACT));
        assert_eq!(rec.decimals, Some(7));
    }
}
