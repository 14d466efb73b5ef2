// storefront/src/validation.rs

//! Input rules shared by the checkout form, the STK-push endpoint and the
//! admin tools. Every check fails with `AppError::Validation` carrying the
//! message the caller sees.

use crate::errors::{AppError, Result};
use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

static CHECKOUT_PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:\+?254|0)?[17]\d{8}$").unwrap());
static MPESA_PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^254[17]\d{8}$").unwrap());
static HYPHENATED_UUID: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});
static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z\s'-]+$").unwrap());
static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static NON_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D").unwrap());
static NOT_REFERENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9-]").unwrap());
static NOT_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\s-]").unwrap());
static SEARCH_STRIP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[<>'"]"#).unwrap());

pub const MAX_STK_AMOUNT: i64 = 150_000;
pub const MAX_SUPPORT_MESSAGE_CHARS: usize = 2000;
const ACCOUNT_REFERENCE_MAX: usize = 12;
const TRANSACTION_DESC_MAX: usize = 13;

fn invalid(msg: &str) -> AppError {
  AppError::Validation(msg.to_string())
}

/// Rewrites a local or international Kenyan number into `2547XXXXXXXX` form.
pub fn normalize_phone(raw: &str) -> String {
  let digits = NON_DIGIT.replace_all(raw, "");
  if let Some(rest) = digits.strip_prefix('0') {
    format!("254{}", rest)
  } else if digits.starts_with("254") {
    digits.into_owned()
  } else {
    format!("254{}", digits)
  }
}

/// Phone as typed into the checkout or order-lookup form; returns it normalised.
pub fn checkout_phone(raw: &str) -> Result<String> {
  let phone = raw.trim();
  if phone.is_empty() {
    return Err(invalid("Phone number is required"));
  }
  if phone.chars().count() > 15 {
    return Err(invalid("Phone number is too long"));
  }
  // Buyers type spaced or hyphenated groups; only the digits are checked.
  let compact: String = phone.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
  if !CHECKOUT_PHONE.is_match(&compact) {
    return Err(invalid("Invalid Kenyan phone number format"));
  }
  Ok(normalize_phone(&compact))
}

/// Phone as the payment provider expects it: exactly `254` + 9 digits starting 1 or 7.
pub fn mpesa_phone(phone: &str) -> Result<()> {
  if MPESA_PHONE.is_match(phone) {
    Ok(())
  } else {
    Err(invalid("Invalid phone number format"))
  }
}

/// Whole-shilling amount in `1..=150000`. Fractional or non-numeric JSON values are rejected.
pub fn stk_amount(value: &serde_json::Value) -> Result<i32> {
  let whole = match value {
    serde_json::Value::Number(n) => n
      .as_i64()
      .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64).map(|f| f as i64)),
    _ => None,
  };
  match whole {
    Some(a) if (1..=MAX_STK_AMOUNT).contains(&a) => Ok(a as i32),
    _ => Err(invalid("Invalid amount")),
  }
}

/// Hyphenated UUID in any letter case.
pub fn order_reference(raw: &str) -> Result<Uuid> {
  if !HYPHENATED_UUID.is_match(raw) {
    return Err(invalid("Invalid order reference"));
  }
  Uuid::parse_str(raw).map_err(|_| invalid("Invalid order reference"))
}

pub fn customer_name(raw: &str) -> Result<String> {
  let name = raw.trim();
  let len = name.chars().count();
  if len < 2 {
    return Err(invalid("Name must be at least 2 characters"));
  }
  if len > 100 {
    return Err(invalid("Name must be less than 100 characters"));
  }
  if !NAME.is_match(name) {
    return Err(invalid("Name can only contain letters, spaces, hyphens, and apostrophes"));
  }
  Ok(name.to_string())
}

/// Blank means "not given".
pub fn optional_email(raw: Option<&str>) -> Result<Option<String>> {
  let email = match raw.map(str::trim) {
    None | Some("") => return Ok(None),
    Some(e) => e,
  };
  if email.chars().count() > 255 {
    return Err(invalid("Email must be less than 255 characters"));
  }
  if !EMAIL.is_match(email) {
    return Err(invalid("Invalid email address"));
  }
  Ok(Some(email.to_lowercase()))
}

pub fn search_query(raw: &str) -> Result<String> {
  let query = raw.trim();
  if query.chars().count() > 100 {
    return Err(invalid("Search query is too long"));
  }
  Ok(SEARCH_STRIP.replace_all(query, "").into_owned())
}

pub fn account_reference(raw: &str) -> String {
  NOT_REFERENCE.replace_all(raw, "").chars().take(ACCOUNT_REFERENCE_MAX).collect()
}

pub fn transaction_desc(raw: Option<&str>) -> String {
  let source = raw.filter(|d| !d.is_empty()).unwrap_or("Payment");
  NOT_DESCRIPTION.replace_all(source, "").chars().take(TRANSACTION_DESC_MAX).collect()
}

pub fn support_message(raw: &str) -> Result<String> {
  let message = raw.trim();
  if message.is_empty() {
    return Err(invalid("Message is required"));
  }
  if message.chars().count() > MAX_SUPPORT_MESSAGE_CHARS {
    return Err(invalid("Message must be less than 2000 characters"));
  }
  Ok(message.to_string())
}

/// Trimmed and upper-cased, as printed on M-Pesa confirmation SMSes.
pub fn receipt_number(raw: &str) -> Result<String> {
  let receipt = raw.trim().to_uppercase();
  if receipt.is_empty() {
    return Err(invalid("Receipt number is required"));
  }
  Ok(receipt)
}

pub fn total_stock(value: i32) -> Result<i32> {
  if value < 0 {
    return Err(invalid("Total stock cannot be negative"));
  }
  Ok(value)
}

/// `254712***` for logs.
pub fn mask_phone(phone: &str) -> String {
  let visible: String = phone.chars().take(6).collect();
  format!("{}***", visible)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn normalize_handles_local_and_international_forms() {
    assert_eq!(normalize_phone("0712345678"), "254712345678");
    assert_eq!(normalize_phone("+254 712 345 678"), "254712345678");
    assert_eq!(normalize_phone("712345678"), "254712345678");
    assert_eq!(normalize_phone("254112345678"), "254112345678");
  }

  #[test]
  fn checkout_phone_accepts_form_variants() {
    assert_eq!(checkout_phone(" 0712345678 ").unwrap(), "254712345678");
    assert_eq!(checkout_phone("+254112345678").unwrap(), "254112345678");
    assert_eq!(checkout_phone("0712 345 678").unwrap(), "254712345678");
    assert_eq!(checkout_phone("0712-345-678").unwrap(), "254712345678");
    assert!(checkout_phone("0712 345 67a").is_err());
    assert!(checkout_phone("0812345678").is_err());
    assert!(checkout_phone("").is_err());
    assert!(checkout_phone("07123456789999999").is_err());
  }

  #[test]
  fn mpesa_phone_requires_exact_format() {
    assert!(mpesa_phone("254712345678").is_ok());
    assert!(mpesa_phone("254112345678").is_ok());
    assert!(mpesa_phone("0712345678").is_err());
    assert!(mpesa_phone("254812345678").is_err());
    assert!(mpesa_phone("2547123456789").is_err());
    assert!(mpesa_phone("+254712345678").is_err());
  }

  #[test]
  fn amount_bounds_and_integrality() {
    assert_eq!(stk_amount(&json!(1)).unwrap(), 1);
    assert_eq!(stk_amount(&json!(150000)).unwrap(), 150000);
    assert_eq!(stk_amount(&json!(100.0)).unwrap(), 100);
    assert!(stk_amount(&json!(0)).is_err());
    assert!(stk_amount(&json!(150001)).is_err());
    assert!(stk_amount(&json!(10.5)).is_err());
    assert!(stk_amount(&json!("100")).is_err());
  }

  #[test]
  fn order_reference_is_case_insensitive() {
    let id = "3F2504E0-4F89-11D3-9A0C-0305E82C3301";
    assert_eq!(order_reference(id).unwrap().to_string(), id.to_lowercase());
    assert!(order_reference("3f2504e04f8911d39a0c0305e82c3301").is_err());
    assert!(order_reference("not-a-uuid").is_err());
  }

  #[test]
  fn sanitisers_strip_and_truncate() {
    assert_eq!(account_reference("RWM-ab12cd34!!extra"), "RWM-ab12cd34");
    assert_eq!(transaction_desc(None), "Payment");
    assert_eq!(transaction_desc(Some("")), "Payment");
    assert_eq!(transaction_desc(Some("Payment for Data <Entry>")), "Payment for D");
  }

  #[test]
  fn name_and_email_rules() {
    assert_eq!(customer_name("  Wanjiku O'Neil-Kamau ").unwrap(), "Wanjiku O'Neil-Kamau");
    assert!(customer_name("J").is_err());
    assert!(customer_name("R2D2").is_err());
    assert_eq!(optional_email(Some("  Jane@Example.COM ")).unwrap().as_deref(), Some("jane@example.com"));
    assert_eq!(optional_email(Some("   ")).unwrap(), None);
    assert!(optional_email(Some("jane@")).is_err());
  }

  #[test]
  fn search_is_trimmed_and_stripped() {
    assert_eq!(search_query("  <b>writer's</b> ").unwrap(), "bwriters/b");
    assert!(search_query(&"x".repeat(101)).is_err());
  }

  #[test]
  fn receipt_and_masking() {
    assert_eq!(receipt_number("  qk12abc ").unwrap(), "QK12ABC");
    assert!(receipt_number("   ").is_err());
    assert_eq!(mask_phone("254712345678"), "254712***");
  }
}
