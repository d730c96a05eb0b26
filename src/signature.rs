//! Request and notification signing
//!
//! A signature is the lowercase hex MD5 digest of the values of a fixed,
//! ordered field list joined with `|`, where the last slot is always the
//! shared secret. The gateway computes the same string on its side, so the
//! field order below must not change.

use crate::types::fields;
use std::collections::{BTreeMap, HashMap};
use subtle::ConstantTimeEq;

/// Separator placed between values in the canonical string
pub const SIGNATURE_SEPARATOR: &str = "|";

/// One slot of a signing field list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureField {
    /// Value looked up from the signed record by name
    Field(&'static str),
    /// The caller's secret; never read from the record
    Secret,
}

const CREATE_FIELDS: &[SignatureField] = &[
    SignatureField::Field(fields::API_KEY),
    SignatureField::Field(fields::PM_ID),
    SignatureField::Field(fields::AMOUNT),
    SignatureField::Field(fields::CURRENCY),
    SignatureField::Field(fields::ORDER_ID),
    SignatureField::Secret,
];

const NOTIFY_FIELDS: &[SignatureField] = &[
    SignatureField::Field(fields::API_KEY),
    SignatureField::Field(fields::PM_ID),
    SignatureField::Field(fields::AMOUNT),
    SignatureField::Field(fields::CURRENCY),
    SignatureField::Field(fields::ORDER_ID),
    SignatureField::Field(fields::STATE),
    SignatureField::Secret,
];

/// Gateway operations that carry a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Outbound payment creation, signed into `api_sig`
    Create,
    /// Inbound payment notification, signed into `notify_sig`
    Notify,
}

impl Operation {
    /// Operation name as used by the gateway documentation
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Notify => "notify",
        }
    }

    /// Look an operation up by name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "create" => Some(Operation::Create),
            "notify" => Some(Operation::Notify),
            _ => None,
        }
    }

    /// Ordered field list hashed for this operation
    pub fn fields(&self) -> &'static [SignatureField] {
        match self {
            Operation::Create => CREATE_FIELDS,
            Operation::Notify => NOTIFY_FIELDS,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything a signature can read named string values from
pub trait FieldSource {
    /// Value of the named field, if present
    fn field(&self, name: &str) -> Option<&str>;

    /// Shadow one field with a fixed value without touching the record
    fn with_override<'a>(&'a self, name: &'a str, value: &'a str) -> Overlay<'a, Self>
    where
        Self: Sized,
    {
        Overlay {
            inner: self,
            name,
            value,
        }
    }
}

impl FieldSource for HashMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl FieldSource for BTreeMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl FieldSource for [(&str, &str)] {
    fn field(&self, name: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
    }
}

impl<T: FieldSource + ?Sized> FieldSource for &T {
    fn field(&self, name: &str) -> Option<&str> {
        (**self).field(name)
    }
}

/// A field source with one field replaced
#[derive(Debug)]
pub struct Overlay<'a, S: ?Sized> {
    inner: &'a S,
    name: &'a str,
    value: &'a str,
}

impl<S: FieldSource + ?Sized> FieldSource for Overlay<'_, S> {
    fn field(&self, name: &str) -> Option<&str> {
        if name == self.name {
            Some(self.value)
        } else {
            self.inner.field(name)
        }
    }
}

/// Build the pipe-joined string that gets hashed.
///
/// Absent fields contribute an empty string. The result embeds the secret
/// and must not be logged.
pub fn canonical_string<S: FieldSource + ?Sized>(
    operation: Operation,
    source: &S,
    secret: &str,
) -> String {
    operation
        .fields()
        .iter()
        .map(|slot| match slot {
            SignatureField::Field(name) => source.field(name).unwrap_or(""),
            SignatureField::Secret => secret,
        })
        .collect::<Vec<_>>()
        .join(SIGNATURE_SEPARATOR)
}

/// Lowercase hex MD5 of a string's UTF-8 bytes
pub fn md5_hex(input: &str) -> String {
    hex::encode(md5::compute(input.as_bytes()).0)
}

/// Compute the signature of `source` for `operation`
pub fn sign<S: FieldSource + ?Sized>(operation: Operation, source: &S, secret: &str) -> String {
    md5_hex(&canonical_string(operation, source, secret))
}

/// How an expected signature is compared with a claimed one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComparisonMode {
    /// Plain byte equality, matching the gateway's own reference code
    #[default]
    Exact,
    /// Constant-time byte equality
    ConstantTime,
}

/// Compare two signatures byte for byte
pub fn signatures_match(expected: &str, claimed: &str, mode: ComparisonMode) -> bool {
    match mode {
        ComparisonMode::Exact => expected == claimed,
        ComparisonMode::ConstantTime => {
            let (a, b) = (expected.as_bytes(), claimed.as_bytes());
            a.len() == b.len() && bool::from(a.ct_eq(b))
        }
    }
}
