// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Field mapping schemas.
//!
//! One static table per [`DocumentKind`](crate::model::DocumentKind). Each
//! [`FieldRule`] names a field on the source side (HR system) and on the
//! destination side (ERP), the type it is coerced to, and what to emit when
//! the input is absent. The same table drives both directions; the
//! [`transform`](crate::transform) module walks it.
//!
//! # Rule Shapes
//!
//! ```text
//! source field ──(Text | Date | Decimal | Integer | Flag | Enum)──► destination field
//! (none)       ──(Constant)──────────────────────────────────────► destination field
//! flat fields  ──(Group)─────────────────────────────────────────► nested object
//! array field  ──(List, per element sub-rules)───────────────────► array field
//! ```
//!
//! Every schema has exactly one `required` identifier rule. It maps in both
//! directions so a record's source id survives a round trip.

use serde_json::Value;

/// Which directions a rule participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Both,
    /// Only when sending to an ERP (constants, derived copies, ERP-only defaults).
    ToDestination,
}

/// Value emitted when the input is absent, null, empty or unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    /// Leave the field out of the output.
    Omit,
    Text(&'static str),
    Zero,
    False,
}

/// A literal on either side of an enum table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Text(&'static str),
    Int(i64),
}

impl Literal {
    pub fn to_value(self) -> Value {
        match self {
            Literal::Text(s) => Value::String(s.to_string()),
            Literal::Int(i) => Value::from(i),
        }
    }
}

/// Explicit lookup tables for an enumerated field.
///
/// Keys are lowercase. Any value not listed maps to the direction's default.
#[derive(Debug)]
pub struct EnumMap {
    pub to_destination: &'static [(&'static str, Literal)],
    pub destination_default: Literal,
    pub to_source: &'static [(&'static str, Literal)],
    pub source_default: Literal,
}

/// Declared type of a field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text,
    /// ISO-8601 date (`YYYY-MM-DD`).
    Date,
    /// Exact decimal, zero when missing or unparsable.
    Decimal,
    /// Whole number, zero when missing or unparsable.
    Integer,
    Flag,
    /// Boolean negated across the mapping (`is_active` ↔ `disabled`).
    InvertedFlag,
    Enum(&'static EnumMap),
    Constant(Literal),
    /// Flat fields on the source side, nested object on the destination side.
    Group(&'static [FieldRule]),
    /// Array of records mapped element-wise.
    List(&'static [FieldRule]),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub source: &'static str,
    pub destination: &'static str,
    pub kind: FieldKind,
    pub default: FieldDefault,
    pub required: bool,
    pub flow: Flow,
}

impl FieldRule {
    pub const fn new(
        source: &'static str,
        destination: &'static str,
        kind: FieldKind,
        default: FieldDefault,
    ) -> Self {
        Self {
            source,
            destination,
            kind,
            default,
            required: false,
            flow: Flow::Both,
        }
    }

    /// Required text identifier carried in both directions.
    pub const fn identifier(source: &'static str, destination: &'static str) -> Self {
        Self {
            required: true,
            ..Self::new(source, destination, FieldKind::Text, FieldDefault::Omit)
        }
    }

    pub const fn outbound(self) -> Self {
        Self {
            flow: Flow::ToDestination,
            ..self
        }
    }
}

/// A complete mapping table for one document kind.
#[derive(Debug)]
pub struct EntitySchema {
    pub document: &'static str,
    pub fields: &'static [FieldRule],
}

impl EntitySchema {
    /// The required identifier rule.
    pub fn identifier(&self) -> Option<&'static FieldRule> {
        self.fields.iter().find(|rule| rule.required)
    }
}

const fn text(source: &'static str, destination: &'static str) -> FieldRule {
    FieldRule::new(source, destination, FieldKind::Text, FieldDefault::Omit)
}

const fn text_or(
    source: &'static str,
    destination: &'static str,
    default: &'static str,
) -> FieldRule {
    FieldRule::new(source, destination, FieldKind::Text, FieldDefault::Text(default))
}

const fn date(source: &'static str, destination: &'static str) -> FieldRule {
    FieldRule::new(source, destination, FieldKind::Date, FieldDefault::Omit)
}

const fn decimal(source: &'static str, destination: &'static str) -> FieldRule {
    FieldRule::new(source, destination, FieldKind::Decimal, FieldDefault::Zero)
}

const fn integer(source: &'static str, destination: &'static str) -> FieldRule {
    FieldRule::new(source, destination, FieldKind::Integer, FieldDefault::Zero)
}

const fn enumerated(
    source: &'static str,
    destination: &'static str,
    map: &'static EnumMap,
) -> FieldRule {
    FieldRule::new(source, destination, FieldKind::Enum(map), FieldDefault::Omit)
}

const fn constant(destination: &'static str, value: &'static str) -> FieldRule {
    FieldRule::new("", destination, FieldKind::Constant(Literal::Text(value)), FieldDefault::Omit)
        .outbound()
}

const fn group(destination: &'static str, rules: &'static [FieldRule]) -> FieldRule {
    FieldRule::new("", destination, FieldKind::Group(rules), FieldDefault::Omit)
}

const fn list(
    source: &'static str,
    destination: &'static str,
    rules: &'static [FieldRule],
) -> FieldRule {
    FieldRule::new(source, destination, FieldKind::List(rules), FieldDefault::Omit)
}

const DEFAULT_COMPANY: &str = "Default Company";

// ═══════════════════════════════════════════════════════════════════════════════
// Enum tables
// ═══════════════════════════════════════════════════════════════════════════════

pub static EMPLOYEE_STATUS: EnumMap = EnumMap {
    to_destination: &[
        ("active", Literal::Text("Active")),
        ("1", Literal::Text("Active")),
        ("inactive", Literal::Text("Inactive")),
        ("0", Literal::Text("Inactive")),
        ("terminated", Literal::Text("Left")),
        ("suspended", Literal::Text("Suspended")),
    ],
    destination_default: Literal::Text("Active"),
    to_source: &[
        ("active", Literal::Text("active")),
        ("inactive", Literal::Text("inactive")),
        ("left", Literal::Text("inactive")),
        ("suspended", Literal::Text("suspended")),
    ],
    source_default: Literal::Text("active"),
};

pub static PAYROLL_DOCSTATUS: EnumMap = EnumMap {
    to_destination: &[
        ("draft", Literal::Int(0)),
        ("submitted", Literal::Int(1)),
        ("approved", Literal::Int(1)),
        ("cancelled", Literal::Int(2)),
    ],
    destination_default: Literal::Int(0),
    to_source: &[
        ("0", Literal::Text("draft")),
        ("1", Literal::Text("approved")),
        ("2", Literal::Text("cancelled")),
    ],
    source_default: Literal::Text("draft"),
};

pub static DOCSTATUS: EnumMap = EnumMap {
    to_destination: &[
        ("draft", Literal::Int(0)),
        ("submitted", Literal::Int(1)),
        ("cancelled", Literal::Int(2)),
    ],
    destination_default: Literal::Int(0),
    to_source: &[
        ("0", Literal::Text("draft")),
        ("1", Literal::Text("submitted")),
        ("2", Literal::Text("cancelled")),
    ],
    source_default: Literal::Text("draft"),
};

pub static ACCOUNT_TYPE: EnumMap = EnumMap {
    to_destination: &[
        ("asset", Literal::Text("Asset")),
        ("liability", Literal::Text("Liability")),
        ("equity", Literal::Text("Equity")),
        ("income", Literal::Text("Income")),
        ("expense", Literal::Text("Expense")),
    ],
    destination_default: Literal::Text("Asset"),
    to_source: &[
        ("asset", Literal::Text("asset")),
        ("liability", Literal::Text("liability")),
        ("equity", Literal::Text("equity")),
        ("income", Literal::Text("income")),
        ("expense", Literal::Text("expense")),
    ],
    source_default: Literal::Text("asset"),
};

pub static EXPENSE_APPROVAL: EnumMap = EnumMap {
    to_destination: &[
        ("pending", Literal::Text("Draft")),
        ("approved", Literal::Text("Approved")),
        ("rejected", Literal::Text("Rejected")),
        ("paid", Literal::Text("Paid")),
    ],
    destination_default: Literal::Text("Draft"),
    to_source: &[
        ("draft", Literal::Text("pending")),
        ("approved", Literal::Text("approved")),
        ("rejected", Literal::Text("rejected")),
        ("paid", Literal::Text("paid")),
    ],
    source_default: Literal::Text("pending"),
};

pub static EXPENSE_DOCSTATUS: EnumMap = EnumMap {
    to_destination: &[
        ("pending", Literal::Int(0)),
        ("approved", Literal::Int(1)),
        ("rejected", Literal::Int(2)),
    ],
    destination_default: Literal::Int(0),
    to_source: &[],
    source_default: Literal::Text("pending"),
};

pub static LEAVE_STATUS: EnumMap = EnumMap {
    to_destination: &[
        ("pending", Literal::Text("Open")),
        ("approved", Literal::Text("Approved")),
        ("rejected", Literal::Text("Rejected")),
        ("cancelled", Literal::Text("Cancelled")),
    ],
    destination_default: Literal::Text("Draft"),
    to_source: &[
        ("open", Literal::Text("pending")),
        ("approved", Literal::Text("approved")),
        ("rejected", Literal::Text("rejected")),
        ("cancelled", Literal::Text("cancelled")),
    ],
    source_default: Literal::Text("pending"),
};

// ═══════════════════════════════════════════════════════════════════════════════
// Nested tables
// ═══════════════════════════════════════════════════════════════════════════════

const EARNINGS: &[FieldRule] = &[
    decimal("basic_salary", "basic_salary"),
    decimal("house_allowance", "house_rent_allowance"),
    decimal("transport_allowance", "transport_allowance"),
    decimal("medical_allowance", "medical_allowance"),
    decimal("overtime_pay", "overtime_pay"),
    decimal("bonus", "bonus"),
    decimal("other_allowances", "other_allowances"),
];

const DEDUCTIONS: &[FieldRule] = &[
    decimal("income_tax", "income_tax"),
    decimal("provident_fund", "provident_fund"),
    decimal("professional_tax", "professional_tax"),
    decimal("loan_deduction", "loan_deduction"),
    decimal("other_deductions", "other_deductions"),
];

const JOURNAL_LINES: &[FieldRule] = &[
    text("account_code", "account"),
    decimal("debit_amount", "debit_in_account_currency"),
    decimal("credit_amount", "credit_in_account_currency"),
    text("description", "user_remark"),
];

const EXPENSE_LINES: &[FieldRule] = &[
    date("expense_date", "expense_date"),
    text("category", "expense_type"),
    text("description", "description"),
    decimal("amount", "amount"),
    decimal("approved_amount", "sanctioned_amount"),
];

const PURCHASE_LINES: &[FieldRule] = &[
    text("product_code", "item_code"),
    text("product_name", "item_name"),
    text("description", "description"),
    decimal("quantity", "qty"),
    decimal("unit_price", "rate"),
    decimal("total_price", "amount"),
    date("delivery_date", "schedule_date"),
];

// ═══════════════════════════════════════════════════════════════════════════════
// Document schemas
// ═══════════════════════════════════════════════════════════════════════════════

pub static EMPLOYEE: EntitySchema = EntitySchema {
    document: "Employee",
    fields: &[
        FieldRule::identifier("employee_id", "employee_number"),
        text("full_name", "employee_name"),
        text("first_name", "first_name"),
        text("last_name", "last_name"),
        text("middle_name", "middle_name"),
        text("email", "personal_email"),
        text("phone", "cell_number"),
        text("address", "current_address"),
        text("position", "designation"),
        text("department", "department"),
        text_or("company", "company", DEFAULT_COMPANY).outbound(),
        text_or("employment_type", "employment_type", "Full-time"),
        date("hire_date", "date_of_joining"),
        date("birth_date", "date_of_birth"),
        enumerated("status", "status", &EMPLOYEE_STATUS),
        decimal("salary", "salary_amount"),
        text("manager_id", "reports_to"),
        text("gender", "gender"),
        text_or("category", "employee_category", "Employee").outbound(),
    ],
};

pub static SALARY_SLIP: EntitySchema = EntitySchema {
    document: "Salary Slip",
    fields: &[
        FieldRule::identifier("id", "hr_reference_id"),
        text("employee_id", "employee"),
        text("employee_name", "employee_name"),
        text("designation", "designation"),
        text("department", "department"),
        text_or("company", "company", DEFAULT_COMPANY).outbound(),
        date("pay_period", "posting_date"),
        date("period_start", "start_date"),
        date("period_end", "end_date"),
        text_or("salary_structure", "salary_structure", "Default Salary Structure").outbound(),
        group("earnings", EARNINGS),
        group("deductions", DEDUCTIONS),
        decimal("gross_pay", "gross_pay"),
        decimal("total_deductions", "total_deduction"),
        decimal("net_pay", "net_pay"),
        integer("working_days", "total_working_days"),
        integer("payment_days", "payment_days"),
        integer("unpaid_days", "leave_without_pay"),
        enumerated("status", "docstatus", &PAYROLL_DOCSTATUS),
        text("bank_name", "bank_name"),
        text("bank_account", "bank_account_no"),
    ],
};

pub static ACCOUNT: EntitySchema = EntitySchema {
    document: "Account",
    fields: &[
        FieldRule::identifier("code", "account_number"),
        text("name", "account_name"),
        enumerated("type", "account_type", &ACCOUNT_TYPE),
        enumerated("type", "root_type", &ACCOUNT_TYPE).outbound(),
        text("parent_account", "parent_account"),
        text_or("company", "company", DEFAULT_COMPANY).outbound(),
        FieldRule::new("is_group", "is_group", FieldKind::Flag, FieldDefault::False),
        FieldRule::new("is_active", "disabled", FieldKind::InvertedFlag, FieldDefault::False),
        text_or("currency", "account_currency", "USD"),
        text_or("freeze_account", "freeze_account", "No"),
    ],
};

pub static JOURNAL_ENTRY: EntitySchema = EntitySchema {
    document: "Journal Entry",
    fields: &[
        FieldRule::identifier("id", "hr_reference_id"),
        text("description", "title"),
        constant("voucher_type", "Journal Entry"),
        constant("naming_series", "JV-"),
        text_or("company", "company", DEFAULT_COMPANY).outbound(),
        date("transaction_date", "posting_date"),
        list("entries", "accounts", JOURNAL_LINES),
        text("notes", "user_remark"),
        enumerated("status", "docstatus", &DOCSTATUS),
    ],
};

pub static EXPENSE_CLAIM: EntitySchema = EntitySchema {
    document: "Expense Claim",
    fields: &[
        FieldRule::identifier("id", "hr_reference_id"),
        text("employee_id", "employee"),
        text("employee_name", "employee_name"),
        date("claim_date", "posting_date"),
        text("approver_id", "expense_approver"),
        text_or("company", "company", DEFAULT_COMPANY).outbound(),
        list("items", "expenses", EXPENSE_LINES),
        decimal("total_amount", "total_claimed_amount"),
        decimal("approved_amount", "total_sanctioned_amount"),
        enumerated("status", "approval_status", &EXPENSE_APPROVAL),
        enumerated("status", "docstatus", &EXPENSE_DOCSTATUS).outbound(),
    ],
};

pub static PURCHASE_ORDER: EntitySchema = EntitySchema {
    document: "Purchase Order",
    fields: &[
        FieldRule::identifier("id", "hr_reference_id"),
        text("vendor_name", "supplier"),
        date("order_date", "transaction_date"),
        text_or("company", "company", DEFAULT_COMPANY).outbound(),
        text_or("currency", "currency", "USD"),
        list("items", "items", PURCHASE_LINES),
        decimal("subtotal", "total"),
        decimal("total_amount", "grand_total"),
        enumerated("status", "docstatus", &DOCSTATUS),
    ],
};

pub static LEAVE_APPLICATION: EntitySchema = EntitySchema {
    document: "Leave Application",
    fields: &[
        FieldRule::identifier("id", "leave_application_name"),
        text("user_id", "employee"),
        text("type", "leave_type"),
        date("start_date", "from_date"),
        date("end_date", "to_date"),
        decimal("days", "total_leave_days"),
        text("reason", "description"),
        enumerated("status", "status", &LEAVE_STATUS),
        date("created_at", "posting_date"),
    ],
};

/// General ledger lines read back from the ERP during accounting reverse sync.
pub static GL_ENTRY: EntitySchema = EntitySchema {
    document: "GL Entry",
    fields: &[
        FieldRule::identifier("voucher_no", "voucher_no"),
        text("account_code", "account"),
        decimal("debit_amount", "debit"),
        decimal("credit_amount", "credit"),
        date("transaction_date", "posting_date"),
        text("voucher_type", "voucher_type"),
    ],
};
