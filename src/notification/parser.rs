//! Fixed-template grammar for bank payment notifications.
//!
//! The document is machine generated with a rigid layout, so the grammar is
//! a fixed sequence of literal splits over the flattened text. Each step
//! splits the current remainder on one delimiter, keeps the first piece as a
//! field and rejoins the other pieces into the next remainder. Delimiters and
//! rejoin separators must stay byte-exact: changing either moves text between
//! fields.

use chrono::NaiveDateTime;

use crate::document::flatten::FlattenedDocument;
use crate::error::{PayproofError, Result};
use crate::model::notification::{NotificationHeader, Payer, PaymentNotification};

const END_OF_HEADER: &str = "end of notification";
const TITLE_PREFIX: &str = "notification of payment";
const END_OF_INSTRUCTION: &str = ". . . ";
const TRACE_ID: &str = "trace id";
const LABEL_SEPARATOR: &str = " : ";
const END_OF_TRACE: &str = " . . . . ";
const END_OF_PAYER: &str = " - ";
const AMOUNT: &str = " cur/amount : ";
const SPACE: &str = " ";
const NAME: &str = " name : ";
const MASKED_ACCOUNT: &str = ": . . ";
const BANK: &str = " bank : ";
const BRANCH_CODE: &str = " branch code : ";
const REFERENCE: &str = " reference : ";
const DIRECTORS: &str = " directors: ";

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

/// Parse a flattened document into a [`PaymentNotification`].
pub fn parse_notification(document: &FlattenedDocument) -> Result<PaymentNotification> {
    parse(document.as_str())
}

/// Parse flattened (lower-cased, single-spaced) notification text.
///
/// Fails on the first step whose delimiter is missing, or on the first
/// field that does not coerce. Never returns a partial record.
pub fn parse(text: &str) -> Result<PaymentNotification> {
    // 1: header block. Only the piece right after the marker is carried on.
    let (raw_header, rest) = split(text, "1", END_OF_HEADER)?;
    let remainder = rest[0];
    let title = raw_header.replacen(TITLE_PREFIX, "", 1).trim().to_string();

    // 2
    let (instruction, rest) = split(remainder, "2", END_OF_INSTRUCTION)?;
    let instruction = instruction.trim().to_string();
    let remainder = rest.join(END_OF_INSTRUCTION);

    // 3: date/time actioned, e.g. "date actioned : 2024-01-05 time actioned : 10:00"
    let (datetime_block, rest) = split(&remainder, "3", TRACE_ID)?;
    let remainder = rest.concat();
    let labels: Vec<&str> = datetime_block.trim().split(LABEL_SEPARATOR).collect();
    let (date, time) = match labels.as_slice() {
        [_, date, time, ..] => (*date, *time),
        _ => return Err(malformed("3b", LABEL_SEPARATOR)),
    };

    // 4
    let (trace_block, rest) = split(&remainder, "4", END_OF_TRACE)?;
    let trace_id = second_piece(trace_block, "4b", LABEL_SEPARATOR)?.to_string();
    let remainder = rest.join(" ");

    // 5
    let (payer_block, rest) = split(&remainder, "5", END_OF_PAYER)?;
    let payer_name = second_piece(payer_block, "5b", LABEL_SEPARATOR)?.to_string();
    let remainder = rest.join(END_OF_PAYER);

    // 6
    let (payer_kind, rest) = split(&remainder, "6", AMOUNT)?;
    let payer_kind = payer_kind.to_string();
    let remainder = rest.concat();

    // 7: the amount ends at the first space. An amount written with a space
    // inside ("zar 1 000.00") is cut at that space.
    let (amount, rest) = split(&remainder, "7", SPACE)?;
    let amount = amount.to_string();
    let remainder = rest.join(SPACE);

    // 8
    let (account_block, rest) = split(&remainder, "8", NAME)?;
    let account = second_piece(account_block, "8b", MASKED_ACCOUNT)?;
    let account = coerce_integer("payer.account", account)?;
    let remainder = rest.concat();

    // 9
    let (payment, rest) = split(&remainder, "9", BANK)?;
    let payment = payment.to_string();
    let remainder = rest.concat();

    // 10
    let (bank, rest) = split(&remainder, "10", BRANCH_CODE)?;
    let bank = bank.to_string();
    let remainder = rest.concat();

    // 11
    let (branch, rest) = split(&remainder, "11", REFERENCE)?;
    let branch = coerce_integer("branch", branch)?;
    let remainder = rest.concat();

    // 12
    let (reference, rest) = split(&remainder, "12", DIRECTORS)?;
    let reference = reference.to_string();
    let footer = rest.concat();

    let day = date.split(' ').next().unwrap_or_default();
    let date = coerce_date(&format!("{day} {time}"))?;

    Ok(PaymentNotification {
        header: NotificationHeader { title, instruction },
        payer: Payer {
            name: payer_name,
            kind: payer_kind,
            account,
        },
        trace_id,
        payment,
        amount,
        bank,
        branch,
        reference,
        date,
        footer,
    })
}

/// Split on every occurrence of `delimiter`; returns the first piece and the
/// remaining pieces, which are never empty.
fn split<'a>(
    text: &'a str,
    step: &'static str,
    delimiter: &'static str,
) -> Result<(&'a str, Vec<&'a str>)> {
    let mut pieces = text.split(delimiter);
    let first = pieces.next().unwrap_or_default();
    let rest: Vec<&str> = pieces.collect();
    if rest.is_empty() {
        return Err(malformed(step, delimiter));
    }
    Ok((first, rest))
}

/// The piece after the first `delimiter`, up to the next one.
fn second_piece<'a>(text: &'a str, step: &'static str, delimiter: &'static str) -> Result<&'a str> {
    text.split(delimiter)
        .nth(1)
        .ok_or_else(|| malformed(step, delimiter))
}

fn malformed(step: &'static str, delimiter: &'static str) -> PayproofError {
    PayproofError::MalformedNotification { step, delimiter }
}

fn coerce_integer(field: &'static str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| PayproofError::FieldCoercion {
            field,
            raw: raw.to_string(),
        })
}

fn coerce_date(raw: &str) -> Result<NaiveDateTime> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| PayproofError::FieldCoercion {
            field: "date",
            raw: raw.to_string(),
        })
}
