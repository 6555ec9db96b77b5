//! Parser for the `test_decoding` output plugin.
//!
//! Each data change is one line:
//!
//! ```text
//! table public.cart_entries: UPDATE: old-key: user_id[bigint]:7 ... new-tuple: user_id[bigint]:7 ...
//! ```
//!
//! Values are either bare tokens, `null`, or single-quoted with `''` as the
//! escaped quote. Transaction markers (`BEGIN 740`, `COMMIT 740`) carry no row.

use jiff::Timestamp;

use crate::{
    cdc::CdcError,
    domain::{carts::records::CartEntryRecord, products::records::SkuId},
    ids::UserId,
};

const SELECTED: i16 = 1;

const OLD_KEY: &str = "old-key:";
const NEW_TUPLE: &str = "new-tuple:";
const NO_TUPLE_DATA: &str = "(no-tuple-data)";

type Columns = Vec<(String, Option<String>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One decoded row change. `columns` is the new tuple for inserts and
/// updates, and the old tuple for deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowChange {
    pub schema: String,
    pub table: String,
    pub kind: ChangeKind,
    pub columns: Vec<(String, Option<String>)>,
}

impl RowChange {
    /// Decode one line of plugin output. Transaction markers decode to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CdcError::Malformed`] when the line does not follow the plugin format.
    pub fn parse(line: &str) -> Result<Option<Self>, CdcError> {
        let Some(rest) = line.strip_prefix("table ") else {
            return if line.starts_with("BEGIN") || line.starts_with("COMMIT") {
                Ok(None)
            } else {
                Err(malformed(line, 0, "expected a table change"))
            };
        };

        let offset = line.len() - rest.len();

        let (qualified, rest) = rest
            .split_once(": ")
            .ok_or_else(|| malformed(line, offset, "missing table terminator"))?;

        let (schema, table) = qualified
            .split_once('.')
            .ok_or_else(|| malformed(line, offset, "table is not schema-qualified"))?;

        let (kind, rest) = rest
            .split_once(':')
            .ok_or_else(|| malformed(line, offset, "missing change kind"))?;

        let kind = match kind {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => return Err(malformed(line, offset, "unknown change kind")),
        };

        let columns = match rest.trim_start().strip_prefix(OLD_KEY) {
            Some(old_key) => match parse_columns(line, old_key)? {
                (_, Some(new_tuple)) => parse_columns(line, new_tuple)?.0,
                (old_key, None) => old_key,
            },
            None => parse_columns(line, rest)?.0,
        };

        Ok(Some(Self {
            schema: unquote_identifier(schema),
            table: unquote_identifier(table),
            kind,
            columns,
        }))
    }

    pub fn is_for(&self, schema: &str, table: &str) -> bool {
        self.schema == schema && self.table == table
    }

    fn value(&self, column: &'static str) -> Result<&str, CdcError> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
            .ok_or(CdcError::MissingColumn(column))
    }

    fn parsed<T: std::str::FromStr>(&self, column: &'static str) -> Result<T, CdcError> {
        let value = self.value(column)?;

        value.parse().map_err(|_unparsable| CdcError::InvalidColumn {
            column,
            value: value.to_string(),
        })
    }

    /// Read the change as a cart row.
    ///
    /// # Errors
    ///
    /// Returns an error when a cart column is missing or does not parse.
    pub fn cart_entry(&self) -> Result<CartEntryRecord, CdcError> {
        let created_at = self.value("created_at")?;

        Ok(CartEntryRecord {
            user_id: UserId::from_i64(self.parsed("user_id")?),
            sku_id: SkuId::from_i64(self.parsed("sku_id")?),
            specification: self.value("specification")?.to_string(),
            count: self.parsed("count")?,
            selected: self.parsed::<i16>("selected")? == SELECTED,
            version: self.parsed("version")?,
            created_at: parse_timestamp(created_at).ok_or_else(|| CdcError::InvalidColumn {
                column: "created_at",
                value: created_at.to_string(),
            })?,
        })
    }
}

fn malformed(line: &str, offset: usize, reason: &'static str) -> CdcError {
    CdcError::Malformed {
        offset: offset.min(line.len()),
        reason,
    }
}

fn unquote_identifier(identifier: &str) -> String {
    identifier
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .map_or_else(|| identifier.to_string(), |inner| inner.replace("\"\"", "\""))
}

/// Parse `name[type]:value` tokens separated by single spaces, up to the end
/// of `tuple` or a `new-tuple:` marker between columns. The text after the
/// marker is returned alongside the columns.
fn parse_columns<'a>(
    line: &str,
    tuple: &'a str,
) -> Result<(Columns, Option<&'a str>), CdcError> {
    let base = line.len() - tuple.len();
    let bytes = tuple.as_bytes();
    let mut columns = Vec::new();
    let mut at = 0;

    loop {
        while at < bytes.len() && bytes[at] == b' ' {
            at += 1;
        }

        if at >= bytes.len() {
            return Ok((columns, None));
        }

        if let Some(new_tuple) = tuple[at..].strip_prefix(NEW_TUPLE) {
            return Ok((columns, Some(new_tuple)));
        }

        if columns.is_empty() && tuple[at..].trim_end() == NO_TUPLE_DATA {
            return Ok((columns, None));
        }

        let name_end = tuple[at..]
            .find('[')
            .map(|found| at + found)
            .ok_or_else(|| malformed(line, base + at, "column without type"))?;

        let name = unquote_identifier(&tuple[at..name_end]);

        // Types nest brackets for arrays, e.g. `text[]`.
        let mut depth = 0_usize;
        let mut type_end = None;

        for (index, byte) in bytes.iter().enumerate().skip(name_end) {
            match *byte {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;

                    if depth == 0 {
                        type_end = Some(index);
                        break;
                    }
                }
                _ => {}
            }
        }

        let type_end =
            type_end.ok_or_else(|| malformed(line, base + name_end, "unterminated type"))?;

        if bytes.get(type_end + 1) != Some(&b':') {
            return Err(malformed(line, base + type_end, "missing value separator"));
        }

        at = type_end + 2;

        let value = if bytes.get(at) == Some(&b'\'') {
            let mut value = String::new();
            let mut cursor = at + 1;

            loop {
                let Some(quote) = tuple[cursor..].find('\'').map(|found| cursor + found) else {
                    return Err(malformed(line, base + at, "unterminated string"));
                };

                value.push_str(&tuple[cursor..quote]);

                if bytes.get(quote + 1) == Some(&b'\'') {
                    value.push('\'');
                    cursor = quote + 2;
                } else {
                    at = quote + 1;
                    break;
                }
            }

            Some(value)
        } else {
            let end = tuple[at..].find(' ').map_or(bytes.len(), |found| at + found);
            let token = &tuple[at..end];
            at = end;

            (token != "null").then(|| token.to_string())
        };

        columns.push((name, value));
    }
}

/// `timestamptz` as printed with `DateStyle = ISO`, e.g. `2026-01-01 08:30:00.25+08`.
fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let mut normalized = value.replacen(' ', "T", 1);

    let offset_at = normalized.rfind(['+', '-'])?;

    if normalized.len() - offset_at == 3 {
        normalized.push_str(":00");
    }

    normalized.parse().ok()
}
