//! RFC 1123 `Last-Modified` handling, e.g. `Thu, 01 Jan 1970 00:00:00 GMT`.

use anyhow::{Context, Result};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

const HTTP_DATE: &[BorrowedFormatItem<'_>] = format_description!(
	"[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Formats a unix timestamp as an RFC 1123 date.
pub fn format_http_date(unix_seconds: i64) -> Result<String> {
	let date =
		OffsetDateTime::from_unix_timestamp(unix_seconds).context("timestamp out of range")?;
	date.format(HTTP_DATE).context("formatting http date")
}

/// Parses an RFC 1123 date into a unix timestamp.
pub fn parse_http_date(text: &str) -> Result<i64> {
	let date = PrimitiveDateTime::parse(text.trim(), HTTP_DATE)
		.with_context(|| format!("parsing http date '{text}'"))?;
	Ok(date.assume_utc().unix_timestamp())
}
