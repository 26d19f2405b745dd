// Id allocation under the ordering policy

use crate::config::Order;
use crate::error::{Result, RowTreeError};

/// Largest numeric id in `ids`; non-numeric ids are ignored.
pub fn max_id<'a, I>(ids: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    ids.into_iter()
        .filter_map(|id| id.trim().parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

/// `base + n`, or an error once numeric ids run out.
pub fn offset(base: u64, n: u64) -> Result<u64> {
    base.checked_add(n).ok_or_else(|| {
        RowTreeError::Config(format!("record ids exhausted: cannot number past {base}"))
    })
}

/// Id for a single new record: one past the current maximum.
pub fn next_id<'a, I>(ids: I) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    Ok(offset(max_id(ids), 1)?.to_string())
}

/// Ids for the `count` new rows of a reconciled batch, in encounter order.
///
/// Ascending numbers them `base+1..=base+count`; descending numbers them
/// `base+count..=base+1`, so the last row encountered gets the lowest id.
pub fn batch_ids(base: u64, count: usize, order: Order) -> Result<Vec<String>> {
    let count = count as u64;
    // The highest id handed out must fit
    offset(base, count)?;
    Ok((1..=count)
        .map(|i| match order {
            Order::Ascending => base + i,
            Order::Descending => base + (count + 1 - i),
        })
        .map(|id| id.to_string())
        .collect())
}
