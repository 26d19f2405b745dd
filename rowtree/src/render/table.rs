// Column-aligned text tables

/// Lay out `rows` in columns padded to the widest cell, two spaces apart.
/// With a header, a dashed rule separates it from the rows. Line breaks
/// inside a cell are shown as spaces.
pub fn format_table(header: Option<&[String]>, rows: &[Vec<String>]) -> String {
    let flatten = |cell: &str| cell.replace('\n', " ");
    let header: Option<Vec<String>> = header.map(|h| h.iter().map(|c| flatten(c.as_str())).collect());
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.iter().map(|c| flatten(c.as_str())).collect())
        .collect();

    let columns = header
        .iter()
        .chain(rows.iter())
        .map(|r| r.len())
        .max()
        .unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in header.iter().chain(rows.iter()) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    if let Some(header) = &header {
        lines.push(format_row(header, &widths));
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        lines.push(format_row(&rule, &widths));
    }
    for row in &rows {
        lines.push(format_row(row, &widths));
    }
    lines.join("\n")
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (i, width) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        if i > 0 {
            line.push_str("  ");
        }
        line.push_str(cell);
        line.push_str(&" ".repeat(width.saturating_sub(cell.chars().count())));
    }
    line.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_format_with_header() {
        let header = cells(&["name", "telno"]);
        let rows = vec![cells(&["Bob", "555"]), cells(&["Annabel", "5"])];
        assert_eq!(
            format_table(Some(header.as_slice()), &rows),
            "name     telno\n-------  -----\nBob      555\nAnnabel  5"
        );
    }

    #[test]
    fn test_format_without_header() {
        let rows = vec![cells(&["a", "two\nlines"]), cells(&["bbb"])];
        assert_eq!(format_table(None, &rows), "a    two lines\nbbb");
    }
}
