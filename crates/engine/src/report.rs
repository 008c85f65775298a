//! Console views printed after each successful cycle.

use coinwatch_core::MarketRecord;

/// Full snapshot: every extracted column.
pub fn snapshot_view(records: &[MarketRecord]) -> String {
    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.rank.clone(),
                r.name.clone(),
                r.symbol.clone(),
                fmt_price(r.price),
                fmt_percent(r.change_24h),
                fmt_cap(r.market_cap),
            ]
        })
        .collect();
    render_table(
        &["rank", "name", "symbol", "price", "change_24h", "market_cap"],
        rows,
    )
}

/// Records matching the price filter.
pub fn price_view(records: &[MarketRecord]) -> String {
    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.symbol.clone(),
                fmt_price(r.price),
                fmt_percent(r.change_24h),
            ]
        })
        .collect();
    render_table(&["name", "symbol", "price", "change_24h"], rows)
}

/// Gainers or losers.
pub fn movers_view(records: &[MarketRecord]) -> String {
    let rows = records
        .iter()
        .map(|r| vec![r.name.clone(), r.symbol.clone(), fmt_percent(r.change_24h)])
        .collect();
    render_table(&["name", "symbol", "change_24h"], rows)
}

/// Right-aligned plain-text table with a header line.
pub fn render_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, headers.iter().copied(), &widths);
    for row in &rows {
        push_line(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, w)| format!("{:>width$}", cell, width = *w))
        .collect();
    out.push_str(&line.join(" "));
    out.push('\n');
}

fn fmt_price(v: Option<f64>) -> String {
    match v {
        Some(p) if p.abs() >= 1.0 => format!("{:.2}", p),
        Some(p) => format!("{:.6}", p),
        None => "-".to_string(),
    }
}

fn fmt_percent(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |c| format!("{:.2}", c))
}

fn fmt_cap(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |c| format!("{:.0}", c))
}
