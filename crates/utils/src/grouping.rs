use std::collections::HashMap;

use models::RunDiagnostics;
use tracing::warn;

/// Composite key a statement's trade rows are merged on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub transaction_date: String,
    pub summary: String,
    pub security_code: String,
    pub security_name: String,
}

/// One pre-aggregation trade row.
#[derive(Debug, Clone)]
pub struct TradeRow {
    pub key: GroupKey,
    pub amount: f64,
    pub quantity: f64,
    pub price: f64,
}

/// One merged row per distinct key.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedTrade {
    pub key: GroupKey,
    /// Sum of the group's raw amounts.
    pub amount: f64,
    /// Sum of the group's quantities (integer coercion happens in the
    /// output formatter).
    pub quantity: f64,
    /// Quantity-weighted average unit price.
    pub price: f64,
}

struct Accumulator {
    amount: f64,
    quantity: f64,
    price_volume: f64,
}

/// Merge trade rows by [`GroupKey`].
///
/// Output order is first-seen key order: permuting the input rows never
/// changes any aggregate, only where a key's row lands in the result.
/// A group whose total quantity sums to zero has no defined weighted
/// average price; it is skipped and counted rather than emitted with a
/// division artifact.
pub fn group_trades(
    rows: impl IntoIterator<Item = TradeRow>,
    diagnostics: &mut RunDiagnostics,
) -> Vec<GroupedTrade> {
    let mut order: Vec<GroupKey> = Vec::new();
    let mut groups: HashMap<GroupKey, Accumulator> = HashMap::new();

    for row in rows {
        let acc = groups.entry(row.key.clone()).or_insert_with(|| {
            order.push(row.key.clone());
            Accumulator {
                amount: 0.0,
                quantity: 0.0,
                price_volume: 0.0,
            }
        });
        acc.amount += row.amount;
        acc.quantity += row.quantity;
        acc.price_volume += row.price * row.quantity;
    }

    let mut out = Vec::with_capacity(order.len());
    for key in order {
        let acc = &groups[&key];
        if acc.quantity == 0.0 {
            warn!(
                date = %key.transaction_date,
                code = %key.security_code,
                "group has zero total quantity, skipping"
            );
            diagnostics.zero_quantity_groups += 1;
            continue;
        }
        out.push(GroupedTrade {
            amount: acc.amount,
            quantity: acc.quantity,
            price: acc.price_volume / acc.quantity,
            key,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(date: &str, code: &str) -> GroupKey {
        GroupKey {
            transaction_date: date.to_string(),
            summary: "证券买入".to_string(),
            security_code: code.to_string(),
            security_name: format!("{code} name"),
        }
    }

    fn row(date: &str, code: &str, amount: f64, qty: f64, price: f64) -> TradeRow {
        TradeRow {
            key: key(date, code),
            amount,
            quantity: qty,
            price,
        }
    }

    #[test]
    fn single_row_group_keeps_its_own_price() {
        let mut diag = RunDiagnostics::default();
        let grouped = group_trades([row("20260115", "600000", 1050.0, 100.0, 10.5)], &mut diag);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].price, 10.5);
        assert_eq!(grouped[0].quantity, 100.0);
        assert!(diag.is_clean());
    }

    #[test]
    fn weighted_average_over_two_fills() {
        let mut diag = RunDiagnostics::default();
        let grouped = group_trades(
            [
                row("20260115", "600000", 1000.0, 100.0, 10.0),
                row("20260115", "600000", 2200.0, 200.0, 11.0),
            ],
            &mut diag,
        );
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].quantity, 300.0);
        assert_eq!(grouped[0].amount, 3200.0);
        assert!((grouped[0].price - (10.0 * 100.0 + 11.0 * 200.0) / 300.0).abs() < 1e-12);
    }

    #[test]
    fn aggregates_are_invariant_to_input_order() {
        let rows = vec![
            row("20260115", "600000", 1000.0, 100.0, 10.0),
            row("20260116", "000001", 500.0, 50.0, 10.0),
            row("20260115", "600000", 2200.0, 200.0, 11.0),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();

        let mut d1 = RunDiagnostics::default();
        let mut d2 = RunDiagnostics::default();
        let a = group_trades(rows, &mut d1);
        let b = group_trades(reversed, &mut d2);

        for ga in &a {
            let gb = b.iter().find(|g| g.key == ga.key).unwrap();
            assert!((ga.amount - gb.amount).abs() < 1e-9);
            assert!((ga.quantity - gb.quantity).abs() < 1e-9);
            assert!((ga.price - gb.price).abs() < 1e-9);
        }
    }

    #[test]
    fn output_follows_first_seen_key_order() {
        let mut diag = RunDiagnostics::default();
        let grouped = group_trades(
            [
                row("20260116", "000001", 1.0, 1.0, 1.0),
                row("20260115", "600000", 1.0, 1.0, 1.0),
                row("20260116", "000001", 1.0, 1.0, 1.0),
            ],
            &mut diag,
        );
        assert_eq!(grouped[0].key.security_code, "000001");
        assert_eq!(grouped[1].key.security_code, "600000");
    }

    #[test]
    fn zero_quantity_group_is_skipped_and_counted() {
        let mut diag = RunDiagnostics::default();
        let grouped = group_trades(
            [
                row("20260115", "600000", 12.5, 0.0, 0.0),
                row("20260115", "000001", 100.0, 10.0, 10.0),
            ],
            &mut diag,
        );
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].key.security_code, "000001");
        assert_eq!(diag.zero_quantity_groups, 1);
    }
}
